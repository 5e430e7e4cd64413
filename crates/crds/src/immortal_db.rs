//! ImmortalDB CRD
//!
//! Declares a replicated database cluster: which image to run and how many
//! replicas. The controller owns the status subresource exclusively.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the ImmortalDB resource
pub const API_GROUP: &str = "db.example.com";

/// API version of the ImmortalDB resource
pub const API_VERSION: &str = "v1alpha1";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "db.example.com",
    version = "v1alpha1",
    kind = "ImmortalDB",
    plural = "immortaldbs",
    shortname = "idb",
    namespaced,
    status = "ImmortalDBStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicaCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ImmortalDBSpec {
    /// Container image reference for the database (e.g. "postgres:16")
    #[serde(default)]
    pub image: String,

    /// Desired number of database replicas
    ///
    /// Also accepts `replicas` on input for manifests written against the
    /// first revision of this API.
    #[serde(default, alias = "replicas")]
    #[schemars(range(min = 0))]
    pub replica_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImmortalDBStatus {
    /// Names of the pods currently backing this database, in listing order
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl ImmortalDB {
    /// Pod names last written to status.
    ///
    /// A resource without a status reports no nodes, so an absent status and
    /// an empty `nodes` list compare equal.
    pub fn observed_nodes(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|status| status.nodes.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::{CustomResourceExt, Resource};
    use serde_json::json;

    fn sample() -> ImmortalDB {
        let mut db = ImmortalDB::new(
            "orders",
            ImmortalDBSpec {
                image: "postgres:16".to_string(),
                replica_count: 3,
            },
        );
        db.metadata.namespace = Some("default".to_string());
        db
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["apiVersion"], "db.example.com/v1alpha1");
        assert_eq!(value["kind"], "ImmortalDB");
        assert_eq!(value["spec"], json!({"image": "postgres:16", "replicaCount": 3}));
    }

    #[test]
    fn test_status_round_trips_unchanged() {
        let mut db = sample();
        db.status = Some(ImmortalDBStatus {
            nodes: vec!["orders-0".to_string(), "orders-1".to_string()],
        });

        let encoded = serde_json::to_string(&db).unwrap();
        let decoded: ImmortalDB = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.spec, db.spec);
        assert_eq!(decoded.status, db.status);
    }

    #[test]
    fn test_legacy_replicas_field_is_accepted() {
        let spec: ImmortalDBSpec =
            serde_json::from_value(json!({"image": "postgres:15", "replicas": 2})).unwrap();
        assert_eq!(spec.replica_count, 2);
    }

    #[test]
    fn test_missing_fields_default() {
        let spec: ImmortalDBSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec, ImmortalDBSpec::default());
    }

    #[test]
    fn test_observed_nodes_without_status_is_empty() {
        let mut db = sample();
        assert!(db.observed_nodes().is_empty());

        db.status = Some(ImmortalDBStatus::default());
        assert!(db.observed_nodes().is_empty());

        db.status = Some(ImmortalDBStatus {
            nodes: vec!["orders-0".to_string()],
        });
        assert_eq!(db.observed_nodes(), ["orders-0".to_string()]);
    }

    #[test]
    fn test_crd_metadata() {
        let crd = ImmortalDB::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("immortaldbs.db.example.com"));
        assert_eq!(crd.spec.group, API_GROUP);
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.versions[0].name, API_VERSION);
        assert!(
            crd.spec.versions[0]
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some(),
            "status subresource must be enabled"
        );
        assert_eq!(ImmortalDB::api_version(&()), "db.example.com/v1alpha1");
    }
}
