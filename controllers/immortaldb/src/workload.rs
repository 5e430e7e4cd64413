//! Desired Deployment for an ImmortalDB.
//!
//! The Deployment shares name and namespace with its ImmortalDB and selects
//! its pods with the single label `app=<name>`. Building it is pure; attaching
//! the owner reference is the only step that can fail.

use crate::error::ControllerError;
use cluster_client::{LabelSelector, ObjectKey};
use crds::{ImmortalDB, ImmortalDBSpec};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector as MetaLabelSelector, ObjectMeta};
use kube::Resource;

/// Label key linking a Deployment to its pods
pub const APP_LABEL: &str = "app";

/// Name of the database container
pub const CONTAINER_NAME: &str = "postgres";

/// Port the database listens on
pub const DATABASE_PORT: i32 = 5432;

/// Replica count the API server assumes when a Deployment leaves it unset
pub const DEFAULT_REPLICAS: i32 = 1;

/// Parts of the Deployment that come from controller configuration
#[derive(Debug, Clone)]
pub struct WorkloadTemplate {
    /// Environment declared on the database container
    pub env: Vec<EnvVar>,
}

impl WorkloadTemplate {
    /// Template declaring `POSTGRES_PASSWORD` on the database container
    pub fn new(postgres_password: impl Into<String>) -> Self {
        Self {
            env: vec![EnvVar {
                name: "POSTGRES_PASSWORD".to_string(),
                value: Some(postgres_password.into()),
                ..Default::default()
            }],
        }
    }
}

/// Selector identifying the pods of the ImmortalDB called `name`
pub fn selector_for(name: &str) -> LabelSelector {
    LabelSelector::from([(APP_LABEL.to_string(), name.to_string())])
}

/// Build the Deployment an ImmortalDB declares, without owner reference.
pub fn desired_deployment(
    key: &ObjectKey,
    spec: &ImmortalDBSpec,
    template: &WorkloadTemplate,
) -> Deployment {
    let labels = selector_for(&key.name);

    Deployment {
        metadata: ObjectMeta {
            name: Some(key.name.clone()),
            namespace: Some(key.namespace.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replica_count),
            selector: MetaLabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(spec.image.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: DATABASE_PORT,
                            ..Default::default()
                        }]),
                        env: Some(template.env.clone()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Mark `deployment` as controlled by `db`.
///
/// Deletion of the Deployment when `db` goes away is left to the platform's
/// garbage collector, which follows this reference. The reference needs the
/// owner's name and uid; without them no Deployment may be written.
pub fn set_controller_reference(
    deployment: &mut Deployment,
    db: &ImmortalDB,
) -> Result<(), ControllerError> {
    let owner = db.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::Ownership(format!(
            "ImmortalDB {}/{} has no name or uid",
            db.metadata.namespace.as_deref().unwrap_or("<none>"),
            db.metadata.name.as_deref().unwrap_or("<unknown>"),
        ))
    })?;
    deployment.metadata.owner_references = Some(vec![owner]);
    Ok(())
}

/// Replica count of an observed Deployment, applying the API server default.
pub fn observed_replicas(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS)
}
