//! Kubernetes API client
//!
//! Implements `ClusterClientTrait` on top of `kube::Api`. Errors from the API
//! server are classified by HTTP status so callers can tell "absent" and
//! "stale write" apart from everything else.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crate::models::{object_namespace_and_name, selector_string, LabelSelector, ObjectKey};
use crds::ImmortalDB;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Object store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wrap an existing `kube::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster or local kubeconfig environment
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// The underlying `kube::Client`
    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    fn immortal_dbs(&self, namespace: &str) -> Api<ImmortalDB> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Maps 404 to `NotFound`, leaves everything else as a transport/API error.
fn classify_read(err: kube::Error, what: String) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound(what),
        other => ClusterError::Kube(other),
    }
}

/// Maps 404 to `NotFound` and 409 to `Conflict` for conditional writes.
fn classify_update(err: kube::Error, what: String) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound(what),
        kube::Error::Api(response) if response.code == 409 => ClusterError::Conflict(what),
        other => ClusterError::Kube(other),
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_immortal_db(&self, key: &ObjectKey) -> Result<ImmortalDB, ClusterError> {
        debug!("GET ImmortalDB {}", key);
        self.immortal_dbs(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| classify_read(e, format!("ImmortalDB {key}")))
    }

    async fn update_immortal_db_status(&self, db: &ImmortalDB) -> Result<ImmortalDB, ClusterError> {
        let (namespace, name) = object_namespace_and_name(db, "ImmortalDB")?;
        debug!("PATCH ImmortalDB {}/{} status", namespace, name);

        // Merge patch carrying the observed resourceVersion: the API server
        // rejects it with 409 if the object moved on since it was read.
        let mut patch = Map::new();
        if let Some(resource_version) = &db.metadata.resource_version {
            patch.insert(
                "metadata".to_string(),
                json!({ "resourceVersion": resource_version }),
            );
        }
        patch.insert(
            "status".to_string(),
            serde_json::to_value(db.status.clone().unwrap_or_default())
                .map_err(|e| ClusterError::InvalidRequest(format!("ImmortalDB status: {e}")))?,
        );

        self.immortal_dbs(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(Value::Object(patch)))
            .await
            .map_err(|e| classify_update(e, format!("ImmortalDB {namespace}/{name} status")))
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, ClusterError> {
        debug!("GET Deployment {}", key);
        self.deployments(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| classify_read(e, format!("Deployment {key}")))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (namespace, name) = object_namespace_and_name(deployment, "Deployment")?;
        debug!("POST Deployment {}/{}", namespace, name);
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(|e| match e {
                kube::Error::Api(response) if response.code == 409 => {
                    ClusterError::AlreadyExists(format!("Deployment {namespace}/{name}"))
                }
                other => ClusterError::Kube(other),
            })
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (namespace, name) = object_namespace_and_name(deployment, "Deployment")?;
        debug!("PUT Deployment {}/{}", namespace, name);
        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .map_err(|e| classify_update(e, format!("Deployment {namespace}/{name}")))
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Pod>, ClusterError> {
        let labels = selector_string(selector);
        debug!("LIST Pods in {} matching {}", namespace, labels);
        let params = ListParams::default().labels(&labels);
        let pods = self.pods(namespace).list(&params).await?;
        Ok(pods.items)
    }
}
