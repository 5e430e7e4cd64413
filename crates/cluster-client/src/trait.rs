//! ClusterClient trait for mocking
//!
//! This trait abstracts the object store the reconciler talks to. The
//! concrete `KubeClusterClient` implements it against the API server, and
//! tests use `MockClusterClient`.

use crate::error::ClusterError;
use crate::models::{LabelSelector, ObjectKey};
use crds::ImmortalDB;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;

/// Object store operations used by the ImmortalDB reconciler
///
/// All calls are single round trips; none of them retries internally.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Fetch an ImmortalDB. Absent objects yield `ClusterError::NotFound`.
    async fn get_immortal_db(&self, key: &ObjectKey) -> Result<ImmortalDB, ClusterError>;

    /// Write the status subresource of `db`, leaving its spec untouched.
    ///
    /// The write is conditional on `db.metadata.resource_version` when set.
    async fn update_immortal_db_status(&self, db: &ImmortalDB) -> Result<ImmortalDB, ClusterError>;

    /// Fetch a Deployment. Absent objects yield `ClusterError::NotFound`.
    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, ClusterError>;

    /// Create a Deployment in the namespace named by its metadata.
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    /// Replace an existing Deployment, conditional on its resource version.
    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    /// List pods in `namespace` whose labels satisfy `selector`, in server order.
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Pod>, ClusterError>;
}
