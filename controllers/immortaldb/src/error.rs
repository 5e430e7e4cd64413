//! Controller-specific error types.
//!
//! Every variant is retryable from the controller's point of view: a failed
//! pass is requeued with backoff and the next pass starts from fresh reads.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the ImmortalDB Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store call failed
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Kubernetes client construction failed
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Owner reference for the Deployment could not be built
    #[error("Cannot set owner reference: {0}")]
    Ownership(String),

    /// Watched object is missing identity fields
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Probes server failed
    #[error("Probe server error: {0}")]
    Server(String),
}
