//! Cluster Client
//!
//! Typed access to the Kubernetes objects the ImmortalDB controller reads and
//! writes: `ImmortalDB` resources, the `Deployment`s they own and the `Pod`s
//! backing those deployments.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient, ObjectKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::try_default().await?;
//!
//! let db = client.get_immortal_db(&ObjectKey::new("default", "orders")).await?;
//! println!("{} wants {} replicas", db.spec.image, db.spec.replica_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **`test-util`**: exposes `MockClusterClient`, an in-memory store that
//!   records every write and can inject failures

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCalls, MockClusterClient, MockFailure, MockOperation};
