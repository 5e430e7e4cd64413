//! Reconciliation logic for the ImmortalDB CRD.
//!
//! A pass receives only the identifier of an ImmortalDB and re-reads
//! everything it needs, so it is safe to repeat at any time:
//!
//! 1. Fetch the ImmortalDB (absent: nothing to do)
//! 2. Build the desired Deployment and mark it as owned by the ImmortalDB
//! 3. Create the Deployment if absent (pass ends), else align its replica count
//! 4. List pods matching `app=<name>` and write their names to `status.nodes`
//!
//! Any store error aborts the pass and is returned for requeue. No step
//! retries on its own.
//!
//! After creation only the replica count is kept in sync. Changing `image`
//! on an existing ImmortalDB does not touch its Deployment.


use crate::error::ControllerError;
use crate::workload::{
    desired_deployment, observed_replicas, selector_for, set_controller_reference,
    WorkloadTemplate,
};
use cluster_client::{ClusterClientTrait, ObjectKey};
use crds::{ImmortalDB, ImmortalDBStatus};
use k8s_openapi::api::apps::v1::Deployment;
use tracing::{debug, error, info, instrument};

/// What a successful pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ImmortalDB no longer exists; nothing was written
    Deleted,
    /// The Deployment was created; status is refreshed by a later pass
    Created,
    /// The Deployment already existed
    Converged {
        /// Replica count of the Deployment was updated
        scaled: bool,
        /// `status.nodes` was rewritten
        status_updated: bool,
    },
}

impl ReconcileOutcome {
    /// Number of writes the pass issued
    pub fn writes(&self) -> usize {
        match self {
            Self::Deleted => 0,
            Self::Created => 1,
            Self::Converged {
                scaled,
                status_updated,
            } => usize::from(*scaled) + usize::from(*status_updated),
        }
    }
}

/// Reconciles ImmortalDB resources.
pub struct Reconciler {
    client: Box<dyn ClusterClientTrait>,
    template: WorkloadTemplate,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: impl ClusterClientTrait + 'static, template: WorkloadTemplate) -> Self {
        Self {
            client: Box::new(client),
            template,
        }
    }

    /// Runs one reconciliation pass for the ImmortalDB identified by `key`.
    ///
    /// Issues at most one Deployment create, one Deployment update and one
    /// status write.
    #[instrument(skip(self), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let db = match self.client.get_immortal_db(key).await {
            Ok(db) => db,
            Err(e) if e.is_not_found() => {
                // Owned Deployment is garbage-collected through its owner reference
                info!("ImmortalDB {} not found, assuming deleted", key);
                return Ok(ReconcileOutcome::Deleted);
            }
            Err(e) => {
                error!("Failed to get ImmortalDB {}: {}", key, e);
                return Err(e.into());
            }
        };

        let mut desired = desired_deployment(key, &db.spec, &self.template);
        set_controller_reference(&mut desired, &db)?;

        let observed = match self.client.get_deployment(key).await {
            Ok(observed) => observed,
            Err(e) if e.is_not_found() => {
                info!(
                    "Creating Deployment {} ({} replicas of {})",
                    key, db.spec.replica_count, db.spec.image
                );
                self.client.create_deployment(&desired).await.map_err(|e| {
                    error!("Failed to create Deployment {}: {}", key, e);
                    e
                })?;
                return Ok(ReconcileOutcome::Created);
            }
            Err(e) => {
                error!("Failed to get Deployment {}: {}", key, e);
                return Err(e.into());
            }
        };

        let scaled = self.converge_replicas(key, &db, observed).await?;
        let status_updated = self.refresh_status(key, &db).await?;

        Ok(ReconcileOutcome::Converged {
            scaled,
            status_updated,
        })
    }

    /// Aligns the Deployment's replica count with the ImmortalDB.
    ///
    /// Only `spec.replicas` is changed; the rest of the observed object,
    /// including its resourceVersion, is written back as read.
    async fn converge_replicas(
        &self,
        key: &ObjectKey,
        db: &ImmortalDB,
        mut observed: Deployment,
    ) -> Result<bool, ControllerError> {
        let current = observed_replicas(&observed);
        let declared = db.spec.replica_count;
        if current == declared {
            debug!("Deployment {} already at {} replicas", key, declared);
            return Ok(false);
        }

        info!("Scaling Deployment {} from {} to {} replicas", key, current, declared);
        observed.spec.get_or_insert_with(Default::default).replicas = Some(declared);
        self.client.update_deployment(&observed).await.map_err(|e| {
            error!("Failed to scale Deployment {}: {}", key, e);
            e
        })?;
        Ok(true)
    }

    /// Writes the names of the pods backing the ImmortalDB to its status.
    ///
    /// The write is skipped when the listing matches `status.nodes`.
    async fn refresh_status(&self, key: &ObjectKey, db: &ImmortalDB) -> Result<bool, ControllerError> {
        let pods = self
            .client
            .list_pods(&key.namespace, &selector_for(&key.name))
            .await
            .map_err(|e| {
                error!("Failed to list pods for ImmortalDB {}: {}", key, e);
                e
            })?;
        let nodes: Vec<String> = pods.into_iter().filter_map(|pod| pod.metadata.name).collect();

        if nodes.as_slice() == db.observed_nodes() {
            debug!("ImmortalDB {} status already lists {} nodes", key, nodes.len());
            return Ok(false);
        }

        info!("Updating ImmortalDB {} status: nodes {:?}", key, nodes);
        let mut updated = db.clone();
        updated.status = Some(ImmortalDBStatus { nodes });
        self.client.update_immortal_db_status(&updated).await.map_err(|e| {
            error!("Failed to update ImmortalDB {} status: {}", key, e);
            e
        })?;
        Ok(true)
    }
}
