//! Kubernetes resource watcher.
//!
//! Drives the reconciler from `kube_runtime::Controller`. ImmortalDB is the
//! primary kind; Deployments are watched through `.owns()`, so a change to
//! either re-enqueues the owning ImmortalDB. The runtime never runs two
//! passes for the same object at once.

use crate::backoff::BackoffTracker;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use cluster_client::ObjectKey;
use crds::ImmortalDB;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State shared by every reconciliation pass
#[derive(Debug)]
pub struct Context {
    pub reconciler: Reconciler,
    pub backoff: BackoffTracker,
    pub metrics: Metrics,
}

fn object_key(db: &ImmortalDB) -> Result<ObjectKey, ControllerError> {
    ObjectKey::from_resource(db).ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "ImmortalDB without namespace or name: {:?}",
            db.metadata.name
        ))
    })
}

async fn reconcile(db: Arc<ImmortalDB>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = object_key(&db)?;
    debug!("Reconciling ImmortalDB {}", key);

    match ctx.reconciler.reconcile(&key).await {
        Ok(outcome) => {
            debug!("ImmortalDB {} pass issued {} writes: {:?}", key, outcome.writes(), outcome);
            ctx.metrics.record(&outcome);
            ctx.backoff.reset(&key);
            Ok(Action::await_change())
        }
        Err(e) => {
            ctx.metrics.record_failure();
            Err(e)
        }
    }
}

fn error_policy(db: Arc<ImmortalDB>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let delay = match object_key(&db) {
        Ok(key) => {
            let delay = ctx.backoff.next_delay(&key);
            warn!("Reconciliation of ImmortalDB {} failed, retrying in {:?}: {}", key, delay, error);
            delay
        }
        Err(_) => {
            warn!("Reconciliation failed, retrying in {:?}: {}", ctx.backoff.max_delay(), error);
            ctx.backoff.max_delay()
        }
    };
    Action::requeue(delay)
}

/// Watches ImmortalDBs and the Deployments they own.
pub struct Watcher {
    immortal_db_api: Api<ImmortalDB>,
    deployment_api: Api<Deployment>,
    context: Arc<Context>,
    debounce: Duration,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        immortal_db_api: Api<ImmortalDB>,
        deployment_api: Api<Deployment>,
        context: Arc<Context>,
        debounce: Duration,
        concurrency: u16,
    ) -> Self {
        Self {
            immortal_db_api,
            deployment_api,
            context,
            debounce,
            concurrency,
        }
    }

    /// Runs until a shutdown signal is received and in-flight passes finish.
    pub async fn watch_immortal_dbs(self) -> Result<(), ControllerError> {
        info!(
            "Starting ImmortalDB watcher (debounce {:?}, concurrency {})",
            self.debounce, self.concurrency
        );

        let config = RuntimeConfig::default()
            .debounce(self.debounce)
            .concurrency(self.concurrency);

        Controller::new(self.immortal_db_api, watcher::Config::default())
            .owns(self.deployment_api, watcher::Config::default())
            .with_config(config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled ImmortalDB {}", obj),
                    Err(e) => error!("ImmortalDB controller error: {}", e),
                }
            })
            .await;

        info!("ImmortalDB watcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_immortal_db, create_test_reconciler};
    use cluster_client::{MockFailure, MockOperation};

    fn context(min: u64, max: u64) -> (Arc<Context>, cluster_client::MockClusterClient) {
        let (reconciler, mock) = create_test_reconciler();
        let ctx = Context {
            reconciler,
            backoff: BackoffTracker::new(Duration::from_secs(min), Duration::from_secs(max)),
            metrics: Metrics::new().unwrap(),
        };
        (Arc::new(ctx), mock)
    }

    #[tokio::test]
    async fn test_success_awaits_change_and_resets_backoff() {
        let (ctx, mock) = context(1, 10);
        let db = mock.add_immortal_db(create_test_immortal_db("foo", "default", "postgres:16", 1));
        let key = ObjectKey::new("default", "foo");
        ctx.backoff.next_delay(&key);
        ctx.backoff.next_delay(&key);
        ctx.backoff.next_delay(&key);

        let action = reconcile(Arc::new(db), ctx.clone()).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(ctx.backoff.next_delay(&key), Duration::from_secs(1));
        assert!(ctx.metrics.render().unwrap().contains("kind=\"create\"} 1"));
    }

    #[tokio::test]
    async fn test_failures_requeue_with_growing_delay() {
        let (ctx, mock) = context(1, 3);
        let db = mock.add_immortal_db(create_test_immortal_db("foo", "default", "postgres:16", 1));
        mock.fail(MockOperation::GetDeployment, MockFailure::Unavailable);
        let db = Arc::new(db);

        let mut actions = Vec::new();
        for _ in 0..5 {
            let err = reconcile(db.clone(), ctx.clone()).await.unwrap_err();
            actions.push(error_policy(db.clone(), &err, ctx.clone()));
        }

        let expected: Vec<_> = [1, 1, 2, 3, 3]
            .into_iter()
            .map(|s| Action::requeue(Duration::from_secs(s)))
            .collect();
        assert_eq!(actions, expected);
        assert!(ctx.metrics.render().unwrap().contains("result=\"error\"} 5"));
    }

    #[tokio::test]
    async fn test_object_without_namespace_is_invalid() {
        let (ctx, _mock) = context(1, 30);
        let mut db = create_test_immortal_db("foo", "default", "postgres:16", 1);
        db.metadata.namespace = None;
        let db = Arc::new(db);

        let err = reconcile(db.clone(), ctx.clone()).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidResource(_)));
        assert_eq!(
            error_policy(db, &err, ctx),
            Action::requeue(Duration::from_secs(30))
        );
    }
}
