//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the reconciler to
//! the watcher and runs it next to the probes server.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probes::{self, ProbeState};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, Watcher};
use crate::workload::WorkloadTemplate;
use cluster_client::KubeClusterClient;
use crds::ImmortalDB;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for ImmortalDB management.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing ImmortalDB Controller");

        let kube_client = Client::try_default().await?;

        let (immortal_db_api, deployment_api): (Api<ImmortalDB>, Api<Deployment>) =
            match config.namespace.as_deref() {
                Some(ns) => (
                    Api::namespaced(kube_client.clone(), ns),
                    Api::namespaced(kube_client.clone(), ns),
                ),
                None => (Api::all(kube_client.clone()), Api::all(kube_client.clone())),
            };

        let metrics = Metrics::new()?;
        let reconciler = Reconciler::new(
            KubeClusterClient::new(kube_client),
            WorkloadTemplate::new(config.postgres_password.clone()),
        );
        let context = Arc::new(Context {
            reconciler,
            backoff: BackoffTracker::new(config.backoff_min, config.backoff_max),
            metrics: metrics.clone(),
        });

        let probe_state = ProbeState::new(metrics);
        let probe_server = {
            let state = probe_state.clone();
            let addr = config.probe_addr;
            tokio::spawn(async move { probes::serve(addr, state).await })
        };

        let watcher_instance = Watcher::new(
            immortal_db_api,
            deployment_api,
            context,
            config.debounce,
            config.concurrency,
        );
        let watcher = tokio::spawn(async move { watcher_instance.watch_immortal_dbs().await });
        probe_state.set_ready(true);

        Ok(Self {
            watcher,
            probe_server,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// Returns when the watcher stops, after a shutdown signal or on failure.
    /// The probes server is stopped with it; if the probes server fails first
    /// its error is returned and the watcher is aborted.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("ImmortalDB Controller running");

        tokio::select! {
            result = &mut self.watcher => {
                self.probe_server.abort();
                result.map_err(|e| ControllerError::Watch(format!("ImmortalDB watcher panicked: {}", e)))??;
            }
            result = &mut self.probe_server => {
                warn!("Probe server exited, stopping watcher");
                self.watcher.abort();
                result.map_err(|e| ControllerError::Server(format!("probe server panicked: {}", e)))??;
            }
        }

        info!("ImmortalDB Controller stopped");
        Ok(())
    }
}
