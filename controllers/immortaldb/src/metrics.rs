//! Prometheus counters for reconciliation passes and the writes they issue.

use crate::reconciler::ReconcileOutcome;
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

/// Controller metrics and the registry they are exported from
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciles: IntCounterVec,
    writes: IntCounterVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Register the controller's counters in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reconciles = IntCounterVec::new(
            Opts::new(
                "immortaldb_reconcile_total",
                "Reconciliation passes by result",
            ),
            &["result"],
        )?;
        let writes = IntCounterVec::new(
            Opts::new(
                "immortaldb_writes_total",
                "Writes issued by reconciliation passes by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(writes.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            writes,
        })
    }

    /// Count a successful pass and the writes it made
    pub fn record(&self, outcome: &ReconcileOutcome) {
        self.reconciles.with_label_values(&["success"]).inc();
        match outcome {
            ReconcileOutcome::Deleted => {}
            ReconcileOutcome::Created => self.writes.with_label_values(&["create"]).inc(),
            ReconcileOutcome::Converged {
                scaled,
                status_updated,
            } => {
                if *scaled {
                    self.writes.with_label_values(&["scale"]).inc();
                }
                if *status_updated {
                    self.writes.with_label_values(&["status"]).inc();
                }
            }
        }
    }

    /// Count a failed pass
    pub fn record_failure(&self) {
        self.reconciles.with_label_values(&["error"]).inc();
    }

    /// Text exposition of all registered metrics
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_passes_and_writes() {
        let metrics = Metrics::new().unwrap();
        metrics.record(&ReconcileOutcome::Created);
        metrics.record(&ReconcileOutcome::Converged {
            scaled: true,
            status_updated: true,
        });
        metrics.record(&ReconcileOutcome::Deleted);
        metrics.record_failure();

        assert_eq!(metrics.reconciles.with_label_values(&["success"]).get(), 3);
        assert_eq!(metrics.reconciles.with_label_values(&["error"]).get(), 1);
        assert_eq!(metrics.writes.with_label_values(&["create"]).get(), 1);
        assert_eq!(metrics.writes.with_label_values(&["scale"]).get(), 1);
        assert_eq!(metrics.writes.with_label_values(&["status"]).get(), 1);
    }

    #[test]
    fn test_render_exposes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record(&ReconcileOutcome::Created);

        let text = metrics.render().unwrap();
        assert!(text.contains("immortaldb_reconcile_total{result=\"success\"} 1"));
        assert!(text.contains("immortaldb_writes_total{kind=\"create\"} 1"));
    }
}
