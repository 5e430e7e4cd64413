//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use crate::workload::WorkloadTemplate;
use cluster_client::MockClusterClient;
use crds::{ImmortalDB, ImmortalDBSpec};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Password declared on containers built by `create_test_reconciler`
pub const TEST_PASSWORD: &str = "test-password";

/// Helper to create test ImmortalDB CRD with a uid
pub fn create_test_immortal_db(
    name: &str,
    namespace: &str,
    image: &str,
    replica_count: i32,
) -> ImmortalDB {
    ImmortalDB {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{namespace}-{name}-uid")),
            ..Default::default()
        },
        spec: ImmortalDBSpec {
            image: image.to_string(),
            replica_count,
        },
        status: None,
    }
}

/// Helper to create a test pod labelled `app=<app>`
pub fn create_test_pod(name: &str, namespace: &str, app: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to create a reconciler over a fresh mock store
///
/// Returns the mock as well so tests can seed and inspect it.
pub fn create_test_reconciler() -> (Reconciler, MockClusterClient) {
    let mock = MockClusterClient::new();
    let reconciler = Reconciler::new(mock.clone(), WorkloadTemplate::new(TEST_PASSWORD));
    (reconciler, mock)
}
