//! Mock ClusterClient for unit testing
//!
//! In-memory implementation of `ClusterClientTrait` that behaves like the API
//! server for the calls the reconciler makes: reads see earlier writes,
//! writes bump `resourceVersion`, stale conditional writes fail with
//! `Conflict`, and status writes only touch the status subresource.
//!
//! Every call is recorded so tests can assert on write counts.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crate::models::{labels_match, LabelSelector, ObjectKey};
use crds::ImmortalDB;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Calls a test can make fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `get_immortal_db`
    GetImmortalDB,
    /// `update_immortal_db_status`
    UpdateImmortalDBStatus,
    /// `get_deployment`
    GetDeployment,
    /// `create_deployment`
    CreateDeployment,
    /// `update_deployment`
    UpdateDeployment,
    /// `list_pods`
    ListPods,
}

/// Error an injected failure produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// `ClusterError::NotFound`
    NotFound,
    /// `ClusterError::Conflict`
    Conflict,
    /// `ClusterError::Api`, standing in for a transient server error
    Unavailable,
}

impl MockFailure {
    fn to_error(self, op: MockOperation) -> ClusterError {
        match self {
            Self::NotFound => ClusterError::NotFound(format!("injected by {op:?}")),
            Self::Conflict => ClusterError::Conflict(format!("injected by {op:?}")),
            Self::Unavailable => ClusterError::Api(format!("{op:?}: 503 service unavailable")),
        }
    }
}

/// Record of every call issued against the mock, failed ones included
#[derive(Debug, Clone, Default)]
pub struct MockCalls {
    /// Keys passed to `get_immortal_db`
    pub immortal_db_gets: Vec<ObjectKey>,
    /// Keys passed to `get_deployment`
    pub deployment_gets: Vec<ObjectKey>,
    /// Namespaces passed to `list_pods`
    pub pod_lists: Vec<(String, LabelSelector)>,
    /// Documents passed to `create_deployment`
    pub creates: Vec<Deployment>,
    /// Documents passed to `update_deployment`
    pub updates: Vec<Deployment>,
    /// Documents passed to `update_immortal_db_status`
    pub status_updates: Vec<ImmortalDB>,
}

impl MockCalls {
    /// Total number of write calls (create, update and status update)
    pub fn writes(&self) -> usize {
        self.creates.len() + self.updates.len() + self.status_updates.len()
    }
}

#[derive(Debug, Default)]
struct MockState {
    immortal_dbs: BTreeMap<ObjectKey, ImmortalDB>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    // Listing order is insertion order
    pods: Vec<Pod>,
    calls: MockCalls,
    failures: HashMap<MockOperation, MockFailure>,
    next_version: u64,
}

impl MockState {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check(&self, op: MockOperation) -> Result<(), ClusterError> {
        match self.failures.get(&op) {
            Some(failure) => Err(failure.to_error(op)),
            None => Ok(()),
        }
    }
}

fn key_of<K: kube::Resource>(obj: &K, kind: &str) -> Result<ObjectKey, ClusterError> {
    ObjectKey::from_resource(obj)
        .ok_or_else(|| ClusterError::InvalidRequest(format!("{kind} missing name or namespace")))
}

fn check_version(
    stored: Option<&String>,
    requested: Option<&String>,
    what: &str,
) -> Result<(), ClusterError> {
    match requested {
        Some(requested) if stored != Some(requested) => Err(ClusterError::Conflict(format!(
            "{what}: resourceVersion {requested} is stale"
        ))),
        _ => Ok(()),
    }
}

/// Mock ClusterClient for testing
///
/// Clones share the same store, so a test can keep a handle for inspection
/// while the reconciler owns another.
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClusterClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an ImmortalDB (for test setup)
    ///
    /// Assigns a uid when the object has none and always assigns a fresh
    /// resourceVersion. Returns the stored copy.
    pub fn add_immortal_db(&self, mut db: ImmortalDB) -> ImmortalDB {
        let key = ObjectKey::new(
            db.metadata.namespace.clone().unwrap_or_default(),
            db.metadata.name.clone().unwrap_or_default(),
        );
        let mut state = self.state();
        let version = state.bump_version();
        if db.metadata.uid.is_none() {
            db.metadata.uid = Some(format!("uid-{version}"));
        }
        db.metadata.resource_version = Some(version);
        state.immortal_dbs.insert(key, db.clone());
        db
    }

    /// Delete an ImmortalDB (for test setup)
    pub fn remove_immortal_db(&self, key: &ObjectKey) -> Option<ImmortalDB> {
        self.state().immortal_dbs.remove(key)
    }

    /// Change the spec of a stored ImmortalDB, as a user edit would
    pub fn edit_immortal_db(&self, key: &ObjectKey, edit: impl FnOnce(&mut crds::ImmortalDBSpec)) {
        let mut state = self.state();
        let version = state.bump_version();
        if let Some(db) = state.immortal_dbs.get_mut(key) {
            edit(&mut db.spec);
            db.metadata.resource_version = Some(version);
        }
    }

    /// Store a Deployment (for test setup)
    pub fn add_deployment(&self, mut deployment: Deployment) -> Deployment {
        let key = ObjectKey::new(
            deployment.metadata.namespace.clone().unwrap_or_default(),
            deployment.metadata.name.clone().unwrap_or_default(),
        );
        let mut state = self.state();
        deployment.metadata.resource_version = Some(state.bump_version());
        state.deployments.insert(key, deployment.clone());
        deployment
    }

    /// Change the replica count of a stored Deployment, as another writer would
    pub fn set_deployment_replicas(&self, key: &ObjectKey, replicas: Option<i32>) {
        let mut state = self.state();
        let version = state.bump_version();
        if let Some(deployment) = state.deployments.get_mut(key) {
            deployment.spec.get_or_insert_with(Default::default).replicas = replicas;
            deployment.metadata.resource_version = Some(version);
        }
    }

    /// Append a pod to the listing (for test setup)
    pub fn add_pod(&self, pod: Pod) {
        self.state().pods.push(pod);
    }

    /// Remove a pod by namespace and name (for test setup)
    pub fn remove_pod(&self, key: &ObjectKey) {
        self.state().pods.retain(|pod| {
            pod.metadata.namespace.as_deref() != Some(key.namespace.as_str())
                || pod.metadata.name.as_deref() != Some(key.name.as_str())
        });
    }

    /// Make every subsequent call of `op` fail
    pub fn fail(&self, op: MockOperation, failure: MockFailure) {
        self.state().failures.insert(op, failure);
    }

    /// Stop failing `op`
    pub fn clear_failure(&self, op: MockOperation) {
        self.state().failures.remove(&op);
    }

    /// Snapshot of an ImmortalDB as stored
    pub fn immortal_db(&self, key: &ObjectKey) -> Option<ImmortalDB> {
        self.state().immortal_dbs.get(key).cloned()
    }

    /// Snapshot of a Deployment as stored
    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        self.state().deployments.get(key).cloned()
    }

    /// Snapshot of all calls made so far
    pub fn calls(&self) -> MockCalls {
        self.state().calls.clone()
    }

    /// Forget recorded calls, keeping stored objects
    pub fn reset_calls(&self) {
        self.state().calls = MockCalls::default();
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_immortal_db(&self, key: &ObjectKey) -> Result<ImmortalDB, ClusterError> {
        let mut state = self.state();
        state.calls.immortal_db_gets.push(key.clone());
        state.check(MockOperation::GetImmortalDB)?;
        state
            .immortal_dbs
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("ImmortalDB {key}")))
    }

    async fn update_immortal_db_status(&self, db: &ImmortalDB) -> Result<ImmortalDB, ClusterError> {
        let mut state = self.state();
        state.calls.status_updates.push(db.clone());
        state.check(MockOperation::UpdateImmortalDBStatus)?;

        let key = key_of(db, "ImmortalDB")?;
        let version = state.bump_version();
        let stored = state
            .immortal_dbs
            .get_mut(&key)
            .ok_or_else(|| ClusterError::NotFound(format!("ImmortalDB {key}")))?;
        check_version(
            stored.metadata.resource_version.as_ref(),
            db.metadata.resource_version.as_ref(),
            &format!("ImmortalDB {key}"),
        )?;

        // Status subresource: spec and metadata of the request are ignored
        stored.status = Some(db.status.clone().unwrap_or_default());
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Deployment, ClusterError> {
        let mut state = self.state();
        state.calls.deployment_gets.push(key.clone());
        state.check(MockOperation::GetDeployment)?;
        state
            .deployments
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("Deployment {key}")))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let mut state = self.state();
        state.calls.creates.push(deployment.clone());
        state.check(MockOperation::CreateDeployment)?;

        let key = key_of(deployment, "Deployment")?;
        if state.deployments.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(format!("Deployment {key}")));
        }

        let version = state.bump_version();
        let mut created = deployment.clone();
        created.metadata.uid = Some(format!("uid-{version}"));
        created.metadata.resource_version = Some(version);
        created.status = None;
        state.deployments.insert(key, created.clone());
        Ok(created)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let mut state = self.state();
        state.calls.updates.push(deployment.clone());
        state.check(MockOperation::UpdateDeployment)?;

        let key = key_of(deployment, "Deployment")?;
        let version = state.bump_version();
        let stored = state
            .deployments
            .get_mut(&key)
            .ok_or_else(|| ClusterError::NotFound(format!("Deployment {key}")))?;
        check_version(
            stored.metadata.resource_version.as_ref(),
            deployment.metadata.resource_version.as_ref(),
            &format!("Deployment {key}"),
        )?;

        let status = stored.status.take();
        *stored = deployment.clone();
        stored.status = status;
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.state();
        state.calls.pod_lists.push((namespace.to_string(), selector.clone()));
        state.check(MockOperation::ListPods)?;
        Ok(state
            .pods
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .filter(|pod| labels_match(selector, pod.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::ImmortalDBSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn db(namespace: &str, name: &str) -> ImmortalDB {
        let mut db = ImmortalDB::new(
            name,
            ImmortalDBSpec {
                image: "postgres:16".to_string(),
                replica_count: 1,
            },
        );
        db.metadata.namespace = Some(namespace.to_string());
        db
    }

    fn pod(namespace: &str, name: &str, app: &str) -> Pod {
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

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let mock = MockClusterClient::new();
        let err = mock
            .get_immortal_db(&ObjectKey::new("default", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mock.calls().immortal_db_gets.len(), 1);
    }

    #[tokio::test]
    async fn test_status_update_keeps_spec_and_rejects_stale_version() {
        let mock = MockClusterClient::new();
        let stored = mock.add_immortal_db(db("default", "orders"));
        let key = ObjectKey::new("default", "orders");

        let mut request = stored.clone();
        request.spec.replica_count = 99;
        request.status = Some(crds::ImmortalDBStatus {
            nodes: vec!["orders-0".to_string()],
        });
        let updated = mock.update_immortal_db_status(&request).await.unwrap();
        assert_eq!(updated.spec.replica_count, 1);
        assert_eq!(updated.observed_nodes(), ["orders-0".to_string()]);

        // Same request again carries the old resourceVersion
        let err = mock.update_immortal_db_status(&request).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(mock.immortal_db(&key).unwrap().spec.replica_count, 1);
    }

    #[tokio::test]
    async fn test_list_pods_filters_by_namespace_and_labels_in_order() {
        let mock = MockClusterClient::new();
        mock.add_pod(pod("default", "foo-b", "foo"));
        mock.add_pod(pod("default", "bar-a", "bar"));
        mock.add_pod(pod("other", "foo-x", "foo"));
        mock.add_pod(pod("default", "foo-a", "foo"));

        let selector = LabelSelector::from([("app".to_string(), "foo".to_string())]);
        let names: Vec<_> = mock
            .list_pods("default", &selector)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.metadata.name)
            .collect();
        assert_eq!(names, ["foo-b", "foo-a"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_not_applied() {
        let mock = MockClusterClient::new();
        mock.fail(MockOperation::CreateDeployment, MockFailure::Unavailable);

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("orders".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = mock.create_deployment(&deployment).await.unwrap_err();
        assert!(matches!(err, ClusterError::Api(_)));
        assert_eq!(mock.calls().creates.len(), 1);
        assert!(mock.deployment(&ObjectKey::new("default", "orders")).is_none());

        mock.clear_failure(MockOperation::CreateDeployment);
        mock.create_deployment(&deployment).await.unwrap();
        let err = mock.create_deployment(&deployment).await.unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyExists(_)));
    }
}
