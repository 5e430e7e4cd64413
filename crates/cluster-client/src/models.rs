//! Shared identity and label-selector types.

use crate::error::ClusterError;
use kube::Resource;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a namespaced object by namespace and name.
///
/// This is the only thing a reconciliation pass receives; everything else is
/// re-read from the API server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object, if it carries both a name and a namespace
    pub fn from_resource<K: Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self::new(meta.namespace.clone()?, meta.name.clone()?))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Borrow namespace and name of an object about to be written.
pub fn object_namespace_and_name<'a, K: Resource>(
    obj: &'a K,
    kind: &str,
) -> Result<(&'a str, &'a str), ClusterError> {
    let meta = obj.meta();
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| ClusterError::InvalidRequest(format!("{kind} missing name")))?;
    let namespace = meta
        .namespace
        .as_deref()
        .ok_or_else(|| ClusterError::InvalidRequest(format!("{kind} {name} missing namespace")))?;
    Ok((namespace, name))
}

/// Equality-based label selector (`key=value` pairs, all must match)
pub type LabelSelector = BTreeMap<String, String>;

/// Renders a selector in the `a=b,c=d` form accepted by list calls.
///
/// Keys are emitted in sorted order so the string is stable across calls.
pub fn selector_string(selector: &LabelSelector) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether `labels` satisfies every pair in `selector`.
///
/// An empty selector matches everything, including objects without labels.
pub fn labels_match(selector: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector.iter().all(|(key, value)| {
        labels
            .and_then(|labels| labels.get(key))
            .is_some_and(|actual| actual == value)
    })
}
