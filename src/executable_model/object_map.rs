// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::api::DynamicObject;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct ObjectMapKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectMapKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> ObjectMapKey {
        ObjectMapKey {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// ObjectMap is the stored state of the executable API server:
/// every object currently persisted, keyed by (kind, namespace, name).
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    inner: BTreeMap<ObjectMapKey, DynamicObject>,
}

impl ObjectMap {
    pub fn new() -> ObjectMap {
        ObjectMap::default()
    }

    pub fn contains_key(&self, key: &ObjectMapKey) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &ObjectMapKey) -> Option<DynamicObject> {
        self.inner.get(key).cloned()
    }

    pub fn insert(&mut self, key: ObjectMapKey, value: DynamicObject) -> Option<DynamicObject> {
        self.inner.insert(key, value)
    }

    pub fn remove(&mut self, key: &ObjectMapKey) -> Option<DynamicObject> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All objects of kind in namespace, ordered by name.
    pub fn list(&self, kind: &str, namespace: &str) -> Vec<DynamicObject> {
        self.inner
            .iter()
            .filter(|(key, _)| key.kind == kind && key.namespace == namespace)
            .map(|(_, obj)| obj.clone())
            .collect()
    }
}
