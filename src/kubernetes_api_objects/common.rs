// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::Resource;
use std::fmt;

/// ObjectKey identifies a namespaced object of a kind known from context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> ObjectKey {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the key of a namespaced object, or None if its metadata
    /// misses the name or the namespace.
    pub fn of<K: Resource>(obj: &K) -> Option<ObjectKey> {
        let meta = obj.meta();
        Some(ObjectKey {
            namespace: meta.namespace.clone()?,
            name: meta.name.clone()?,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
