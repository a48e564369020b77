// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::common::ObjectKey;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher;
use kube::Resource;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;

/// OwnershipIndex maps each owner to the Deployments whose controller
/// owner reference points at it.
///
/// The index is only ever fed by observing Deployments (usually through a
/// watch stream); the reconciler reads it with [`OwnershipIndex::children_of`].
/// Deployments controlled by any other kind are not indexed.
///
/// Until the first relist completes the index cannot tell an owner without
/// children from one whose children were not listed yet, so readers must
/// check [`OwnershipIndex::is_synced`] first.
#[derive(Debug)]
pub struct OwnershipIndex {
    owner_api_version: String,
    owner_kind: String,
    state: RwLock<IndexState>,
    synced: AtomicBool,
    synced_notify: Notify,
}

#[derive(Debug, Default)]
struct IndexState {
    live: Attributions,
    // Contents of an in-progress relist, swapped in at InitDone.
    relist: Option<Attributions>,
}

#[derive(Debug, Default)]
struct Attributions {
    children: HashMap<ObjectKey, BTreeSet<String>>,
    owners: HashMap<ObjectKey, ObjectKey>,
}

impl Attributions {
    fn remove(&mut self, child: &ObjectKey) {
        if let Some(owner) = self.owners.remove(child) {
            if let Some(names) = self.children.get_mut(&owner) {
                names.remove(&child.name);
                if names.is_empty() {
                    self.children.remove(&owner);
                }
            }
        }
    }

    fn upsert(&mut self, child: ObjectKey, owner: Option<ObjectKey>) {
        self.remove(&child);
        if let Some(owner) = owner {
            self.children
                .entry(owner.clone())
                .or_default()
                .insert(child.name.clone());
            self.owners.insert(child, owner);
        }
    }
}

impl OwnershipIndex {
    pub fn new(owner_api_version: impl Into<String>, owner_kind: impl Into<String>) -> OwnershipIndex {
        OwnershipIndex {
            owner_api_version: owner_api_version.into(),
            owner_kind: owner_kind.into(),
            state: RwLock::new(IndexState::default()),
            synced: AtomicBool::new(false),
            synced_notify: Notify::new(),
        }
    }

    pub fn for_owner<K: Resource<DynamicType = ()>>() -> OwnershipIndex {
        OwnershipIndex::new(K::api_version(&()), K::kind(&()))
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Returns the key of the Deployment and, if its controller is of the
    // owner type, the key of that controller.
    fn attribute(&self, deployment: &Deployment) -> Option<(ObjectKey, Option<ObjectKey>)> {
        let child = ObjectKey::of(deployment)?;
        let owner = deployment
            .metadata
            .owner_references
            .iter()
            .flatten()
            .find(|owner_ref| owner_ref.controller == Some(true))
            .filter(|owner_ref| {
                owner_ref.api_version == self.owner_api_version && owner_ref.kind == self.owner_kind
            })
            .map(|owner_ref| ObjectKey::new(child.namespace.clone(), owner_ref.name.clone()));
        Some((child, owner))
    }

    /// Records the current attribution of an observed Deployment,
    /// replacing whatever was recorded for it before.
    pub fn observe(&self, deployment: &Deployment) {
        if let Some((child, owner)) = self.attribute(deployment) {
            self.write().live.upsert(child, owner);
        }
    }

    /// Drops an observed Deployment that no longer exists.
    pub fn forget(&self, deployment: &Deployment) {
        if let Some(child) = ObjectKey::of(deployment) {
            self.write().live.remove(&child);
        }
    }

    pub fn apply_watcher_event(&self, event: &watcher::Event<Deployment>) {
        match event {
            watcher::Event::Apply(deployment) => self.observe(deployment),
            watcher::Event::Delete(deployment) => self.forget(deployment),
            watcher::Event::Init => {
                self.write().relist = Some(Attributions::default());
            }
            watcher::Event::InitApply(deployment) => {
                if let Some((child, owner)) = self.attribute(deployment) {
                    if let Some(relist) = self.write().relist.as_mut() {
                        relist.upsert(child, owner);
                    }
                }
            }
            watcher::Event::InitDone => {
                let mut state = self.write();
                if let Some(relist) = state.relist.take() {
                    state.live = relist;
                    self.synced.store(true, Ordering::Release);
                    self.synced_notify.notify_waiters();
                }
            }
        }
    }

    /// Whether a full listing of Deployments has been observed.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Resolves once the first relist has completed.
    pub async fn wait_until_synced(&self) {
        loop {
            let notified = self.synced_notify.notified();
            if self.is_synced() {
                return;
            }
            notified.await;
        }
    }

    /// Names of the Deployments in namespace attributed to the owner called owner_name.
    pub fn children_of(&self, namespace: &str, owner_name: &str) -> BTreeSet<String> {
        self.read()
            .live
            .children
            .get(&ObjectKey::new(namespace, owner_name))
            .cloned()
            .unwrap_or_default()
    }
}
