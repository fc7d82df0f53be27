// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The object store seam: everything the reconcilers read and write goes
//! through [`ObjectStore`], backed by the Kubernetes API in production.

pub mod kube_store;

pub use kube_store::KubeStore;

use crate::error::Result;
use kube::{Resource, ResourceExt};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tracing::debug;

/// Namespaced identity of a stored object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Any namespaced Kubernetes object the store can hold
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoreObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Persistence for resources and their sub-resources.
///
/// A missing object is `Ok(None)` from [`ObjectStore::get`] and
/// `StrataError::NotFound` from the mutating calls.
#[async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>>;

    async fn exists<K: StoreObject>(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.get::<K>(key).await?.is_some())
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K>;

    /// Replace spec and metadata; fails with a conflict on a stale resource version
    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K>;

    /// Write only the status of an object
    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K>;

    /// Request deletion. Objects carrying finalizers linger until those are cleared.
    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<()>;

    async fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Work out what an upsert would write, without writing it.
///
/// Returns `None` when `mutate` leaves the current object unchanged.
pub fn plan_upsert<K, F>(current: Option<&K>, initial: K, mutate: F) -> Result<Option<K>>
where
    K: StoreObject,
    F: FnOnce(&mut K),
{
    match current {
        None => {
            let mut obj = initial;
            mutate(&mut obj);
            Ok(Some(obj))
        }
        Some(current) => {
            let mut desired = current.clone();
            mutate(&mut desired);
            if serde_json::to_value(&desired)? == serde_json::to_value(current)? {
                Ok(None)
            } else {
                Ok(Some(desired))
            }
        }
    }
}

/// Create `initial` (after applying `mutate`) when absent, otherwise apply
/// `mutate` to the stored copy and write it back if that changed anything.
///
/// Only the fields `mutate` touches are owned by the caller; everything else
/// on a stored object is preserved.
pub async fn create_or_update<K, S, F>(store: &S, initial: K, mutate: F) -> Result<UpsertOutcome>
where
    K: StoreObject,
    S: ObjectStore,
    F: FnOnce(&mut K) + Send,
{
    let key = ObjectKey::of(&initial);
    let current = store.get::<K>(&key).await?;
    let exists = current.is_some();

    match plan_upsert(current.as_ref(), initial, mutate)? {
        None => {
            debug!("{} {} is up to date", K::kind(&()), key);
            Ok(UpsertOutcome::Unchanged)
        }
        Some(obj) if exists => {
            store.update(&obj).await?;
            Ok(UpsertOutcome::Updated)
        }
        Some(obj) => {
            store.create(&obj).await?;
            Ok(UpsertOutcome::Created)
        }
    }
}
