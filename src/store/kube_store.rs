// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store backed by the Kubernetes API server

use super::{ObjectKey, ObjectStore, StoreObject};
use crate::constants::OPERATOR_NAME;
use crate::error::{Result, StrataError};
use async_trait::async_trait;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client,
};
use serde_json::json;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

/// Map API status codes onto the store's error taxonomy
fn classify(err: kube::Error, key: &ObjectKey) -> StrataError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => StrataError::NotFound(key.to_string()),
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            StrataError::AlreadyExists(key.to_string())
        }
        kube::Error::Api(resp) if resp.code == 409 => StrataError::Conflict(key.to_string()),
        _ => StrataError::KubeError(err),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), key = %ObjectKey::of(obj)))]
    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj);
        debug!("Creating object");
        self.api::<K>(&key.namespace)
            .create(&post_params(), obj)
            .await
            .map_err(|e| classify(e, &key))
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), key = %ObjectKey::of(obj)))]
    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj);
        debug!("Replacing object");
        self.api::<K>(&key.namespace)
            .replace(&key.name, &post_params(), obj)
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj);
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        self.api::<K>(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::default(),
                &Patch::Merge(json!({ "status": status })),
            )
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<()> {
        self.api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, key))
    }

    async fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>> {
        let list = self.api::<K>(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }
}
