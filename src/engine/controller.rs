// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wiring of an [`Engine`] into a kube-runtime controller.

use super::{Actor, Engine, Managed};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::store::{KubeStore, ObjectKey};
use futures::StreamExt;
use kube::runtime::{controller::Action, Controller};
use kube::{Api, Client, Resource};
use kube_runtime::watcher::Config as WatcherConfig;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An API handle limited to the watched namespace, if any
pub fn scoped_api<T>(client: &Client, config: &Config) -> Api<T>
where
    T: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Register an owned child kind, so changes to children requeue their owner
pub fn owns<K, Child>(controller: Controller<K>, client: &Client, config: &Config) -> Controller<K>
where
    K: Managed,
    Child: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    controller.owns(scoped_api::<Child>(client, config), WatcherConfig::default())
}

/// Run `engine` for every `K` the controller sees until shutdown
pub async fn run_controller<K, A>(
    engine: Engine<K, A, KubeStore>,
    controller: Controller<K>,
) -> anyhow::Result<()>
where
    K: Managed,
    A: Actor<K, KubeStore>,
{
    info!("Starting {} controller", K::kind(&()));
    controller
        .shutdown_on_signal()
        .run(reconcile::<K, A>, error_policy::<K, A>, Arc::new(engine))
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled {:?}", o),
                Err(e) => warn!("Reconciliation error: {:?}", e),
            }
        })
        .await;
    info!("{} controller stopped", K::kind(&()));

    Ok(())
}

async fn reconcile<K, A>(obj: Arc<K>, engine: Arc<Engine<K, A, KubeStore>>) -> Result<Action>
where
    K: Managed,
    A: Actor<K, KubeStore>,
{
    engine.reconcile(&obj).await
}

fn error_policy<K, A>(obj: Arc<K>, error: &StrataError, engine: Arc<Engine<K, A, KubeStore>>) -> Action
where
    K: Managed,
    A: Actor<K, KubeStore>,
{
    let key = ObjectKey::of(obj.as_ref());
    let delay = engine.error_delay(&key);
    error!("Reconciliation of {} {} failed, retrying in {:?}: {}", K::kind(&()), key, delay, error);
    Action::requeue(delay)
}
