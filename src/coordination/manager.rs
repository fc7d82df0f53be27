// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{CoordinationClient, Connector};
use crate::builder::logset::discovery;
use crate::error::{Result, StrataError};
use crate::store::{ObjectKey, ObjectStore};
use crate::types::{Conditioned, LogSet};
use kube::ResourceExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Why a pooled client was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    OwnerDeleted,
    OwnerRecreated,
    OwnerReady,
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerDeleted => write!(f, "owner deleted"),
            Self::OwnerRecreated => write!(f, "owner recreated"),
            Self::OwnerReady => write!(f, "owner ready"),
        }
    }
}

/// Decide whether a pooled client should be evicted given the current state
/// of its owner.
pub fn evict_reason(
    owner_exists: bool,
    instance_matches: bool,
    owner_ready: bool,
) -> Option<EvictReason> {
    if !owner_exists {
        Some(EvictReason::OwnerDeleted)
    } else if !instance_matches {
        Some(EvictReason::OwnerRecreated)
    } else if owner_ready {
        Some(EvictReason::OwnerReady)
    } else {
        None
    }
}

struct PooledClient {
    owner_uid: String,
    client: Arc<dyn CoordinationClient>,
}

/// Pool of coordination clients, one per log tier instance.
///
/// A client lives while its owning LogSet is bootstrapping. The sweeper
/// closes clients whose owner was deleted, recreated or has become ready.
pub struct ClientManager<S: ObjectStore> {
    store: S,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    clients: Mutex<HashMap<ObjectKey, PooledClient>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<S: ObjectStore> ClientManager<S> {
    pub fn new(store: S, connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            connector,
            connect_timeout,
            clients: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Get the pooled client for `owner`, connecting on first use.
    ///
    /// Concurrent callers for the same owner share one connection attempt.
    #[instrument(skip(self, owner), fields(logset = %ObjectKey::of(owner)))]
    pub async fn get_client(&self, owner: &LogSet) -> Result<Arc<dyn CoordinationClient>> {
        let key = ObjectKey::of(owner);
        let uid = owner
            .uid()
            .ok_or_else(|| StrataError::CoordinationError(format!("{} has no uid yet", key)))?;

        let mut clients = self.clients.lock().await;
        if let Some(pooled) = clients.get(&key) {
            if pooled.owner_uid == uid {
                return Ok(pooled.client.clone());
            }
        }
        if let Some(stale) = clients.remove(&key) {
            info!("Replacing client of recreated LogSet {}", key);
            self.dispatch_close(key.clone(), stale);
        }

        let address = owner
            .status
            .as_ref()
            .and_then(|s| s.discovery.clone())
            .unwrap_or_else(|| discovery(owner))
            .to_string();
        let client = self.connector.connect(&address, self.connect_timeout).await?;
        info!("Opened coordination client for {} at {}", key, address);
        clients.insert(
            key,
            PooledClient {
                owner_uid: uid,
                client: client.clone(),
            },
        );
        Ok(client)
    }

    /// Evict clients whose owners no longer need them. Returns the number evicted.
    pub async fn sweep(&self) -> usize {
        let snapshot: Vec<(ObjectKey, String)> = {
            let clients = self.clients.lock().await;
            clients
                .iter()
                .map(|(key, pooled)| (key.clone(), pooled.owner_uid.clone()))
                .collect()
        };

        let mut evicted = 0;
        for (key, uid) in snapshot {
            let owner = match self.store.get::<LogSet>(&key).await {
                Ok(owner) => owner,
                Err(e) => {
                    warn!("Skipping client of {} this sweep: {}", key, e);
                    continue;
                }
            };
            let reason = match &owner {
                None => evict_reason(false, false, false),
                Some(owner) => evict_reason(
                    true,
                    owner.uid().as_deref() == Some(uid.as_str()),
                    owner.is_ready(),
                ),
            };
            let Some(reason) = reason else {
                continue;
            };

            let removed = {
                let mut clients = self.clients.lock().await;
                match clients.get(&key) {
                    // replaced by get_client since the snapshot was taken
                    Some(pooled) if pooled.owner_uid != uid => None,
                    Some(_) => clients.remove(&key),
                    None => None,
                }
            };
            if let Some(pooled) = removed {
                info!("Evicting coordination client of {}: {}", key, reason);
                self.dispatch_close(key, pooled);
                evicted += 1;
            }
        }
        evicted
    }

    fn dispatch_close(&self, key: ObjectKey, pooled: PooledClient) {
        tokio::spawn(async move {
            if let Err(e) = pooled.client.close().await {
                error!("Failed to close coordination client of {}: {}", key, e);
            }
        });
    }

    /// Run [`ClientManager::sweep`] every `interval` until [`ClientManager::shutdown`].
    ///
    /// A sweep that has started always runs to completion.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            info!("Client sweeper started with interval {:?}", interval);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                let evicted = manager.sweep().await;
                debug!("Client sweep evicted {} client(s)", evicted);
            }
            info!("Client sweeper stopped");
        })
    }

    /// Stop the sweeper
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.clients.lock().await.contains_key(key)
    }
}
