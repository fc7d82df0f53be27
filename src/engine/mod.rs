// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The generic reconciliation engine.
//!
//! Each cycle walks the same lifecycle for every managed kind: finalization
//! on deletion, finalizer registration, dependency gating, then observation
//! of current state and at most one corrective step. Kind specific behavior
//! lives behind [`Actor`].

pub mod controller;
pub mod dependency;

pub use controller::run_controller;
pub use dependency::{Dependency, DependencyKind, DependencyState};

use crate::config::Config;
use crate::constants::conditions::{reasons, READY, SYNCED};
use crate::constants::FINALIZER;
use crate::error::{ignore_not_found, Result, StrataError};
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use crate::types::{Condition, ConditionStatus, Conditioned};
use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A resource kind the engine can reconcile
pub trait Managed: StoreObject + Conditioned {}

impl<T: StoreObject + Conditioned> Managed for T {}

/// What an actor sees during one reconcile cycle.
///
/// `obj` is a private copy; status changes made to it are written back by
/// the engine once the cycle ends.
pub struct Context<K, S> {
    pub obj: K,
    pub store: S,
    pub config: Arc<Config>,
}

impl<K: Managed, S> Context<K, S> {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::of(&self.obj)
    }

    /// Namespace of the object being reconciled
    pub fn namespace(&self) -> String {
        self.obj.namespace().unwrap_or_default()
    }
}

/// Kind specific reconciliation behavior
#[async_trait]
pub trait Actor<K: Managed, S: ObjectStore>: Send + Sync + 'static {
    /// One corrective step; describes itself for logs and conditions
    type Step: fmt::Display + Send;

    /// Resources that must be usable before this one is observed
    fn dependencies(&self, _obj: &K) -> Vec<Dependency> {
        Vec::new()
    }

    /// Compare desired with current state. Returns the next step, or `None`
    /// when converged. May update the status of `ctx.obj` but must not write.
    async fn observe(&self, ctx: &mut Context<K, S>) -> Result<Option<Self::Step>>;

    async fn act(&self, ctx: &Context<K, S>, step: Self::Step) -> Result<()>;

    /// Release owned state. `Ok(true)` once nothing remains.
    async fn finalize(&self, ctx: &Context<K, S>) -> Result<bool>;
}

/// Per-object exponential backoff for failed cycles
#[derive(Debug)]
pub struct ErrorBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl ErrorBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and get the delay before the next attempt
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = self.base.saturating_mul(2u32.saturating_pow(*count)).min(self.max);
        *count = count.saturating_add(1);
        delay
    }

    pub fn reset(&self, key: &ObjectKey) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// Drives an [`Actor`] through the reconcile lifecycle
pub struct Engine<K, A, S> {
    store: S,
    actor: A,
    config: Arc<Config>,
    backoff: ErrorBackoff,
    _kind: PhantomData<fn() -> K>,
}

fn status_of<K: Managed>(obj: &K) -> Result<Value> {
    Ok(serde_json::to_value(obj)?
        .get("status")
        .cloned()
        .unwrap_or(Value::Null))
}

fn has_finalizer<K: Managed>(obj: &K) -> bool {
    obj.finalizers().iter().any(|f| f == FINALIZER)
}

impl<K, A, S> Engine<K, A, S>
where
    K: Managed,
    A: Actor<K, S>,
    S: ObjectStore,
{
    pub fn new(store: S, actor: A, config: Arc<Config>) -> Self {
        let backoff = ErrorBackoff::new(config.error_backoff_base, config.error_backoff_max);
        Self {
            store,
            actor,
            config,
            backoff,
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// Delay before retrying `key` after a failed cycle
    pub fn error_delay(&self, key: &ObjectKey) -> Duration {
        self.backoff.next_delay(key)
    }

    /// Run one reconcile cycle for `obj`
    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), object = %ObjectKey::of(obj)))]
    pub async fn reconcile(&self, obj: &K) -> Result<Action> {
        let key = ObjectKey::of(obj);
        let result = self.run_cycle(obj).await;
        if result.is_ok() {
            self.backoff.reset(&key);
        }
        result
    }

    async fn run_cycle(&self, obj: &K) -> Result<Action> {
        let mut ctx = Context {
            obj: obj.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        };

        if obj.meta().deletion_timestamp.is_some() {
            return self.finalize(&ctx).await;
        }

        if !has_finalizer(obj) {
            let mut updated = obj.clone();
            updated.finalizers_mut().push(FINALIZER.to_string());
            self.store.update(&updated).await?;
            debug!("Added finalizer to {}", ctx.key());
            return Ok(Action::requeue(self.config.action_requeue));
        }

        let before = status_of(&ctx.obj)?;

        let dependencies = self.actor.dependencies(&ctx.obj);
        let state = dependency::resolve(&self.store, &dependencies).await?;
        if let DependencyState::Waiting { .. } = &state {
            let message = state.message();
            info!("{} is {}", ctx.key(), message);
            self.set_synced(&mut ctx.obj, false, reasons::DEPENDENCY_NOT_READY, &message);
            self.persist_status(&ctx.obj, &before).await?;
            return Ok(Action::requeue(self.config.dependency_poll));
        }

        let step = match self.actor.observe(&mut ctx).await {
            Ok(step) => step,
            Err(e) if e.is_build() => return self.build_failed(&mut ctx.obj, &before, e).await,
            Err(e) => return Err(e),
        };

        match step {
            None => {
                self.set_synced(&mut ctx.obj, true, reasons::SYNCED, "");
                self.persist_status(&ctx.obj, &before).await?;
                debug!("{} is converged", ctx.key());
                Ok(Action::requeue(self.config.resync_interval))
            }
            Some(step) => {
                let description = step.to_string();
                info!("Applying step to {}: {}", ctx.key(), description);
                if let Err(e) = self.actor.act(&ctx, step).await {
                    if e.is_build() {
                        return self.build_failed(&mut ctx.obj, &before, e).await;
                    }
                    self.set_synced(&mut ctx.obj, false, reasons::ACTION_FAILED, &e.to_string());
                    if let Err(persist) = self.persist_status(&ctx.obj, &before).await {
                        warn!("Failed to record action failure on {}: {}", ctx.key(), persist);
                    }
                    return Err(e);
                }
                self.set_synced(&mut ctx.obj, false, reasons::RECONCILING, &description);
                self.persist_status(&ctx.obj, &before).await?;
                Ok(Action::requeue(self.config.action_requeue))
            }
        }
    }

    async fn finalize(&self, ctx: &Context<K, S>) -> Result<Action> {
        if !has_finalizer(&ctx.obj) {
            return Ok(Action::await_change());
        }

        if !self.actor.finalize(ctx).await? {
            debug!("Finalization of {} still in progress", ctx.key());
            return Ok(Action::requeue(self.config.action_requeue));
        }

        let mut updated = ctx.obj.clone();
        updated.finalizers_mut().retain(|f| f != FINALIZER);
        ignore_not_found(self.store.update(&updated).await.map(|_| ()))?;
        info!("Finalized {}", ctx.key());
        Ok(Action::await_change())
    }

    /// A spec that cannot be built will not heal by retrying; wait for an edit
    async fn build_failed(&self, obj: &mut K, before: &Value, error: StrataError) -> Result<Action> {
        warn!("Cannot build desired state of {}: {}", ObjectKey::of(obj), error);
        let message = error.to_string();
        self.set_synced(obj, false, reasons::BUILD_FAILED, &message);
        obj.set_condition(Condition::new(
            READY,
            ConditionStatus::False,
            reasons::BUILD_FAILED,
            message,
        ));
        self.persist_status(obj, before).await?;
        Ok(Action::await_change())
    }

    fn set_synced(&self, obj: &mut K, synced: bool, reason: &str, message: &str) {
        obj.set_condition(Condition::new(SYNCED, synced.into(), reason, message));
    }

    async fn persist_status(&self, obj: &K, before: &Value) -> Result<()> {
        if status_of(obj)? == *before {
            return Ok(());
        }
        self.store.update_status(obj).await?;
        Ok(())
    }
}
