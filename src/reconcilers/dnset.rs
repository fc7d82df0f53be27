// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::tier::{self, Observation, TierStep};
use crate::builder::{SubResourceBuilder, SubResourceNames};
use crate::constants::components;
use crate::engine::dependency::ready_and_synced;
use crate::engine::{Actor, Context, Dependency, DependencyKind};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::types::DNSet;
use async_trait::async_trait;
use kube::ResourceExt;

/// Runs the transaction tier once its log tier is up
#[derive(Debug, Default, Clone)]
pub struct DNSetActor;

#[async_trait]
impl<S: ObjectStore> Actor<DNSet, S> for DNSetActor {
    type Step = TierStep;

    fn dependencies(&self, dn: &DNSet) -> Vec<Dependency> {
        let namespace = dn.namespace().unwrap_or_default();
        dn.spec
            .log_set_ref
            .iter()
            .map(|r| Dependency::new(DependencyKind::LogSet, r.key(&namespace), ready_and_synced))
            .collect()
    }

    async fn observe(&self, ctx: &mut Context<DNSet, S>) -> Result<Option<TierStep>> {
        let desired = ctx.obj.desired_state()?;
        let converged = match tier::observe(&ctx.store, desired).await? {
            Observation::Step(step) => return Ok(Some(step)),
            Observation::Converged(converged) => converged,
        };

        let status = ctx.obj.status.get_or_insert_with(Default::default);
        status.replicas = converged.replicas;
        status.ready_replicas = converged.ready_replicas;
        tier::set_pod_readiness(&mut ctx.obj, &converged, converged.all_ready());
        Ok(None)
    }

    async fn act(&self, ctx: &Context<DNSet, S>, step: TierStep) -> Result<()> {
        tier::act(&ctx.store, step).await
    }

    async fn finalize(&self, ctx: &Context<DNSet, S>) -> Result<bool> {
        let names = SubResourceNames::new(&ctx.obj.name_any(), components::DN);
        tier::finalize(&ctx.store, &ctx.namespace(), &names).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::store::ObjectKey;
    use crate::test_utils::{make_dn_set, make_log_set, MemoryStore};
    use crate::types::{Condition, ConditionStatus, Conditioned, LogSet};
    use k8s_openapi::api::apps::v1::StatefulSet;
    use kube::runtime::controller::Action;
    use std::sync::Arc;

    fn engine(store: &MemoryStore) -> Engine<DNSet, DNSetActor, MemoryStore> {
        Engine::new(store.clone(), DNSetActor, Arc::new(Config::default()))
    }

    async fn reconcile(store: &MemoryStore, engine: &Engine<DNSet, DNSetActor, MemoryStore>) -> Action {
        let dn = store
            .get::<DNSet>(&ObjectKey::new("databases", "demo-dn"))
            .await
            .unwrap()
            .unwrap();
        engine.reconcile(&dn).await.unwrap()
    }

    #[tokio::test]
    async fn test_waits_for_log_set_without_writing() {
        let store = MemoryStore::default();
        let engine = engine(&store);
        let created = store
            .create(&make_dn_set("demo-dn", 1, Some("demo-log")))
            .await
            .unwrap();
        reconcile(&store, &engine).await;
        let writes = store.writes();

        let action = reconcile(&store, &engine).await;

        assert_eq!(action, Action::requeue(Config::default().dependency_poll));
        assert_eq!(store.writes(), writes);
        let stored = store.get::<DNSet>(&ObjectKey::of(&created)).await.unwrap().unwrap();
        assert_eq!(stored.spec, created.spec);
        assert!(!stored.is_synced());
        assert!(store
            .get::<StatefulSet>(&ObjectKey::new("databases", "demo-dn"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_proceeds_once_log_set_ready_and_synced() {
        let store = MemoryStore::default();
        let engine = engine(&store);
        store
            .create(&make_dn_set("demo-dn", 1, Some("demo-log")))
            .await
            .unwrap();
        let mut ls = store.create(&make_log_set("demo-log", 3)).await.unwrap();

        // ready but not synced is not enough
        ls.set_condition(Condition::new("Ready", ConditionStatus::True, "PodsReady", ""));
        let ls: LogSet = store.update_status(&ls).await.unwrap();
        reconcile(&store, &engine).await;
        reconcile(&store, &engine).await;
        assert_eq!(store.count(crate::test_utils::Op::Create), 2);

        let mut ls = ls;
        ls.set_condition(Condition::new("Synced", ConditionStatus::True, "Synced", ""));
        store.update_status(&ls).await.unwrap();
        for _ in 0..5 {
            reconcile(&store, &engine).await;
        }
        assert!(store
            .get::<StatefulSet>(&ObjectKey::new("databases", "demo-dn"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_build_error_does_not_create_anything() {
        let store = MemoryStore::default();
        let engine = engine(&store);
        let mut dn = make_dn_set("demo-dn", 1, None);
        dn.spec.basic.pod_set.image = None;
        store.create(&dn).await.unwrap();

        reconcile(&store, &engine).await;
        let action = reconcile(&store, &engine).await;

        assert_eq!(action, Action::await_change());
        // only the DNSet itself was created
        assert_eq!(store.count(crate::test_utils::Op::Create), 1);
    }
}
