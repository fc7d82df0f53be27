// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::tier::{self, Observation, TierStep};
use crate::builder::cnset::sql_host;
use crate::builder::{SubResourceBuilder, SubResourceNames};
use crate::constants::{components, ports};
use crate::engine::dependency::ready_and_synced;
use crate::engine::{Actor, Context, Dependency, DependencyKind};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::types::CNSet;
use async_trait::async_trait;
use kube::ResourceExt;

/// Runs the compute tier once its log tier, and its DN tier when set, are
/// ready and settled
#[derive(Debug, Default, Clone)]
pub struct CNSetActor;

#[async_trait]
impl<S: ObjectStore> Actor<CNSet, S> for CNSetActor {
    type Step = TierStep;

    fn dependencies(&self, cn: &CNSet) -> Vec<Dependency> {
        let namespace = cn.namespace().unwrap_or_default();
        let log = cn
            .spec
            .log_set_ref
            .iter()
            .map(|r| Dependency::new(DependencyKind::LogSet, r.key(&namespace), ready_and_synced));
        let dn = cn
            .spec
            .dn_set_ref
            .iter()
            .map(|r| Dependency::new(DependencyKind::DNSet, r.key(&namespace), ready_and_synced));
        log.chain(dn).collect()
    }

    async fn observe(&self, ctx: &mut Context<CNSet, S>) -> Result<Option<TierStep>> {
        let desired = ctx.obj.desired_state()?;
        let converged = match tier::observe(&ctx.store, desired).await? {
            Observation::Step(step) => return Ok(Some(step)),
            Observation::Converged(converged) => converged,
        };

        let host = sql_host(&ctx.obj);
        let status = ctx.obj.status.get_or_insert_with(Default::default);
        status.replicas = converged.replicas;
        status.ready_replicas = converged.ready_replicas;
        status.host = Some(host);
        status.port = Some(ports::CN_SQL);
        tier::set_pod_readiness(&mut ctx.obj, &converged, converged.all_ready());
        Ok(None)
    }

    async fn act(&self, ctx: &Context<CNSet, S>, step: TierStep) -> Result<()> {
        tier::act(&ctx.store, step).await
    }

    async fn finalize(&self, ctx: &Context<CNSet, S>) -> Result<bool> {
        let names = SubResourceNames::new(&ctx.obj.name_any(), components::CN);
        tier::finalize(&ctx.store, &ctx.namespace(), &names).await
    }
}
