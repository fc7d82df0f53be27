// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! LogSet actor. A log tier only reports ready once its pods are up and the
//! coordination service it hosts accepts a client.

use super::tier::{self, Observation, TierStep};
use crate::builder::logset::discovery;
use crate::builder::{SubResourceBuilder, SubResourceNames};
use crate::constants::components;
use crate::coordination::ClientManager;
use crate::engine::{Actor, Context};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::types::{Conditioned, LogSet};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

pub struct LogSetActor<S: ObjectStore> {
    clients: Arc<ClientManager<S>>,
}

impl<S: ObjectStore> LogSetActor<S> {
    pub fn new(clients: Arc<ClientManager<S>>) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl<S: ObjectStore> Actor<LogSet, S> for LogSetActor<S> {
    type Step = TierStep;

    async fn observe(&self, ctx: &mut Context<LogSet, S>) -> Result<Option<TierStep>> {
        let desired = ctx.obj.desired_state()?;
        let converged = match tier::observe(&ctx.store, desired).await? {
            Observation::Step(step) => return Ok(Some(step)),
            Observation::Converged(converged) => converged,
        };

        let ready = if !converged.all_ready() {
            false
        } else if ctx.obj.is_ready() {
            true
        } else {
            // still bootstrapping; ready once the coordination service answers
            self.clients.get_client(&ctx.obj).await?;
            debug!("Coordination service of {} is reachable", ctx.key());
            true
        };

        let address = discovery(&ctx.obj);
        let status = ctx.obj.status.get_or_insert_with(Default::default);
        status.replicas = converged.replicas;
        status.ready_replicas = converged.ready_replicas;
        status.discovery = Some(address);
        tier::set_pod_readiness(&mut ctx.obj, &converged, ready);
        Ok(None)
    }

    async fn act(&self, ctx: &Context<LogSet, S>, step: TierStep) -> Result<()> {
        tier::act(&ctx.store, step).await
    }

    async fn finalize(&self, ctx: &Context<LogSet, S>) -> Result<bool> {
        let names = SubResourceNames::new(&ctx.obj.name_any(), components::LOG);
        tier::finalize(&ctx.store, &ctx.namespace(), &names).await
    }
}
