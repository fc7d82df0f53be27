// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster composer - fans a StrataCluster out into its LogSet, DNSet and
//! CNSet and folds their status back into the cluster.

use crate::config::Config;
use crate::constants::{components, conditions, labels, OPERATOR_NAME};
use crate::engine::{Actor, Context};
use crate::error::{ignore_not_found, Result};
use crate::store::{create_or_update, plan_upsert, ObjectKey, ObjectStore, StoreObject, UpsertOutcome};
use crate::types::{
    CNSet, CNSetSpec, Condition, ConditionStatus, Conditioned, DNSet, DNSetSpec, LogSet,
    LogSetSpec, ObjectRef, StrataCluster,
};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStep {
    UpsertLogSet,
    UpsertDNSet,
    UpsertCNSet,
}

impl fmt::Display for ClusterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpsertLogSet => write!(f, "sync log set"),
            Self::UpsertDNSet => write!(f, "sync dn set"),
            Self::UpsertCNSet => write!(f, "sync cn set"),
        }
    }
}

/// A tier resource whose spec the composer owns
trait Composed: StoreObject + Conditioned {
    type Spec: Clone + Send;

    fn spec_mut(&mut self) -> &mut Self::Spec;
    fn spec_ref(&self) -> &Self::Spec;
}

macro_rules! impl_composed {
    ($kind:ty, $spec:ty) => {
        impl Composed for $kind {
            type Spec = $spec;

            fn spec_mut(&mut self) -> &mut $spec {
                &mut self.spec
            }

            fn spec_ref(&self) -> &$spec {
                &self.spec
            }
        }
    };
}

impl_composed!(LogSet, LogSetSpec);
impl_composed!(DNSet, DNSetSpec);
impl_composed!(CNSet, CNSetSpec);

/// Overwrite the fields the composer owns, keeping everything else the
/// stored object carries (finalizers, status, foreign labels).
fn apply_desired<K: Composed>(current: &mut K, desired: &K) {
    *current.spec_mut() = desired.spec_ref().clone();

    let owners = desired.meta().owner_references.clone().unwrap_or_default();
    let current_owners = current.meta_mut().owner_references.get_or_insert_with(Vec::new);
    for owner in owners {
        if !current_owners.iter().any(|o| o.uid == owner.uid) {
            current_owners.push(owner);
        }
    }
}

fn tier_meta(cluster: &StrataCluster, key: &ObjectKey, component: &str) -> ObjectMeta {
    let owner: Option<OwnerReference> = cluster.controller_owner_ref(&());
    ObjectMeta {
        name: Some(key.name.clone()),
        namespace: Some(key.namespace.clone()),
        labels: Some(BTreeMap::from([
            (labels::NAME.to_string(), OPERATOR_NAME.to_string()),
            (labels::INSTANCE.to_string(), cluster.name_any()),
            (labels::COMPONENT.to_string(), component.to_string()),
            (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        ])),
        owner_references: owner.map(|o| vec![o]),
        ..Default::default()
    }
}

fn tier_ref(key: &ObjectKey) -> ObjectRef {
    ObjectRef::new(&key.name, &key.namespace)
}

/// The LogSet a cluster asks for
pub fn desired_log_set(cluster: &StrataCluster, config: &Config) -> LogSet {
    let mut spec = cluster.spec.log_service.clone();
    spec.pod_set.image.get_or_insert_with(|| cluster.image(config));
    LogSet {
        metadata: tier_meta(cluster, &cluster.log_set_key(), components::LOG),
        spec,
        status: None,
    }
}

pub fn desired_dn_set(cluster: &StrataCluster, config: &Config) -> DNSet {
    let mut basic = cluster.spec.dn.clone();
    basic.pod_set.image.get_or_insert_with(|| cluster.image(config));
    DNSet {
        metadata: tier_meta(cluster, &cluster.dn_set_key(), components::DN),
        spec: DNSetSpec {
            basic,
            log_set_ref: Some(tier_ref(&cluster.log_set_key())),
        },
        status: None,
    }
}

pub fn desired_cn_set(cluster: &StrataCluster, config: &Config) -> CNSet {
    let mut basic = cluster.spec.cn.clone();
    basic.pod_set.image.get_or_insert_with(|| cluster.image(config));
    CNSet {
        metadata: tier_meta(cluster, &cluster.cn_set_key(), components::CN),
        spec: CNSetSpec {
            basic,
            log_set_ref: Some(tier_ref(&cluster.log_set_key())),
            dn_set_ref: Some(tier_ref(&cluster.dn_set_key())),
        },
        status: None,
    }
}

fn needs_write<K: Composed>(current: Option<&K>, desired: K) -> Result<bool> {
    let template = desired.clone();
    Ok(plan_upsert(current, desired, |obj| apply_desired(obj, &template))?.is_some())
}

async fn upsert<K: Composed, S: ObjectStore>(store: &S, desired: K) -> Result<UpsertOutcome> {
    let template = desired.clone();
    create_or_update(store, desired, move |obj: &mut K| apply_desired(obj, &template)).await
}

async fn delete_if_present<K: Composed, S: ObjectStore>(store: &S, key: &ObjectKey) -> Result<bool> {
    if !store.exists::<K>(key).await? {
        return Ok(false);
    }
    info!("Deleting {} {}", K::kind(&()), key);
    ignore_not_found(store.delete::<K>(key).await)?;
    Ok(true)
}

fn readiness<K: Conditioned>(tier: Option<&K>) -> bool {
    tier.map(|t| t.is_ready()).unwrap_or(false)
}

#[derive(Debug, Default, Clone)]
pub struct ClusterActor;

#[async_trait]
impl<S: ObjectStore> Actor<StrataCluster, S> for ClusterActor {
    type Step = ClusterStep;

    async fn observe(&self, ctx: &mut Context<StrataCluster, S>) -> Result<Option<ClusterStep>> {
        let log = ctx.store.get::<LogSet>(&ctx.obj.log_set_key()).await?;
        let dn = ctx.store.get::<DNSet>(&ctx.obj.dn_set_key()).await?;
        let cn = ctx.store.get::<CNSet>(&ctx.obj.cn_set_key()).await?;

        let step = if needs_write(log.as_ref(), desired_log_set(&ctx.obj, &ctx.config))? {
            Some(ClusterStep::UpsertLogSet)
        } else if needs_write(dn.as_ref(), desired_dn_set(&ctx.obj, &ctx.config))? {
            Some(ClusterStep::UpsertDNSet)
        } else if needs_write(cn.as_ref(), desired_cn_set(&ctx.obj, &ctx.config))? {
            Some(ClusterStep::UpsertCNSet)
        } else {
            None
        };

        let pending: Vec<&str> = [
            (components::LOG, readiness(log.as_ref())),
            (components::DN, readiness(dn.as_ref())),
            (components::CN, readiness(cn.as_ref())),
        ]
        .into_iter()
        .filter(|(_, ready)| !ready)
        .map(|(component, _)| component)
        .collect();

        let status = ctx.obj.status.get_or_insert_with(Default::default);
        status.log_service = log.and_then(|t| t.status);
        status.dn = dn.and_then(|t| t.status);
        status.cn = cn.and_then(|t| t.status);

        let condition = if pending.is_empty() {
            Condition::new(
                conditions::READY,
                ConditionStatus::True,
                conditions::reasons::TIERS_READY,
                "",
            )
        } else {
            Condition::new(
                conditions::READY,
                ConditionStatus::False,
                conditions::reasons::TIERS_NOT_READY,
                format!("waiting for tiers: {}", pending.join(", ")),
            )
        };
        ctx.obj.set_condition(condition);

        Ok(step)
    }

    async fn act(&self, ctx: &Context<StrataCluster, S>, step: ClusterStep) -> Result<()> {
        let outcome = match step {
            ClusterStep::UpsertLogSet => {
                upsert(&ctx.store, desired_log_set(&ctx.obj, &ctx.config)).await?
            }
            ClusterStep::UpsertDNSet => {
                upsert(&ctx.store, desired_dn_set(&ctx.obj, &ctx.config)).await?
            }
            ClusterStep::UpsertCNSet => {
                upsert(&ctx.store, desired_cn_set(&ctx.obj, &ctx.config)).await?
            }
        };
        debug!("{} of {}: {:?}", step, ctx.key(), outcome);
        Ok(())
    }

    async fn finalize(&self, ctx: &Context<StrataCluster, S>) -> Result<bool> {
        let mut remaining = false;
        remaining |= delete_if_present::<CNSet, S>(&ctx.store, &ctx.obj.cn_set_key()).await?;
        remaining |= delete_if_present::<DNSet, S>(&ctx.store, &ctx.obj.dn_set_key()).await?;
        remaining |= delete_if_present::<LogSet, S>(&ctx.store, &ctx.obj.log_set_key()).await?;
        Ok(!remaining)
    }
}
