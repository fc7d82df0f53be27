// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::common::{ObjectRef, PodSet, ServiceType, Volume};
use super::condition::{impl_conditioned, Condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The storage tier.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "core.strata.dev", version = "v1alpha1", kind = "DNSet")]
#[kube(namespaced)]
#[kube(status = "DNSetStatus")]
#[kube(shortname = "dn")]
#[serde(rename_all = "camelCase")]
pub struct DNSetSpec {
    #[serde(flatten)]
    pub basic: DNSetBasic,
    /// The log tier this storage tier registers with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_set_ref: Option<ObjectRef>,
}

/// The user-facing part of a storage tier, as embedded in a cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSetBasic {
    #[serde(flatten)]
    pub pod_set: PodSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_volume: Option<Volume>,
    #[serde(default)]
    pub service_type: ServiceType,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
}

impl_conditioned!(DNSet);
