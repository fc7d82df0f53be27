// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::common::{ObjectRef, PodSet, ServiceType, Volume};
use super::condition::{impl_conditioned, Condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The compute tier; the entry point SQL clients connect to.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "core.strata.dev", version = "v1alpha1", kind = "CNSet")]
#[kube(namespaced)]
#[kube(status = "CNSetStatus")]
#[kube(shortname = "cn")]
#[serde(rename_all = "camelCase")]
pub struct CNSetSpec {
    #[serde(flatten)]
    pub basic: CNSetBasic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_set_ref: Option<ObjectRef>,
    /// Optional storage tier the compute tier waits for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn_set_ref: Option<ObjectRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CNSetBasic {
    #[serde(flatten)]
    pub pod_set: PodSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_volume: Option<Volume>,
    #[serde(default)]
    pub service_type: ServiceType,
    /// Node port for NodePort/LoadBalancer services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service_annotations: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CNSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl_conditioned!(CNSet);
