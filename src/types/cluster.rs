// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::cnset::{CNSetBasic, CNSetStatus};
use super::condition::{impl_conditioned, Condition};
use super::dnset::{DNSetBasic, DNSetStatus};
use super::logset::{LogSetSpec, LogSetStatus};
use crate::config::Config;
use crate::constants::components;
use crate::store::ObjectKey;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A complete database cluster, fanned out into one resource per tier.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "core.strata.dev", version = "v1alpha1", kind = "StrataCluster")]
#[kube(namespaced)]
#[kube(status = "StrataClusterStatus")]
#[kube(shortname = "sc")]
#[serde(rename_all = "camelCase")]
pub struct StrataClusterSpec {
    pub log_service: LogSetSpec,
    pub dn: DNSetBasic,
    pub cn: CNSetBasic,
    /// Image tag shared by all tiers, defaults to the operator's recommended version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Override for the image repository, e.g. a registry mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,
}

impl StrataCluster {
    /// Get the image every tier runs unless it pins its own
    pub fn image(&self, config: &Config) -> String {
        let repository = self
            .spec
            .image_repository
            .as_deref()
            .unwrap_or(&config.image_repository);
        let version = self
            .spec
            .version
            .as_deref()
            .unwrap_or(&config.default_version);
        format!("{}:{}", repository, version)
    }

    pub fn log_set_key(&self) -> ObjectKey {
        self.tier_key(components::LOG)
    }

    pub fn dn_set_key(&self) -> ObjectKey {
        self.tier_key(components::DN)
    }

    pub fn cn_set_key(&self) -> ObjectKey {
        self.tier_key(components::CN)
    }

    fn tier_key(&self, component: &str) -> ObjectKey {
        ObjectKey::new(
            self.namespace().unwrap_or_default(),
            tier_name(&self.name_any(), component),
        )
    }
}

/// Deterministic name of a tier resource owned by a cluster
pub fn tier_name(cluster_name: &str, component: &str) -> String {
    format!("{}-{}", cluster_name, component)
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StrataClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_service: Option<LogSetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<DNSetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cn: Option<CNSetStatus>,
}

impl_conditioned!(StrataCluster);
