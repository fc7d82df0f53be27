// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::common::{PodSet, Volume};
use super::condition::{impl_conditioned, Condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The metadata/log tier. Hosts the coordination service the other tiers
/// register with.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "core.strata.dev", version = "v1alpha1", kind = "LogSet")]
#[kube(namespaced)]
#[kube(status = "LogSetStatus")]
#[kube(shortname = "log")]
#[serde(rename_all = "camelCase")]
pub struct LogSetSpec {
    #[serde(flatten)]
    pub pod_set: PodSet,
    pub volume: Volume,
    #[serde(default)]
    pub initial_config: InitialConfig,
}

/// Shard layout used when the log tier bootstraps; immutable afterwards
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitialConfig {
    pub log_shards: i32,
    pub dn_shards: i32,
    /// Replicas per log shard; defaults to the pod replica count capped at 3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_shard_replicas: Option<i32>,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            log_shards: 1,
            dn_shards: 1,
            log_shard_replicas: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<Discovery>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
}

/// Where clients reach the coordination service
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    pub address: String,
    pub port: i32,
}

impl std::fmt::Display for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl_conditioned!(LogSet);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::condition::Conditioned;

    #[test]
    fn test_deserialize_flattened_pod_set() {
        let spec: LogSetSpec = serde_json::from_value(serde_json::json!({
            "replicas": 3,
            "image": "strata/strata:1.0",
            "volume": {"size": "10Gi"}
        }))
        .unwrap();

        assert_eq!(spec.pod_set.replicas, 3);
        assert_eq!(spec.volume.size, "10Gi");
        assert_eq!(spec.initial_config, InitialConfig::default());
    }

    #[test]
    fn test_conditions_on_missing_status() {
        let mut ls = LogSet::new(
            "demo-log",
            LogSetSpec {
                pod_set: PodSet {
                    replicas: 3,
                    ..Default::default()
                },
                volume: Volume {
                    size: "1Gi".to_string(),
                    storage_class_name: None,
                },
                initial_config: InitialConfig::default(),
            },
        );
        assert!(ls.conditions().is_empty());
        assert!(!ls.is_ready());

        ls.set_condition(Condition::new(
            "Ready",
            crate::types::ConditionStatus::True,
            "PodsReady",
            "",
        ));
        assert!(ls.status.is_some());
        assert!(ls.is_ready());
    }

    #[test]
    fn test_discovery_display() {
        let d = Discovery {
            address: "demo-log-discovery.db.svc".to_string(),
            port: 32001,
        };
        assert_eq!(d.to_string(), "demo-log-discovery.db.svc:32001");
    }
}
