// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{config, SubResourceBuilder, SubResourceNames, Tier};
use crate::constants::{components, paths, ports, MAX_COORDINATION_REPLICAS};
use crate::error::{Result, StrataError};
use crate::types::{Discovery, LogSet, ServiceType};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort};
use kube::ResourceExt;
use serde_json::json;

/// Where the coordination service of `log_set` is reachable
pub fn discovery(log_set: &LogSet) -> Discovery {
    let names = SubResourceNames::new(&log_set.name_any(), components::LOG);
    Discovery {
        address: format!(
            "{}.{}.svc",
            names.service,
            log_set.namespace().unwrap_or_default()
        ),
        port: ports::COORDINATION,
    }
}

/// Stable addresses of the pods taking part in coordination
pub fn coordination_members(log_set: &LogSet) -> Vec<String> {
    let name = log_set.name_any();
    let names = SubResourceNames::new(&name, components::LOG);
    let namespace = log_set.namespace().unwrap_or_default();
    (0..log_set.spec.pod_set.replicas.min(MAX_COORDINATION_REPLICAS))
        .map(|ordinal| {
            format!(
                "{}-{}.{}.{}.svc:{}",
                name,
                ordinal,
                names.headless_service,
                namespace,
                ports::COORDINATION
            )
        })
        .collect()
}

impl SubResourceBuilder for LogSet {
    fn tier(&self) -> Result<Tier<'_>> {
        if self.spec.pod_set.replicas < 1 {
            return Err(StrataError::BuildError(
                "a log set needs at least one replica".to_string(),
            ));
        }
        let initial = &self.spec.initial_config;
        if initial.log_shards < 1 || initial.dn_shards < 1 {
            return Err(StrataError::BuildError(
                "initialConfig shard counts must be positive".to_string(),
            ));
        }
        if let Some(replicas) = initial.log_shard_replicas {
            if replicas < 1 || replicas > self.spec.pod_set.replicas {
                return Err(StrataError::BuildError(format!(
                    "logShardReplicas must be between 1 and {}",
                    self.spec.pod_set.replicas
                )));
            }
        }

        Tier::new(
            self,
            components::LOG,
            &self.spec.pod_set,
            Some(&self.spec.volume),
            vec![
                ("log-service", ports::LOG_SERVICE),
                ("coordination", ports::COORDINATION),
                ("gossip", ports::LOG_GOSSIP),
            ],
        )
    }

    fn build_service(&self) -> Result<Service> {
        Ok(self.tier()?.service(
            &ServiceType::ClusterIP,
            vec![ServicePort {
                name: Some("coordination".to_string()),
                port: ports::COORDINATION,
                ..Default::default()
            }],
        ))
    }

    fn build_config(&self) -> Result<ConfigMap> {
        let tier = self.tier()?;
        let initial = &self.spec.initial_config;
        let shard_replicas = initial
            .log_shard_replicas
            .unwrap_or_else(|| self.spec.pod_set.replicas.min(MAX_COORDINATION_REPLICAS));

        let managed = json!({
            "service-type": "LOG",
            "data-dir": paths::DATA_PATH,
            "logservice": {
                "deployment-id": 1,
                "logservice-listen-address": format!("0.0.0.0:{}", ports::LOG_SERVICE),
                "raft-listen-address": format!("0.0.0.0:{}", ports::COORDINATION),
                "gossip-listen-address": format!("0.0.0.0:{}", ports::LOG_GOSSIP),
                "gossip-seed-addresses": coordination_members(self),
            },
            "hakeeper": {
                "bootstrap": {
                    "num-of-log-shards": initial.log_shards,
                    "num-of-dn-shards": initial.dn_shards,
                    "num-of-log-shard-replicas": shard_replicas,
                    "init-members": coordination_members(self),
                },
            },
        });
        let rendered = config::render(&managed, self.spec.pod_set.config.as_deref())?;
        Ok(tier.config_map(rendered, config::start_script(1, ports::LOG_SERVICE)))
    }
}
