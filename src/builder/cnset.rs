// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::dnset::coordination_addresses;
use super::{config, SubResourceBuilder, Tier};
use crate::constants::{components, paths, ports};
use crate::error::{Result, StrataError};
use crate::types::{CNSet, ServiceType};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort};
use kube::ResourceExt;
use serde_json::json;

impl SubResourceBuilder for CNSet {
    fn tier(&self) -> Result<Tier<'_>> {
        let basic = &self.spec.basic;
        if basic.node_port.is_some() && basic.service_type == ServiceType::ClusterIP {
            return Err(StrataError::BuildError(format!(
                "nodePort requires serviceType NodePort or LoadBalancer, got {}",
                basic.service_type
            )));
        }
        Tier::new(
            self,
            components::CN,
            &basic.pod_set,
            basic.cache_volume.as_ref(),
            vec![("sql", ports::CN_SQL)],
        )
    }

    fn build_service(&self) -> Result<Service> {
        let basic = &self.spec.basic;
        let mut service = self.tier()?.service(
            &basic.service_type,
            vec![ServicePort {
                name: Some("sql".to_string()),
                port: ports::CN_SQL,
                node_port: basic.node_port,
                ..Default::default()
            }],
        );
        if !basic.service_annotations.is_empty() {
            service.metadata.annotations = Some(basic.service_annotations.clone());
        }
        Ok(service)
    }

    fn build_config(&self) -> Result<ConfigMap> {
        let tier = self.tier()?;
        let addresses = coordination_addresses(
            self.spec.log_set_ref.as_ref(),
            &self.namespace().unwrap_or_default(),
        )?;

        let managed = json!({
            "service-type": "CN",
            "data-dir": paths::DATA_PATH,
            "fileservice": [{
                "name": "LOCAL",
                "backend": "DISK",
                "data-dir": paths::DATA_PATH,
            }],
            "cn": {
                "hakeeper-client": {
                    "service-addresses": addresses,
                },
                "frontend": {
                    "port": ports::CN_SQL,
                },
            },
        });
        let rendered = config::render(&managed, self.spec.basic.pod_set.config.as_deref())?;
        Ok(tier.config_map(rendered, config::start_script(3, ports::CN_SQL)))
    }
}

/// In-cluster host clients connect to
pub fn sql_host(cn: &CNSet) -> String {
    format!("{}.{}.svc", cn.name_any(), cn.namespace().unwrap_or_default())
}
