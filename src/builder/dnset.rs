// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{config, SubResourceBuilder, SubResourceNames, Tier};
use crate::constants::{components, paths, ports};
use crate::error::{Result, StrataError};
use crate::store::ObjectKey;
use crate::types::{DNSet, ObjectRef};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort};
use kube::ResourceExt;
use serde_json::json;

/// Coordination service addresses for a tier referring to `log_set_ref`
pub(crate) fn coordination_addresses(
    log_set_ref: Option<&ObjectRef>,
    namespace: &str,
) -> Result<Vec<String>> {
    let log_set_ref = log_set_ref
        .ok_or_else(|| StrataError::BuildError("logSetRef must be set".to_string()))?;
    let ObjectKey { namespace, name } = log_set_ref.key(namespace);
    let names = SubResourceNames::new(&name, components::LOG);
    Ok(vec![format!(
        "{}.{}.svc:{}",
        names.service,
        namespace,
        ports::COORDINATION
    )])
}

impl SubResourceBuilder for DNSet {
    fn tier(&self) -> Result<Tier<'_>> {
        Tier::new(
            self,
            components::DN,
            &self.spec.basic.pod_set,
            self.spec.basic.cache_volume.as_ref(),
            vec![("dn-service", ports::DN_SERVICE)],
        )
    }

    fn build_service(&self) -> Result<Service> {
        Ok(self.tier()?.service(
            &self.spec.basic.service_type,
            vec![ServicePort {
                name: Some("dn-service".to_string()),
                port: ports::DN_SERVICE,
                ..Default::default()
            }],
        ))
    }

    fn build_config(&self) -> Result<ConfigMap> {
        let tier = self.tier()?;
        let addresses = coordination_addresses(
            self.spec.log_set_ref.as_ref(),
            &self.namespace().unwrap_or_default(),
        )?;

        let managed = json!({
            "service-type": "DN",
            "data-dir": paths::DATA_PATH,
            "fileservice": [{
                "name": "LOCAL",
                "backend": "DISK",
                "data-dir": paths::DATA_PATH,
            }],
            "dn": {
                "hakeeper-client": {
                    "service-addresses": addresses,
                },
            },
        });
        let rendered = config::render(&managed, self.spec.basic.pod_set.config.as_deref())?;
        Ok(tier.config_map(rendered, config::start_script(2, ports::DN_SERVICE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_dn_set;
    use crate::types::Volume;

    #[test]
    fn test_desired_state() {
        let dn = make_dn_set("demo-dn", 1, Some("demo-log"));
        let desired = dn.desired_state().unwrap();

        assert_eq!(desired.service.metadata.name.as_deref(), Some("demo-dn"));
        let sts = desired.workload.spec.unwrap();
        assert_eq!(sts.replicas, Some(1));
        // no cache volume means scratch space only
        assert!(sts.volume_claim_templates.is_none());
        let volumes = sts.template.spec.unwrap().volumes.unwrap();
        assert!(volumes.iter().any(|v| v.empty_dir.is_some()));
    }

    #[test]
    fn test_cache_volume_becomes_claim() {
        let mut dn = make_dn_set("demo-dn", 1, Some("demo-log"));
        dn.spec.basic.cache_volume = Some(Volume {
            size: "5Gi".to_string(),
            storage_class_name: Some("fast".to_string()),
        });
        let sts = dn.build_workload_set().unwrap().spec.unwrap();
        let claims = sts.volume_claim_templates.unwrap();
        assert_eq!(
            claims[0].spec.as_ref().unwrap().storage_class_name.as_deref(),
            Some("fast")
        );
    }

    #[test]
    fn test_config_points_at_log_set() {
        let dn = make_dn_set("demo-dn", 1, Some("demo-log"));
        let data = dn.build_config().unwrap().data.unwrap();
        let table: toml::Table = data[paths::CONFIG_FILE].parse().unwrap();
        let addresses = table["dn"]["hakeeper-client"]["service-addresses"]
            .as_array()
            .unwrap();
        assert_eq!(
            addresses[0].as_str(),
            Some("demo-log-discovery.databases.svc:32001")
        );
    }

    #[test]
    fn test_missing_log_set_ref_is_a_build_error() {
        let dn = make_dn_set("demo-dn", 1, None);
        assert!(dn.desired_state().unwrap_err().is_build());
    }

    #[test]
    fn test_negative_replicas_is_a_build_error() {
        let dn = make_dn_set("demo-dn", -1, Some("demo-log"));
        assert!(dn.desired_state().unwrap_err().is_build());
    }
}
