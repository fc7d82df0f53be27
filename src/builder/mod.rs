// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure builders deriving the Kubernetes objects that realize a tier.
//!
//! Building never touches the API; the reconcilers compare the result with
//! what is stored and decide on a single step.

pub mod cnset;
pub mod config;
pub mod dnset;
pub mod logset;

use crate::constants::{annotations, labels, paths, pod, OPERATOR_NAME};
use crate::error::{Result, StrataError};
use crate::types::{PodSet, ServiceType, Volume};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, ObjectFieldSelector, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PodSpec, PodTemplateSpec, ResourceRequirements, Service, ServicePort, ServiceSpec,
    Volume as PodVolume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Everything a tier needs in the cluster
#[derive(Clone, Debug)]
pub struct DesiredState {
    pub headless_service: Service,
    pub service: Service,
    pub config: ConfigMap,
    pub workload: StatefulSet,
}

/// Names of the objects realizing a tier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubResourceNames {
    pub headless_service: String,
    pub service: String,
    pub config: String,
    pub workload: String,
}

impl SubResourceNames {
    pub fn new(tier: &str, component: &str) -> Self {
        let service = if component == crate::constants::components::LOG {
            format!("{}-discovery", tier)
        } else {
            tier.to_string()
        };
        Self {
            headless_service: format!("{}-headless", tier),
            service,
            config: format!("{}-config", tier),
            workload: tier.to_string(),
        }
    }
}

/// Derives the desired sub-resources of a tier resource
pub trait SubResourceBuilder {
    /// Validated view of the tier
    fn tier(&self) -> Result<Tier<'_>>;

    fn build_headless_service(&self) -> Result<Service> {
        Ok(self.tier()?.headless_service())
    }

    fn build_service(&self) -> Result<Service>;

    fn build_config(&self) -> Result<ConfigMap>;

    fn build_workload_set(&self) -> Result<StatefulSet> {
        let config = self.build_config()?;
        Ok(self.tier()?.workload_set(&config))
    }

    fn desired_state(&self) -> Result<DesiredState> {
        let config = self.build_config()?;
        let workload = self.tier()?.workload_set(&config);
        Ok(DesiredState {
            headless_service: self.build_headless_service()?,
            service: self.build_service()?,
            config,
            workload,
        })
    }
}

/// The parts of a tier spec the shared builders consume
#[derive(Clone, Debug)]
pub struct Tier<'a> {
    pub name: String,
    pub namespace: String,
    pub component: &'static str,
    pub owner: Option<OwnerReference>,
    pub pod_set: &'a PodSet,
    pub image: &'a str,
    pub data_volume: Option<&'a Volume>,
    pub ports: Vec<(&'static str, i32)>,
}

impl<'a> Tier<'a> {
    /// Validate the common fields of a tier resource
    pub fn new<K: Resource<DynamicType = ()>>(
        obj: &K,
        component: &'static str,
        pod_set: &'a PodSet,
        data_volume: Option<&'a Volume>,
        ports: Vec<(&'static str, i32)>,
    ) -> Result<Self> {
        let name = obj.name_any();
        let namespace = obj
            .namespace()
            .ok_or_else(|| StrataError::BuildError(format!("{} has no namespace", name)))?;
        if pod_set.replicas < 0 {
            return Err(StrataError::BuildError(format!(
                "replicas must not be negative, got {}",
                pod_set.replicas
            )));
        }
        let image = match pod_set.image.as_deref() {
            Some(image) if !image.trim().is_empty() => image,
            _ => return Err(StrataError::BuildError("image must be set".to_string())),
        };
        if let Some(volume) = data_volume {
            if volume.size.trim().is_empty() {
                return Err(StrataError::BuildError(
                    "volume size must be set".to_string(),
                ));
            }
        }

        Ok(Self {
            name,
            namespace,
            component,
            owner: obj.controller_owner_ref(&()),
            pod_set,
            image,
            data_volume,
            ports,
        })
    }

    pub fn names(&self) -> SubResourceNames {
        SubResourceNames::new(&self.name, self.component)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (labels::NAME.to_string(), OPERATOR_NAME.to_string()),
            (labels::INSTANCE.to_string(), self.name.clone()),
            (labels::COMPONENT.to_string(), self.component.to_string()),
            (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        ])
    }

    pub fn metadata(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            owner_references: self.owner.clone().map(|owner| vec![owner]),
            ..Default::default()
        }
    }

    fn service_ports(&self) -> Vec<ServicePort> {
        self.ports
            .iter()
            .map(|(name, port)| ServicePort {
                name: Some(name.to_string()),
                port: *port,
                ..Default::default()
            })
            .collect()
    }

    /// Stable per-pod DNS names live under the headless service
    pub fn headless_service(&self) -> Service {
        Service {
            metadata: self.metadata(&self.names().headless_service),
            spec: Some(ServiceSpec {
                cluster_ip: Some("None".to_string()),
                publish_not_ready_addresses: Some(true),
                ports: Some(self.service_ports()),
                selector: Some(self.labels()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn service(&self, service_type: &ServiceType, ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: self.metadata(&self.names().service),
            spec: Some(ServiceSpec {
                type_: Some(service_type.to_string()),
                ports: Some(ports),
                selector: Some(self.labels()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn config_map(&self, config: String, start_script: String) -> ConfigMap {
        ConfigMap {
            metadata: self.metadata(&self.names().config),
            data: Some(BTreeMap::from([
                (paths::CONFIG_FILE.to_string(), config),
                (paths::START_SCRIPT.to_string(), start_script),
            ])),
            ..Default::default()
        }
    }

    fn resources(&self) -> Option<ResourceRequirements> {
        let resources = self.pod_set.resources.as_ref()?;
        let mut requests = BTreeMap::new();
        if let Some(cpu) = &resources.cpu {
            requests.insert("cpu".to_string(), Quantity(cpu.clone()));
        }
        if let Some(memory) = &resources.memory {
            requests.insert("memory".to_string(), Quantity(memory.clone()));
        }
        if requests.is_empty() {
            return None;
        }
        Some(ResourceRequirements {
            limits: Some(requests.clone()),
            requests: Some(requests),
            ..Default::default()
        })
    }

    fn data_claim(&self, volume: &Volume) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(paths::DATA_VOLUME.to_string()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(volume.size.clone()),
                    )])),
                    ..Default::default()
                }),
                storage_class_name: volume.storage_class_name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn main_container(&self) -> Container {
        let field_env = |name: &str, path: &str| EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: path.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        Container {
            name: pod::MAIN_CONTAINER.to_string(),
            image: Some(self.image.to_string()),
            command: Some(vec![
                "/bin/sh".to_string(),
                format!("{}/{}", paths::CONFIG_PATH, paths::START_SCRIPT),
            ]),
            env: Some(vec![
                field_env(pod::ENV_POD_NAME, "metadata.name"),
                field_env(pod::ENV_NAMESPACE, "metadata.namespace"),
                field_env(pod::ENV_POD_IP, "status.podIP"),
                EnvVar {
                    name: pod::ENV_HEADLESS_SERVICE.to_string(),
                    value: Some(self.names().headless_service),
                    ..Default::default()
                },
            ]),
            ports: Some(
                self.ports
                    .iter()
                    .map(|(name, port)| ContainerPort {
                        name: Some(name.to_string()),
                        container_port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            resources: self.resources(),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: paths::DATA_VOLUME.to_string(),
                    mount_path: paths::DATA_PATH.to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: paths::CONFIG_VOLUME.to_string(),
                    mount_path: paths::CONFIG_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
    }

    /// The StatefulSet running the tier's pods, rolled whenever `config` changes
    pub fn workload_set(&self, config: &ConfigMap) -> StatefulSet {
        let names = self.names();
        let mut volumes = vec![PodVolume {
            name: paths::CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: names.config.clone(),
                default_mode: Some(0o755),
                ..Default::default()
            }),
            ..Default::default()
        }];
        let claims = match self.data_volume {
            Some(volume) => Some(vec![self.data_claim(volume)]),
            None => {
                volumes.push(PodVolume {
                    name: paths::DATA_VOLUME.to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                });
                None
            }
        };

        let config_hash = config::fingerprint(config.data.as_ref());
        let node_selector = if self.pod_set.node_selector.is_empty() {
            None
        } else {
            Some(self.pod_set.node_selector.clone())
        };

        StatefulSet {
            metadata: self.metadata(&names.workload),
            spec: Some(StatefulSetSpec {
                replicas: Some(self.pod_set.replicas),
                service_name: names.headless_service,
                pod_management_policy: Some("Parallel".to_string()),
                selector: LabelSelector {
                    match_labels: Some(self.labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.labels()),
                        annotations: Some(BTreeMap::from([(
                            annotations::CONFIG_HASH.to_string(),
                            config_hash,
                        )])),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![self.main_container()],
                        volumes: Some(volumes),
                        node_selector,
                        ..Default::default()
                    }),
                },
                volume_claim_templates: claims,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_resource_names() {
        let log = SubResourceNames::new("demo-log", "log");
        assert_eq!(log.headless_service, "demo-log-headless");
        assert_eq!(log.service, "demo-log-discovery");
        assert_eq!(log.config, "demo-log-config");
        assert_eq!(log.workload, "demo-log");

        let cn = SubResourceNames::new("demo-cn", "cn");
        assert_eq!(cn.service, "demo-cn");
    }
}
