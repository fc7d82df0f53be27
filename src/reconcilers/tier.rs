// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Observation and actions shared by the LogSet, DNSet and CNSet actors.

use crate::builder::{DesiredState, SubResourceNames};
use crate::constants::{annotations, conditions, pod};
use crate::error::{ignore_already_exists, ignore_not_found, Result};
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use crate::types::{Condition, ConditionStatus, Conditioned};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PodSpec, ResourceRequirements, Service, ServicePort};
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, info};

/// The single corrective step a tier needs next
#[derive(Debug, Clone)]
pub enum TierStep {
    CreateHeadlessService(Service),
    CreateService(Service),
    UpdateService(Service),
    CreateConfig(ConfigMap),
    CreateWorkload(StatefulSet),
    UpdateConfig(ConfigMap),
    ScaleWorkload { current: StatefulSet, replicas: i32 },
    UpdateWorkload(StatefulSet),
}

impl fmt::Display for TierStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateHeadlessService(svc) => write!(f, "create headless service {}", svc.name_any()),
            Self::CreateService(svc) => write!(f, "create service {}", svc.name_any()),
            Self::UpdateService(svc) => write!(f, "update service {}", svc.name_any()),
            Self::CreateConfig(cm) => write!(f, "create config {}", cm.name_any()),
            Self::CreateWorkload(sts) => write!(f, "create workload {}", sts.name_any()),
            Self::UpdateConfig(cm) => write!(f, "update config {}", cm.name_any()),
            Self::ScaleWorkload { current, replicas } => {
                write!(f, "scale workload {} to {}", current.name_any(), replicas)
            }
            Self::UpdateWorkload(sts) => write!(f, "roll workload {}", sts.name_any()),
        }
    }
}

/// Pod counts of a tier whose sub-resources match the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converged {
    pub replicas: i32,
    pub ready_replicas: i32,
}

impl Converged {
    pub fn all_ready(&self) -> bool {
        self.ready_replicas >= self.replicas
    }

    pub fn message(&self) -> String {
        format!("{}/{} pods ready", self.ready_replicas, self.replicas)
    }
}

pub enum Observation {
    Step(TierStep),
    Converged(Converged),
}

fn key_of<K: StoreObject>(obj: &K) -> ObjectKey {
    ObjectKey::of(obj)
}

fn main_image(sts: &StatefulSet) -> Option<&str> {
    sts.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == pod::MAIN_CONTAINER)?
        .image
        .as_deref()
}

fn config_hash(sts: &StatefulSet) -> Option<&String> {
    sts.spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(annotations::CONFIG_HASH)
}

fn pod_spec(sts: &StatefulSet) -> Option<&PodSpec> {
    sts.spec.as_ref()?.template.spec.as_ref()
}

fn main_resources(sts: &StatefulSet) -> Option<&ResourceRequirements> {
    pod_spec(sts)?
        .containers
        .iter()
        .find(|c| c.name == pod::MAIN_CONTAINER)?
        .resources
        .as_ref()
}

fn service_type(svc: &Service) -> &str {
    svc.spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or("ClusterIP")
}

fn service_ports(svc: &Service) -> &[ServicePort] {
    svc.spec
        .as_ref()
        .and_then(|s| s.ports.as_deref())
        .unwrap_or_default()
}

/// Does the stored service differ in type, ports or annotations we set.
/// A node port left unset is allocated by the API server and not compared,
/// and annotations added by others are tolerated.
fn service_drifted(current: &Service, desired: &Service) -> bool {
    if service_type(current) != service_type(desired) {
        return true;
    }

    let current_ports = service_ports(current);
    let desired_ports = service_ports(desired);
    if current_ports.len() != desired_ports.len() {
        return true;
    }
    let ports_drifted = desired_ports.iter().any(|want| {
        match current_ports.iter().find(|have| have.name == want.name) {
            None => true,
            Some(have) => {
                have.port != want.port || (want.node_port.is_some() && have.node_port != want.node_port)
            }
        }
    });
    if ports_drifted {
        return true;
    }

    let current_annotations = current.annotations();
    desired
        .annotations()
        .iter()
        .any(|(k, v)| current_annotations.get(k) != Some(v))
}

/// The stored service with our fields replaced by the desired ones
fn updated_service(current: Service, desired: Service) -> Service {
    let mut updated = current;
    if let Some(annotations) = desired.metadata.annotations {
        updated
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(annotations);
    }

    let Some(desired_spec) = desired.spec else {
        return updated;
    };
    let spec = updated.spec.get_or_insert_with(Default::default);

    // allocated node ports survive as long as the service keeps exposing them
    let keep_node_ports = spec.type_ == desired_spec.type_
        && desired_spec.type_.as_deref().is_some_and(|t| t != "ClusterIP");
    let previous = spec.ports.take().unwrap_or_default();
    spec.ports = desired_spec.ports.map(|ports| {
        ports
            .into_iter()
            .map(|mut port| {
                if port.node_port.is_none() && keep_node_ports {
                    port.node_port = previous
                        .iter()
                        .find(|p| p.name == port.name)
                        .and_then(|p| p.node_port);
                }
                port
            })
            .collect()
    });
    spec.type_ = desired_spec.type_;
    updated
}

/// Does the running template differ from the desired one in a field we own.
/// Fields the API server defaults are left out.
fn template_drifted(current: &StatefulSet, desired: &StatefulSet) -> bool {
    main_image(current) != main_image(desired)
        || config_hash(current) != config_hash(desired)
        || main_resources(current) != main_resources(desired)
        || pod_spec(current).and_then(|p| p.node_selector.as_ref())
            != pod_spec(desired).and_then(|p| p.node_selector.as_ref())
}

/// Compare desired sub-resources with what is stored and pick the first
/// thing that needs doing, in dependency order.
pub async fn observe<S: ObjectStore>(store: &S, desired: DesiredState) -> Result<Observation> {
    let DesiredState {
        headless_service,
        service,
        config,
        workload,
    } = desired;

    match store.get::<Service>(&key_of(&headless_service)).await? {
        None => return Ok(Observation::Step(TierStep::CreateHeadlessService(headless_service))),
        Some(current) if service_drifted(&current, &headless_service) => {
            return Ok(Observation::Step(TierStep::UpdateService(updated_service(
                current,
                headless_service,
            ))));
        }
        Some(_) => {}
    }
    match store.get::<Service>(&key_of(&service)).await? {
        None => return Ok(Observation::Step(TierStep::CreateService(service))),
        Some(current) if service_drifted(&current, &service) => {
            return Ok(Observation::Step(TierStep::UpdateService(updated_service(current, service))));
        }
        Some(_) => {}
    }

    match store.get::<ConfigMap>(&key_of(&config)).await? {
        None => return Ok(Observation::Step(TierStep::CreateConfig(config))),
        Some(current) if current.data != config.data => {
            let mut updated = current;
            updated.data = config.data;
            return Ok(Observation::Step(TierStep::UpdateConfig(updated)));
        }
        Some(_) => {}
    }

    let Some(current) = store.get::<StatefulSet>(&key_of(&workload)).await? else {
        return Ok(Observation::Step(TierStep::CreateWorkload(workload)));
    };

    let desired_replicas = workload.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    let current_replicas = current.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    if desired_replicas != current_replicas {
        return Ok(Observation::Step(TierStep::ScaleWorkload {
            current,
            replicas: desired_replicas,
        }));
    }

    if template_drifted(&current, &workload) {
        let mut updated = current;
        if let (Some(spec), Some(desired_spec)) = (updated.spec.as_mut(), workload.spec) {
            spec.template = desired_spec.template;
        }
        return Ok(Observation::Step(TierStep::UpdateWorkload(updated)));
    }

    let ready_replicas = current
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    Ok(Observation::Converged(Converged {
        replicas: desired_replicas,
        ready_replicas,
    }))
}

/// Apply a step. Creates tolerate a concurrent create of the same object.
pub async fn act<S: ObjectStore>(store: &S, step: TierStep) -> Result<()> {
    match step {
        TierStep::CreateHeadlessService(svc) | TierStep::CreateService(svc) => {
            ignore_already_exists(store.create(&svc).await.map(|_| ()))
        }
        TierStep::UpdateService(svc) => store.update(&svc).await.map(|_| ()),
        TierStep::CreateConfig(cm) => ignore_already_exists(store.create(&cm).await.map(|_| ())),
        TierStep::CreateWorkload(sts) => {
            ignore_already_exists(store.create(&sts).await.map(|_| ()))
        }
        TierStep::UpdateConfig(cm) => store.update(&cm).await.map(|_| ()),
        TierStep::ScaleWorkload { current, replicas } => {
            let mut scaled = current;
            if let Some(spec) = scaled.spec.as_mut() {
                spec.replicas = Some(replicas);
            }
            store.update(&scaled).await.map(|_| ())
        }
        TierStep::UpdateWorkload(sts) => store.update(&sts).await.map(|_| ()),
    }
}

async fn delete_if_present<K: StoreObject, S: ObjectStore>(store: &S, key: ObjectKey) -> Result<bool> {
    if !store.exists::<K>(&key).await? {
        return Ok(false);
    }
    info!("Deleting {} {}", K::kind(&()), key);
    ignore_not_found(store.delete::<K>(&key).await)?;
    Ok(true)
}

/// Delete every sub-resource of a tier. Returns `true` once none remain.
pub async fn finalize<S: ObjectStore>(store: &S, namespace: &str, names: &SubResourceNames) -> Result<bool> {
    let mut remaining = false;
    remaining |= delete_if_present::<StatefulSet, S>(store, ObjectKey::new(namespace, &names.workload)).await?;
    remaining |= delete_if_present::<ConfigMap, S>(store, ObjectKey::new(namespace, &names.config)).await?;
    remaining |= delete_if_present::<Service, S>(store, ObjectKey::new(namespace, &names.service)).await?;
    remaining |=
        delete_if_present::<Service, S>(store, ObjectKey::new(namespace, &names.headless_service)).await?;
    if remaining {
        debug!("Waiting for sub-resources in {} to disappear", namespace);
    }
    Ok(!remaining)
}

/// Record pod counts and readiness; `ready` is the tier's own verdict
pub fn set_pod_readiness<K: Conditioned>(obj: &mut K, converged: &Converged, ready: bool) {
    let reason = if ready {
        conditions::reasons::PODS_READY
    } else {
        conditions::reasons::PODS_NOT_READY
    };
    obj.set_condition(Condition::new(
        conditions::READY,
        ConditionStatus::from(ready),
        reason,
        converged.message(),
    ));
}
