// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API, an in-memory object store and a
//! fake coordination connector.

use crate::coordination::{CoordinationClient, Connector};
use crate::error::{Result as StrataResult, StrataError};
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use crate::types::{
    CNSet, CNSetBasic, CNSetSpec, DNSet, DNSetBasic, DNSetSpec, InitialConfig, LogSet,
    LogSetSpec, ObjectRef, PodSet, StrataCluster, StrataClusterSpec, Volume,
};
use async_trait::async_trait;
use http::{Request, Response};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, Resource};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

pub const NAMESPACE: &str = "databases";

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for DELETE requests matching the path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    UpdateStatus,
    Delete,
    List,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<(String, ObjectKey), Value>,
    next_uid: u64,
    next_version: u64,
    failures: Vec<(Op, ObjectKey)>,
    calls: Vec<(Op, String, ObjectKey)>,
}

/// An [`ObjectStore`] holding objects as JSON in memory, with the
/// finalizer and resource version semantics of the API server.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn type_key<K: StoreObject>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

fn finalizers_of(value: &Value) -> usize {
    value["metadata"]["finalizers"]
        .as_array()
        .map(Vec::len)
        .unwrap_or(0)
}

impl MemoryStore {
    /// Fail the next `op` on `key` with a transient error
    pub fn fail_next(&self, op: Op, key: ObjectKey) {
        self.state.lock().unwrap().failures.push((op, key));
    }

    /// Number of `op` calls made so far
    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _, _)| *o == op)
            .count()
    }

    /// Number of calls that write spec, metadata or existence
    pub fn writes(&self) -> usize {
        self.count(Op::Create) + self.count(Op::Update) + self.count(Op::Delete)
    }

    /// Change a stored object behind the operator's back, as another
    /// controller would. Status edits are kept.
    pub fn modify<K: StoreObject, F: FnOnce(&mut K)>(&self, key: &ObjectKey, f: F) {
        let mut state = self.state.lock().unwrap();
        let slot = (type_key::<K>(), key.clone());
        let value = state.objects.get(&slot).cloned().expect("object to modify");
        let mut obj: K = serde_json::from_value(value).unwrap();
        f(&mut obj);
        state
            .objects
            .insert(slot, serde_json::to_value(&obj).unwrap());
    }

    fn begin(&self, state: &mut MemoryState, op: Op, kind: String, key: &ObjectKey) -> StrataResult<()> {
        state.calls.push((op, kind, key.clone()));
        if let Some(pos) = state.failures.iter().position(|(o, k)| *o == op && k == key) {
            state.failures.remove(pos);
            return Err(StrataError::Timeout(format!("injected failure on {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> StrataResult<Option<K>> {
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::Get, type_key::<K>(), key)?;
        match state.objects.get(&(type_key::<K>(), key.clone())) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> StrataResult<K> {
        let key = ObjectKey::of(obj);
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::Create, type_key::<K>(), &key)?;
        let slot = (type_key::<K>(), key.clone());
        if state.objects.contains_key(&slot) {
            return Err(StrataError::AlreadyExists(format!("{} {}", K::kind(&()), key)));
        }

        state.next_uid += 1;
        state.next_version += 1;
        let mut stored = obj.clone();
        let meta = stored.meta_mut();
        meta.uid = Some(format!("uid-{}", state.next_uid));
        meta.resource_version = Some(state.next_version.to_string());
        meta.generation = Some(1);
        meta.deletion_timestamp = None;

        state.objects.insert(slot, serde_json::to_value(&stored)?);
        Ok(stored)
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> StrataResult<K> {
        let key = ObjectKey::of(obj);
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::Update, type_key::<K>(), &key)?;
        let slot = (type_key::<K>(), key.clone());
        let current = state
            .objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| StrataError::NotFound(format!("{} {}", K::kind(&()), key)))?;

        let current_version = current["metadata"]["resourceVersion"].as_str().map(str::to_string);
        if let Some(version) = &obj.meta().resource_version {
            if current_version.as_ref() != Some(version) {
                return Err(StrataError::Conflict(format!("{} {}", K::kind(&()), key)));
            }
        }

        state.next_version += 1;
        let mut value = serde_json::to_value(obj)?;
        value["metadata"]["uid"] = current["metadata"]["uid"].clone();
        value["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        if !current["metadata"]["deletionTimestamp"].is_null() {
            value["metadata"]["deletionTimestamp"] = current["metadata"]["deletionTimestamp"].clone();
        }
        // status is a subresource; replace never touches it
        match current.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        let stored: K = serde_json::from_value(value.clone())?;
        if !value["metadata"]["deletionTimestamp"].is_null() && finalizers_of(&value) == 0 {
            state.objects.remove(&slot);
        } else {
            state.objects.insert(slot, value);
        }
        Ok(stored)
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> StrataResult<K> {
        let key = ObjectKey::of(obj);
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::UpdateStatus, type_key::<K>(), &key)?;
        let slot = (type_key::<K>(), key.clone());
        let mut current = state
            .objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| StrataError::NotFound(format!("{} {}", K::kind(&()), key)))?;

        state.next_version += 1;
        let value = serde_json::to_value(obj)?;
        current["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        current["metadata"]["resourceVersion"] = json!(state.next_version.to_string());

        let stored: K = serde_json::from_value(current.clone())?;
        state.objects.insert(slot, current);
        Ok(stored)
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> StrataResult<()> {
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::Delete, type_key::<K>(), key)?;
        let slot = (type_key::<K>(), key.clone());
        let Some(value) = state.objects.get_mut(&slot) else {
            return Err(StrataError::NotFound(format!("{} {}", K::kind(&()), key)));
        };

        if finalizers_of(value) == 0 {
            state.objects.remove(&slot);
        } else if value["metadata"]["deletionTimestamp"].is_null() {
            value["metadata"]["deletionTimestamp"] = json!("2026-01-01T00:00:00Z");
        }
        Ok(())
    }

    async fn list<K: StoreObject>(&self, namespace: &str) -> StrataResult<Vec<K>> {
        let mut state = self.state.lock().unwrap();
        self.begin(&mut state, Op::List, type_key::<K>(), &ObjectKey::new(namespace, ""))?;
        let kind = type_key::<K>();
        state
            .objects
            .iter()
            .filter(|((k, key), _)| *k == kind && key.namespace == namespace)
            .map(|(_, value)| Ok(serde_json::from_value(value.clone())?))
            .collect()
    }
}

/// A [`Connector`] counting connects and closes
#[derive(Default)]
pub struct MockConnector {
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        discovery_address: &str,
        _timeout: Duration,
    ) -> StrataResult<Arc<dyn CoordinationClient>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StrataError::CoordinationError(format!(
                "{} unreachable",
                discovery_address
            )));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockClient {
            address: discovery_address.to_string(),
            closes: self.closes.clone(),
        }))
    }
}

struct MockClient {
    address: String,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl CoordinationClient for MockClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn close(&self) -> StrataResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

pub fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..Default::default()
    }
}

pub fn pod_set(replicas: i32) -> PodSet {
    PodSet {
        replicas,
        ..Default::default()
    }
}

pub fn make_log_set(name: &str, replicas: i32) -> LogSet {
    LogSet::new(
        name,
        LogSetSpec {
            pod_set: PodSet {
                image: Some("strata/strata:1.0.0".to_string()),
                ..pod_set(replicas)
            },
            volume: Volume {
                size: "10Gi".to_string(),
                storage_class_name: None,
            },
            initial_config: InitialConfig::default(),
        },
    )
    .within(NAMESPACE)
}

pub fn make_dn_set(name: &str, replicas: i32, log_set: Option<&str>) -> DNSet {
    DNSet::new(
        name,
        DNSetSpec {
            basic: DNSetBasic {
                pod_set: PodSet {
                    image: Some("strata/strata:1.0.0".to_string()),
                    ..pod_set(replicas)
                },
                ..Default::default()
            },
            log_set_ref: log_set.map(|n| ObjectRef::new(n, NAMESPACE)),
        },
    )
    .within(NAMESPACE)
}

pub fn make_cn_set(name: &str, replicas: i32, log_set: Option<&str>, dn_set: Option<&str>) -> CNSet {
    CNSet::new(
        name,
        CNSetSpec {
            basic: CNSetBasic {
                pod_set: PodSet {
                    image: Some("strata/strata:1.0.0".to_string()),
                    ..pod_set(replicas)
                },
                ..Default::default()
            },
            log_set_ref: log_set.map(|n| ObjectRef::new(n, NAMESPACE)),
            dn_set_ref: dn_set.map(|n| ObjectRef::new(n, NAMESPACE)),
        },
    )
    .within(NAMESPACE)
}

pub fn make_cluster(name: &str, log: i32, dn: i32, cn: i32) -> StrataCluster {
    StrataCluster {
        metadata: meta(name),
        spec: StrataClusterSpec {
            log_service: LogSetSpec {
                pod_set: pod_set(log),
                volume: Volume {
                    size: "10Gi".to_string(),
                    storage_class_name: None,
                },
                initial_config: InitialConfig::default(),
            },
            dn: DNSetBasic {
                pod_set: pod_set(dn),
                ..Default::default()
            },
            cn: CNSetBasic {
                pod_set: pod_set(cn),
                ..Default::default()
            },
            version: Some("1.0.0".to_string()),
            image_repository: None,
        },
        status: None,
    }
}

/// Extension for placing generated custom resources in a namespace
pub trait Within: Resource + Sized {
    fn within(mut self, namespace: &str) -> Self {
        self.meta_mut().namespace = Some(namespace.to_string());
        self
    }
}

impl<K: Resource> Within for K {}
