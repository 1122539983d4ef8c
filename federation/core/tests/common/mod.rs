// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory fakes for the external capability boundaries: typed client,
//! informers, and scheduling preference controllers.

#![allow(dead_code)]

use aegis_federation_core::application::scheduling::{Scheduler, SchedulerFactory, SchedulingKind};
use aegis_federation_core::domain::config::ControllerConfig;
use aegis_federation_core::domain::object::{ApiResource, GroupVersionKind, ResourceMeta, ResourceObject};
use aegis_federation_core::domain::resource::QualifiedName;
use aegis_federation_core::domain::typeconfig::FederatedTypeConfig;
use aegis_federation_core::domain::version::VersionedResource;
use aegis_federation_core::infrastructure::client::{
    ClientError, ClusterClientAccessor, ResourceClient,
};
use aegis_federation_core::infrastructure::informer::{
    EnqueueHandler, Informer, InformerFactory, ObjectStore,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Installs a subscriber once so `RUST_LOG` reveals controller logs in
/// failing tests.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Client
// ============================================================================

/// In-memory `ResourceClient` with scripted error injection and call
/// recording.
pub struct TestClient {
    objects: RwLock<HashMap<String, ResourceObject>>,
    calls: Mutex<Vec<String>>,
    fail_next: Mutex<HashMap<String, VecDeque<ClientError>>>,
    next_resource_version: AtomicU64,
}

fn object_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}|{}", kind, QualifiedName::new(namespace, name))
}

impl TestClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(HashMap::new()),
            next_resource_version: AtomicU64::new(1),
        })
    }

    /// Seeds a stored object, assigning a resource version if absent.
    pub fn insert(&self, mut obj: ResourceObject) {
        if obj.meta.resource_version.is_empty() {
            obj.meta.resource_version = self.bump_resource_version();
        }
        let key = object_key(&obj.gvk.kind, &obj.meta.namespace, &obj.meta.name);
        self.objects.write().insert(key, obj);
    }

    pub fn stored(&self, kind: &str, namespace: &str, name: &str) -> Option<ResourceObject> {
        self.objects
            .read()
            .get(&object_key(kind, namespace, name))
            .cloned()
    }

    /// Queues an error for the next call of the named operation.
    pub fn fail_next(&self, operation: &str, err: ClientError) {
        self.fail_next
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(operation))
            .count()
    }

    fn record(&self, operation: &str, key: &str) -> Result<(), ClientError> {
        self.calls.lock().push(format!("{operation} {key}"));
        if let Some(err) = self
            .fail_next
            .lock()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(())
    }

    fn bump_resource_version(&self) -> String {
        self.next_resource_version
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }
}

#[async_trait]
impl ResourceClient for TestClient {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceObject, ClientError> {
        let key = object_key(&gvk.kind, namespace, name);
        self.record("get", &key)?;
        self.objects.read().get(&key).cloned().ok_or(ClientError::NotFound)
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<Vec<ResourceObject>, ClientError> {
        self.record("list", &gvk.kind)?;
        Ok(self
            .objects
            .read()
            .values()
            .filter(|obj| obj.gvk.kind == gvk.kind)
            .filter(|obj| namespace.is_empty() || obj.meta.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn create(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError> {
        let key = object_key(&obj.gvk.kind, &obj.meta.namespace, &obj.meta.name);
        self.record("create", &key)?;
        if self.objects.read().contains_key(&key) {
            return Err(ClientError::AlreadyExists);
        }
        let mut created = obj.clone();
        created.meta.resource_version = self.bump_resource_version();
        created.meta.uid = uuid::Uuid::new_v4().to_string();
        self.objects.write().insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError> {
        let key = object_key(&obj.gvk.kind, &obj.meta.namespace, &obj.meta.name);
        self.record("update", &key)?;
        if !self.objects.read().contains_key(&key) {
            return Err(ClientError::NotFound);
        }
        let mut updated = obj.clone();
        updated.meta.resource_version = self.bump_resource_version();
        self.objects.write().insert(key, updated.clone());
        Ok(updated)
    }

    async fn update_status(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError> {
        let key = object_key(&obj.gvk.kind, &obj.meta.namespace, &obj.meta.name);
        self.record("update_status", &key)?;
        if !self.objects.read().contains_key(&key) {
            return Err(ClientError::NotFound);
        }
        let mut updated = obj.clone();
        updated.meta.resource_version = self.bump_resource_version();
        self.objects.write().insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        let key = object_key(&gvk.kind, namespace, name);
        self.record("delete", &key)?;
        if self.objects.write().remove(&key).is_none() {
            return Err(ClientError::NotFound);
        }
        Ok(())
    }

    async fn patch(&self, obj: &ResourceObject) -> Result<ResourceObject, ClientError> {
        let key = object_key(&obj.gvk.kind, &obj.meta.namespace, &obj.meta.name);
        self.record("patch", &key)?;
        if !self.objects.read().contains_key(&key) {
            return Err(ClientError::NotFound);
        }
        let mut patched = obj.clone();
        patched.meta.resource_version = self.bump_resource_version();
        self.objects.write().insert(key, patched.clone());
        Ok(patched)
    }
}

/// Cluster registry mapping cluster names to their fake clients.
pub struct TestClusterClients {
    clients: RwLock<HashMap<String, Arc<TestClient>>>,
}

impl TestClusterClients {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
        })
    }

    pub fn add_cluster(&self, cluster_name: &str) -> Arc<TestClient> {
        let client = TestClient::new();
        self.clients
            .write()
            .insert(cluster_name.to_string(), Arc::clone(&client));
        client
    }

    pub fn client(&self, cluster_name: &str) -> Arc<TestClient> {
        Arc::clone(self.clients.read().get(cluster_name).expect("unknown cluster"))
    }
}

impl ClusterClientAccessor for TestClusterClients {
    fn client_for(&self, cluster_name: &str) -> Option<Arc<dyn ResourceClient>> {
        self.clients
            .read()
            .get(cluster_name)
            .map(|client| Arc::clone(client) as Arc<dyn ResourceClient>)
    }
}

// ============================================================================
// Informers
// ============================================================================

pub struct TestStore {
    objects: RwLock<HashMap<String, ResourceObject>>,
}

impl TestStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: RwLock::new(HashMap::new()),
        })
    }
}

impl ObjectStore for TestStore {
    fn get_by_key(&self, key: &str) -> Option<ResourceObject> {
        self.objects.read().get(key).cloned()
    }

    fn list(&self) -> Vec<ResourceObject> {
        self.objects.read().values().cloned().collect()
    }
}

/// Informer whose cache and sync state are driven directly by the test.
pub struct TestInformer {
    resource: ApiResource,
    store: Arc<TestStore>,
    synced: AtomicBool,
    enqueue: EnqueueHandler,
}

impl TestInformer {
    /// Adds the object to the cache without notifying.
    pub fn insert(&self, obj: ResourceObject) {
        self.store
            .objects
            .write()
            .insert(obj.qualified_name().to_string(), obj);
    }

    pub fn remove(&self, key: &str) {
        self.store.objects.write().remove(key);
    }

    /// Simulates a watch notification: caches the object and invokes the
    /// registered enqueue handler.
    pub fn notify(&self, obj: ResourceObject) {
        self.insert(obj.clone());
        (self.enqueue)(&obj);
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }
}

impl Informer for TestInformer {
    fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store) as Arc<dyn ObjectStore>
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn run(&self, _shutdown: CancellationToken) {}
}

/// Factory handing out `TestInformer`s, retrievable by kind afterwards.
pub struct TestInformerFactory {
    informers: Mutex<HashMap<String, Arc<TestInformer>>>,
}

impl TestInformerFactory {
    pub fn new() -> Self {
        Self {
            informers: Mutex::new(HashMap::new()),
        }
    }

    pub fn informer_for(&self, kind: &str) -> Arc<TestInformer> {
        Arc::clone(self.informers.lock().get(kind).expect("no informer for kind"))
    }
}

impl InformerFactory for TestInformerFactory {
    fn informer(
        &self,
        resource: &ApiResource,
        _namespace: &str,
        enqueue: EnqueueHandler,
    ) -> anyhow::Result<Arc<dyn Informer>> {
        let informer = Arc::new(TestInformer {
            resource: resource.clone(),
            store: TestStore::new(),
            synced: AtomicBool::new(true),
            enqueue,
        });
        self.informers
            .lock()
            .insert(resource.kind.clone(), Arc::clone(&informer));
        Ok(informer as Arc<dyn Informer>)
    }
}

// ============================================================================
// Schedulers
// ============================================================================

pub struct TestScheduler {
    pub started_plugins: Mutex<Vec<String>>,
    pub stopped_plugins: Mutex<Vec<String>>,
    pub fail_start_plugin: AtomicBool,
}

#[async_trait]
impl Scheduler for TestScheduler {
    async fn start_plugin(
        &self,
        type_config: &FederatedTypeConfig,
        _fed_namespace_resource: &ApiResource,
    ) -> anyhow::Result<()> {
        if self.fail_start_plugin.load(Ordering::SeqCst) {
            anyhow::bail!("plugin start failed");
        }
        self.started_plugins
            .lock()
            .push(type_config.federated_type().kind.clone());
        Ok(())
    }

    async fn stop_plugin(&self, federated_kind: &str) {
        self.stopped_plugins.lock().push(federated_kind.to_string());
    }
}

pub struct TestSchedulerFactory {
    pub started: AtomicUsize,
    pub schedulers: Mutex<Vec<Arc<TestScheduler>>>,
    pub tokens: Mutex<Vec<CancellationToken>>,
}

impl TestSchedulerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            schedulers: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn controllers_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn scheduler(&self, index: usize) -> Arc<TestScheduler> {
        Arc::clone(&self.schedulers.lock()[index])
    }

    pub fn token(&self, index: usize) -> CancellationToken {
        self.tokens.lock()[index].clone()
    }
}

#[async_trait]
impl SchedulerFactory for TestSchedulerFactory {
    async fn start_scheduler(
        &self,
        _kind: SchedulingKind,
        _config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Arc<dyn Scheduler>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let scheduler = Arc::new(TestScheduler {
            started_plugins: Mutex::new(Vec::new()),
            stopped_plugins: Mutex::new(Vec::new()),
            fail_start_plugin: AtomicBool::new(false),
        });
        self.schedulers.lock().push(Arc::clone(&scheduler));
        self.tokens.lock().push(shutdown);
        Ok(scheduler as Arc<dyn Scheduler>)
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Versioned resource with fixed fingerprints, for driving the version
/// manager directly.
pub struct TestVersionedResource {
    pub federated_name: QualifiedName,
    pub object: ResourceObject,
    pub template_version: String,
    pub override_version: String,
}

impl TestVersionedResource {
    pub fn new(federated_name: QualifiedName, template_version: &str, override_version: &str) -> Self {
        let object = ResourceObject::new(
            GroupVersionKind::new("types.federation.aegis.dev", "v1beta1", "FederatedDeployment"),
            ResourceMeta {
                name: federated_name.name.clone(),
                namespace: federated_name.namespace.clone(),
                uid: "a2f5e1c8-test".to_string(),
                ..Default::default()
            },
        );
        Self {
            federated_name,
            object,
            template_version: template_version.to_string(),
            override_version: override_version.to_string(),
        }
    }
}

impl VersionedResource for TestVersionedResource {
    fn federated_name(&self) -> QualifiedName {
        self.federated_name.clone()
    }

    fn object(&self) -> &ResourceObject {
        &self.object
    }

    fn template_version(&self) -> anyhow::Result<String> {
        Ok(self.template_version.clone())
    }

    fn override_version(&self) -> anyhow::Result<String> {
        Ok(self.override_version.clone())
    }
}

pub fn namespace_object(name: &str) -> ResourceObject {
    ResourceObject::new(
        GroupVersionKind::new("", "v1", "Namespace"),
        ResourceMeta {
            name: name.to_string(),
            ..Default::default()
        },
    )
}

pub fn federated_object(kind: &str, namespace: &str, name: &str) -> ResourceObject {
    ResourceObject::new(
        GroupVersionKind::new("types.federation.aegis.dev", "v1beta1", kind),
        ResourceMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        },
    )
}
