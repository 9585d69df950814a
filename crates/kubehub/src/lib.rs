//! uproot kubehub – resource client seam and kube-backed implementation.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::debug;

use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, Secret};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Api, DeleteParams, ListParams},
    core::{ApiResource, DynamicObject},
    discovery::{Discovery, Scope},
    Client,
};
use uproot_core::{Gvk, ManagedResource};

/// Errors surfaced by a resource client. String payloads keep the type cheap
/// to clone and transport.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ClientError {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("discovery: {0}")]
    Discovery(String),
    #[error("api: {0}")]
    Api(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// Abstract control-plane access used by the teardown. One implementation
/// talks to a live cluster; tests script their own.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    /// List objects of one kind across the cluster, optionally filtered by
    /// label selector.
    async fn list(
        &self,
        gvk: &Gvk,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManagedResource>, ClientError>;

    /// Fetch one object; `Ok(None)` when the control plane reports it absent.
    async fn get(&self, resource: &ManagedResource) -> Result<Option<ManagedResource>, ClientError>;

    /// Delete one object. Absence surfaces as `ClientError::NotFound` so
    /// callers can treat it as idempotent success.
    async fn delete(&self, resource: &ManagedResource) -> Result<(), ClientError>;

    /// Best-effort group/version resolution for a kind; `None` when the
    /// cluster cannot place it.
    async fn resolve_kind(&self, resource: &ManagedResource) -> Option<Gvk>;
}

fn map_kube_err(e: kube::Error) -> ClientError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => ClientError::NotFound(ae.message),
        other => ClientError::Api(other.to_string()),
    }
}

/// ApiResource + namespaced flag for kinds the teardown touches on every run,
/// resolved without a discovery round-trip.
fn static_api_resource(gvk: &Gvk) -> Option<(ApiResource, bool)> {
    match (gvk.group.as_str(), gvk.kind.as_str()) {
        ("", "Namespace") => Some((ApiResource::erase::<Namespace>(&()), false)),
        ("", "Secret") => Some((ApiResource::erase::<Secret>(&()), true)),
        ("", "PersistentVolume") => Some((ApiResource::erase::<PersistentVolume>(&()), false)),
        ("apiextensions.k8s.io", "CustomResourceDefinition") => {
            Some((ApiResource::erase::<CustomResourceDefinition>(&()), false))
        }
        _ => None,
    }
}

async fn find_api_resource(client: Client, gvk: &Gvk) -> Result<(ApiResource, bool), ClientError> {
    let discovery = Discovery::new(client)
        .run()
        .await
        .map_err(|e| ClientError::Discovery(e.to_string()))?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.kind != gvk.kind {
                continue;
            }
            if !gvk.group.is_empty() && ar.group != gvk.group {
                continue;
            }
            if !gvk.version.is_empty() && ar.version != gvk.version {
                continue;
            }
            let namespaced = matches!(caps.scope, Scope::Namespaced);
            return Ok((ar.clone(), namespaced));
        }
    }
    Err(ClientError::Discovery(format!("kind not served: {}", gvk.gvk_key())))
}

/// Live-cluster implementation over kube `DynamicObject` APIs.
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig / in-cluster config.
    pub async fn try_default() -> Result<Self, ClientError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClientError::Api(e.to_string()))?;
        Ok(Self { client })
    }

    async fn api_resource(&self, gvk: &Gvk) -> Result<(ApiResource, bool), ClientError> {
        if let Some(known) = static_api_resource(gvk) {
            return Ok(known);
        }
        find_api_resource(self.client.clone(), gvk).await
    }

    fn scoped_api(
        &self,
        ar: &ApiResource,
        namespaced: bool,
        namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>, ClientError> {
        if namespaced {
            match namespace {
                Some(ns) => Ok(Api::namespaced_with(self.client.clone(), ns, ar)),
                None => Err(ClientError::Api(format!(
                    "namespace required for namespaced kind {}",
                    ar.kind
                ))),
            }
        } else {
            Ok(Api::all_with(self.client.clone(), ar))
        }
    }
}

fn to_managed(obj: &DynamicObject, ar: &ApiResource) -> ManagedResource {
    ManagedResource {
        gvk: Gvk::new(&ar.group, &ar.version, &ar.kind),
        namespace: obj.metadata.namespace.clone(),
        name: obj.metadata.name.clone().unwrap_or_default(),
    }
}

#[async_trait::async_trait]
impl ResourceClient for KubeClient {
    async fn list(
        &self,
        gvk: &Gvk,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManagedResource>, ClientError> {
        let (ar, _namespaced) = self.api_resource(gvk).await?;
        // Cluster-wide listing also covers namespaced kinds (e.g. /api/v1/secrets).
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        let objs = api.list(&lp).await.map_err(map_kube_err)?;
        Ok(objs.items.iter().map(|o| to_managed(o, &ar)).collect())
    }

    async fn get(&self, resource: &ManagedResource) -> Result<Option<ManagedResource>, ClientError> {
        let (ar, namespaced) = self.api_resource(&resource.gvk).await?;
        let api = self.scoped_api(&ar, namespaced, resource.namespace.as_deref())?;
        match api.get_opt(&resource.name).await.map_err(map_kube_err)? {
            Some(obj) => Ok(Some(to_managed(&obj, &ar))),
            None => Ok(None),
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<(), ClientError> {
        let (ar, namespaced) = self.api_resource(&resource.gvk).await?;
        let api = self.scoped_api(&ar, namespaced, resource.namespace.as_deref())?;
        let _ = api
            .delete(&resource.name, &DeleteParams::default())
            .await
            .map_err(map_kube_err)?;
        Ok(())
    }

    async fn resolve_kind(&self, resource: &ManagedResource) -> Option<Gvk> {
        if resource.gvk.is_resolved() {
            return Some(resource.gvk.clone());
        }
        match self.api_resource(&resource.gvk).await {
            Ok((ar, _)) => Some(Gvk::new(&ar.group, &ar.version, &ar.kind)),
            Err(e) => {
                debug!(kind = %resource.gvk.kind, error = %e, "kind resolution failed; keeping as-is");
                None
            }
        }
    }
}

// ----------------- Mock implementation -----------------

/// Simple scripted in-memory implementation for tests: list results and get
/// sequences are programmed up front, every call is recorded.
#[derive(Default)]
pub struct MockClient {
    inner: std::sync::Mutex<MockState>,
}

/// One scripted answer for a `get` call.
#[derive(Debug, Clone)]
pub enum GetStep {
    Present,
    Absent,
    Fail(ClientError),
}

#[derive(Default)]
struct MockState {
    lists: std::collections::HashMap<String, Vec<ManagedResource>>,
    list_errors: std::collections::HashMap<String, ClientError>,
    get_scripts: std::collections::HashMap<String, std::collections::VecDeque<GetStep>>,
    delete_errors: std::collections::HashMap<String, ClientError>,
    resolutions: std::collections::HashMap<String, Gvk>,
    list_calls: Vec<(String, Option<String>)>,
    deletes: Vec<String>,
    gets: std::collections::HashMap<String, usize>,
}

fn mock_key(resource: &ManagedResource) -> String {
    format!("{} {}", resource.kind(), resource.key())
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects `list` returns for a kind.
    pub fn set_list(&self, kind: &str, resources: Vec<ManagedResource>) {
        self.inner.lock().unwrap().lists.insert(kind.to_string(), resources);
    }

    pub fn fail_list(&self, kind: &str, err: ClientError) {
        self.inner.lock().unwrap().list_errors.insert(kind.to_string(), err);
    }

    /// Answers for successive `get` calls on one resource (`Kind ns/name`).
    /// When the script runs out, further gets report the object absent.
    pub fn script_gets(&self, key: &str, steps: Vec<GetStep>) {
        self.inner.lock().unwrap().get_scripts.insert(key.to_string(), steps.into());
    }

    pub fn fail_delete(&self, key: &str, err: ClientError) {
        self.inner.lock().unwrap().delete_errors.insert(key.to_string(), err);
    }

    pub fn set_resolution(&self, kind: &str, gvk: Gvk) {
        self.inner.lock().unwrap().resolutions.insert(kind.to_string(), gvk);
    }

    /// `Kind ns/name` keys of every delete issued, in order.
    pub fn deletes(&self) -> Vec<String> {
        self.inner.lock().unwrap().deletes.clone()
    }

    pub fn get_count(&self, key: &str) -> usize {
        self.inner.lock().unwrap().gets.get(key).copied().unwrap_or(0)
    }

    pub fn list_calls(&self) -> Vec<(String, Option<String>)> {
        self.inner.lock().unwrap().list_calls.clone()
    }
}

#[async_trait::async_trait]
impl ResourceClient for MockClient {
    async fn list(
        &self,
        gvk: &Gvk,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManagedResource>, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state
            .list_calls
            .push((gvk.kind.clone(), label_selector.map(|s| s.to_string())));
        if let Some(err) = state.list_errors.get(&gvk.kind) {
            return Err(err.clone());
        }
        Ok(state.lists.get(&gvk.kind).cloned().unwrap_or_default())
    }

    async fn get(&self, resource: &ManagedResource) -> Result<Option<ManagedResource>, ClientError> {
        let key = mock_key(resource);
        let mut state = self.inner.lock().unwrap();
        *state.gets.entry(key.clone()).or_insert(0) += 1;
        let step = state
            .get_scripts
            .get_mut(&key)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(GetStep::Absent);
        match step {
            GetStep::Present => Ok(Some(resource.clone())),
            GetStep::Absent => Ok(None),
            GetStep::Fail(e) => Err(e),
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<(), ClientError> {
        let key = mock_key(resource);
        let mut state = self.inner.lock().unwrap();
        state.deletes.push(key.clone());
        match state.delete_errors.get(&key) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn resolve_kind(&self, resource: &ManagedResource) -> Option<Gvk> {
        self.inner.lock().unwrap().resolutions.get(&resource.gvk.kind).cloned()
    }
}
