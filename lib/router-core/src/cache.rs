//! Observed-state caches for proxies, services and endpoints

use crate::filters::{pod_host_ip, service_external_ips};
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use kube::Resource;
use router_api::ObjectKey;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Kubernetes kinds that can be held in an [`ObjectCache`]
pub trait CachedObject: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    /// The part of the object routes are built from
    type RouteView: PartialEq + Send;

    fn route_view(&self) -> Self::RouteView;
}

impl CachedObject for Pod {
    type RouteView = Option<IpAddr>;

    fn route_view(&self) -> Self::RouteView {
        pod_host_ip(self)
    }
}

impl CachedObject for Service {
    type RouteView = Vec<String>;

    fn route_view(&self) -> Self::RouteView {
        service_external_ips(self).to_vec()
    }
}

impl CachedObject for Endpoints {
    type RouteView = ();

    fn route_view(&self) -> Self::RouteView {}
}

/// ObjectCache keeps the last-known-ready object of one kind, keyed by
/// namespace/name. Clones share the same underlying map.
pub struct ObjectCache<K> {
    kind: &'static str,
    objects: Arc<RwLock<HashMap<ObjectKey, K>>>,
}

impl<K: CachedObject> ObjectCache<K> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Insert or overwrite an object, returning the previous version
    pub async fn add(&self, obj: K) -> Option<K> {
        let mut objects = self.objects.write().await;
        objects.insert(ObjectKey::of(&obj), obj)
    }

    /// Remove an object; removing a missing key is a no-op
    pub async fn delete(&self, obj: &K) -> Option<K> {
        let mut objects = self.objects.write().await;
        objects.remove(&ObjectKey::of(obj))
    }

    pub async fn get(&self, obj: &K) -> Option<K> {
        self.get_by_key(&ObjectKey::of(obj)).await
    }

    pub async fn get_by_key(&self, key: &ObjectKey) -> Option<K> {
        let objects = self.objects.read().await;
        objects.get(key).cloned()
    }

    pub async fn contains_key(&self, key: &ObjectKey) -> bool {
        let objects = self.objects.read().await;
        objects.contains_key(key)
    }

    /// All cached objects, in no particular order
    pub async fn list(&self) -> Vec<K> {
        let objects = self.objects.read().await;
        objects.values().cloned().collect()
    }

    pub async fn keys(&self) -> HashSet<ObjectKey> {
        let objects = self.objects.read().await;
        objects.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let objects = self.objects.read().await;
        objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K> Clone for ObjectCache<K> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            objects: self.objects.clone(),
        }
    }
}
