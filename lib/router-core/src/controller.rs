//! External-IP services controller
//!
//! Feeds the proxy, service and endpoints caches from watch callbacks and
//! converges the route store to them through a dirty reconciler.

use crate::filters::{endpoints_ready, proxy_ready, service_eligible};
use crate::reconcile::{reconcile_routes, Snapshot};
use crate::{
    CachedObject, ControllerConfig, ControllerMetrics, DirtyReconciler, ObjectCache, Reconcile,
    ResourceEventHandler, Result, RouteStore,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use router_api::ObjectKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

pub struct ExternalServicesController<S> {
    config: ControllerConfig,
    routes: Arc<S>,
    reconciler: DirtyReconciler,
    proxies: ObjectCache<Pod>,
    services: ObjectCache<Service>,
    endpoints: ObjectCache<Endpoints>,
    proxies_synced: AtomicBool,
    services_synced: AtomicBool,
    endpoints_synced: AtomicBool,
    metrics: Option<ControllerMetrics>,
}

impl<S: RouteStore> ExternalServicesController<S> {
    pub fn new(config: ControllerConfig, routes: Arc<S>) -> Self {
        let reconciler = DirtyReconciler::new("externalips")
            .with_resync_period(config.resync_period)
            .with_retry_delay(config.retry_delay);

        Self {
            config,
            routes,
            reconciler,
            proxies: ObjectCache::new("proxies"),
            services: ObjectCache::new("services"),
            endpoints: ObjectCache::new("endpoints"),
            proxies_synced: AtomicBool::new(false),
            services_synced: AtomicBool::new(false),
            endpoints_synced: AtomicBool::new(false),
            metrics: None,
        }
    }

    pub fn with_metrics(self, metrics: ControllerMetrics) -> Self {
        Self {
            reconciler: self.reconciler.with_metrics(metrics.clone()),
            metrics: Some(metrics),
            ..self
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn routes(&self) -> &Arc<S> {
        &self.routes
    }

    pub fn reconciler(&self) -> &DirtyReconciler {
        &self.reconciler
    }

    pub fn proxies(&self) -> &ObjectCache<Pod> {
        &self.proxies
    }

    pub fn services(&self) -> &ObjectCache<Service> {
        &self.services
    }

    pub fn endpoints(&self) -> &ObjectCache<Endpoints> {
        &self.endpoints
    }

    /// Whether all three watched kinds finished their initial listing
    pub fn has_synced(&self) -> bool {
        self.proxies_synced.load(Ordering::SeqCst)
            && self.services_synced.load(Ordering::SeqCst)
            && self.endpoints_synced.load(Ordering::SeqCst)
    }

    /// Run the reconciliation loop until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(node_ip = %self.config.node_ip, "Starting external services controller");
        self.reconciler.run(self, shutdown).await;
        info!("External services controller stopped");
    }

    async fn handle_pod(&self, pod: &Pod) {
        // Name and namespace never change, so a pod outside the selector can never be cached.
        if !self.config.proxy.matches(pod) {
            return;
        }
        let ready = proxy_ready(pod, &self.config.proxy, self.config.node_ip);
        debug!(key = %ObjectKey::of(pod), ready, "Observed proxy");
        self.admit(&self.proxies, pod, ready).await;
    }

    async fn handle_service(&self, service: &Service) {
        let eligible = service_eligible(service);
        if !eligible {
            trace!(key = %ObjectKey::of(service), "Skipping service without external IPs");
        }
        self.admit(&self.services, service, eligible).await;
    }

    async fn handle_endpoints(&self, endpoints: &Endpoints) {
        let ready = endpoints_ready(endpoints);
        trace!(key = %ObjectKey::of(endpoints), ready, "Observed endpoints");
        self.admit(&self.endpoints, endpoints, ready).await;
    }

    /// Apply a readiness decision to a cache, marking dirty when the cached
    /// state relevant to routing changed
    async fn admit<K: CachedObject>(&self, cache: &ObjectCache<K>, obj: &K, ready: bool) {
        if !ready {
            self.evict(cache, obj).await;
            return;
        }

        let key = ObjectKey::of(obj);
        match cache.add(obj.clone()).await {
            None => {
                info!(kind = cache.kind(), key = %key, "Adding to cache");
                self.cache_changed(cache).await;
            }
            Some(previous) if previous.route_view() != obj.route_view() => {
                info!(kind = cache.kind(), key = %key, "Cached object changed");
                self.cache_changed(cache).await;
            }
            Some(_) => trace!(kind = cache.kind(), key = %key, "Already cached"),
        }
    }

    async fn evict<K: CachedObject>(&self, cache: &ObjectCache<K>, obj: &K) {
        if cache.delete(obj).await.is_some() {
            info!(kind = cache.kind(), key = %ObjectKey::of(obj), "Removing from cache");
            self.cache_changed(cache).await;
        }
    }

    async fn cache_changed<K: CachedObject>(&self, cache: &ObjectCache<K>) {
        if let Some(metrics) = &self.metrics {
            metrics
                .cached_objects
                .with_label_values(&[cache.kind()])
                .set(cache.len().await as i64);
        }
        self.reconciler.mark_dirty();
    }
}

#[async_trait]
impl<S: RouteStore> Reconcile for ExternalServicesController<S> {
    async fn reconcile(&self) -> Result<()> {
        let snapshot = Snapshot::capture(&self.proxies, &self.services, &self.endpoints).await;
        let outcome = reconcile_routes(&snapshot, self.routes.as_ref()).await?;
        debug!(pruned = outcome.pruned, ensured = outcome.ensured, "Reconciled external IP routes");
        Ok(())
    }
}

#[async_trait]
impl<S: RouteStore> ResourceEventHandler<Pod> for ExternalServicesController<S> {
    async fn on_add(&self, pod: &Pod) {
        self.handle_pod(pod).await;
    }

    async fn on_update(&self, _old: &Pod, new: &Pod) {
        self.handle_pod(new).await;
    }

    async fn on_delete(&self, pod: &Pod) {
        self.evict(&self.proxies, pod).await;
    }

    fn on_synced(&self) {
        self.proxies_synced.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: RouteStore> ResourceEventHandler<Service> for ExternalServicesController<S> {
    async fn on_add(&self, service: &Service) {
        self.handle_service(service).await;
    }

    async fn on_update(&self, _old: &Service, new: &Service) {
        self.handle_service(new).await;
    }

    async fn on_delete(&self, service: &Service) {
        self.evict(&self.services, service).await;
    }

    fn on_synced(&self) {
        self.services_synced.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: RouteStore> ResourceEventHandler<Endpoints> for ExternalServicesController<S> {
    async fn on_add(&self, endpoints: &Endpoints) {
        self.handle_endpoints(endpoints).await;
    }

    async fn on_update(&self, _old: &Endpoints, new: &Endpoints) {
        self.handle_endpoints(new).await;
    }

    async fn on_delete(&self, endpoints: &Endpoints) {
        self.evict(&self.endpoints, endpoints).await;
    }

    fn on_synced(&self) {
        self.endpoints_synced.store(true, Ordering::SeqCst);
    }
}
