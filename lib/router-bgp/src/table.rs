//! In-memory route table for external-IP routes

use crate::announcement::{self, Announcement};
use crate::TableError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use router_api::{ObjectKey, Route, RouteKey};
use router_core::filters::{pod_host_ip, service_external_ips};
use router_core::{ControllerMetrics, RouteStore};
use std::collections::BTreeMap;
use std::net::IpAddr;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// ExternalIpRouteTable holds the routes announced from this node and
/// publishes the resulting announcement set to subscribers
pub struct ExternalIpRouteTable {
    routes: RwLock<BTreeMap<RouteKey, Route>>,
    announcements: watch::Sender<Vec<Announcement>>,
    metrics: Option<ControllerMetrics>,
}

impl ExternalIpRouteTable {
    pub fn new() -> Self {
        let (announcements, _) = watch::channel(Vec::new());
        Self {
            routes: RwLock::new(BTreeMap::new()),
            announcements,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ControllerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive the announcement set every time it changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<Announcement>> {
        self.announcements.subscribe()
    }

    /// The current announcement set
    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements.borrow().clone()
    }

    /// All routes, ordered by service then proxy
    pub async fn routes(&self) -> Vec<Route> {
        let routes = self.routes.read().await;
        routes.values().cloned().collect()
    }

    /// Build the route announcing `service` via `proxy`
    pub fn route_for(service: &Service, proxy: &Pod) -> Result<Route, TableError> {
        let service_key = ObjectKey::of(service);
        let proxy_key = ObjectKey::of(proxy);

        let next_hop = pod_host_ip(proxy).ok_or_else(|| TableError::MissingNextHop(proxy_key.clone()))?;

        let external_ips: Vec<IpAddr> = service_external_ips(service)
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    warn!(service = %service_key, external_ip = %raw, "Ignoring unparseable external IP");
                    None
                }
            })
            .collect();

        Ok(Route::new(service_key, proxy_key, external_ips, next_hop))
    }

    fn publish(&self, routes: &BTreeMap<RouteKey, Route>) {
        let current = announcement::collect(routes.values());

        if let Some(metrics) = &self.metrics {
            metrics.routes.set(routes.len() as i64);
            metrics.announced_prefixes.set(current.len() as i64);
        }

        self.announcements.send_if_modified(|announced| {
            if *announced == current {
                return false;
            }
            info!(prefixes = current.len(), "Announcement set changed");
            *announced = current;
            true
        });
    }

    fn count_mutation(&self, operation: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .route_mutations_total
                .with_label_values(&[operation])
                .inc();
        }
    }
}

impl Default for ExternalIpRouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for ExternalIpRouteTable {
    async fn list(&self) -> router_core::Result<Vec<Route>> {
        Ok(self.routes().await)
    }

    async fn add(&self, service: &Service, proxy: &Pod) -> router_core::Result<()> {
        let route = Self::route_for(service, proxy)?;

        let mut routes = self.routes.write().await;
        if routes
            .get(&route.key())
            .is_some_and(|existing| existing.same_announcement(&route))
        {
            return Ok(());
        }

        info!(route = %route, external_ips = ?route.external_ips, "Adding route");
        routes.insert(route.key(), route);
        self.count_mutation("add");
        self.publish(&routes);
        Ok(())
    }

    async fn delete(&self, route: &Route) -> router_core::Result<()> {
        let mut routes = self.routes.write().await;
        if routes.remove(&route.key()).is_none() {
            debug!(route = %route, "Route already withdrawn");
            return Ok(());
        }

        info!(route = %route, "Deleting route");
        self.count_mutation("delete");
        self.publish(&routes);
        Ok(())
    }
}
