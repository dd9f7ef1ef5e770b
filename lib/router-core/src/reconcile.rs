//! The reconcile function: converge the route store to the cached state

use crate::{ObjectCache, Result, RouteStore};
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use router_api::{ObjectKey, Route};
use std::collections::HashSet;
use tracing::debug;

/// Point-in-time view of the three caches used for one reconcile run
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    proxies: Vec<Pod>,
    services: Vec<Service>,
    proxy_keys: HashSet<ObjectKey>,
    service_keys: HashSet<ObjectKey>,
    endpoints: HashSet<ObjectKey>,
}

impl Snapshot {
    pub async fn capture(
        proxies: &ObjectCache<Pod>,
        services: &ObjectCache<Service>,
        endpoints: &ObjectCache<Endpoints>,
    ) -> Self {
        let proxies = proxies.list().await;
        let services = services.list().await;
        let endpoints = endpoints.keys().await;
        Self::new(proxies, services, endpoints)
    }

    pub fn new(proxies: Vec<Pod>, services: Vec<Service>, endpoints: HashSet<ObjectKey>) -> Self {
        Self {
            proxy_keys: proxies.iter().map(ObjectKey::of).collect(),
            service_keys: services.iter().map(ObjectKey::of).collect(),
            proxies,
            services,
            endpoints,
        }
    }

    /// Why an existing route should be withdrawn, or None if it is still valid
    pub fn stale_reason(&self, route: &Route) -> Option<&'static str> {
        if !self.proxy_keys.contains(&route.proxy) {
            Some("proxy not ready")
        } else if !self.service_keys.contains(&route.service) {
            Some("service has no external IPs")
        } else if !self.endpoints.contains(&route.service) {
            Some("service has no ready endpoints")
        } else {
            None
        }
    }

    /// Every (service, proxy) pair that should have a route
    pub fn desired(&self) -> impl Iterator<Item = (&Service, &Pod)> + '_ {
        self.services
            .iter()
            .filter(|service| self.endpoints.contains(&ObjectKey::of(*service)))
            .flat_map(move |service| self.proxies.iter().map(move |proxy| (service, proxy)))
    }
}

/// What one reconcile run changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Stale routes deleted
    pub pruned: usize,
    /// Desired routes ensured through `add`
    pub ensured: usize,
}

/// Prune stale routes, then ensure every desired route exists.
///
/// The first store error aborts the run; changes applied so far stay applied
/// and the next run picks up from there.
pub async fn reconcile_routes<S: RouteStore + ?Sized>(
    snapshot: &Snapshot,
    store: &S,
) -> Result<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();

    for route in store.list().await? {
        if let Some(reason) = snapshot.stale_reason(&route) {
            debug!(route = %route, reason, "Deleting stale route");
            store.delete(&route).await?;
            outcome.pruned += 1;
        }
    }

    for (service, proxy) in snapshot.desired() {
        store.add(service, proxy).await?;
        outcome.ensured += 1;
    }

    Ok(outcome)
}
