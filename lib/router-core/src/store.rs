//! Route store contract consumed by the reconciler

use crate::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use router_api::Route;
use std::sync::Arc;

/// RouteStore holds the routes currently announced from this node.
///
/// Both `add` and `delete` must be idempotent: adding an existing route or
/// deleting a missing one succeeds without changing anything.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// All routes currently announced
    async fn list(&self) -> Result<Vec<Route>>;

    /// Ensure a route for `service` via `proxy` exists
    async fn add(&self, service: &Service, proxy: &Pod) -> Result<()>;

    /// Withdraw a route
    async fn delete(&self, route: &Route) -> Result<()>;
}

#[async_trait]
impl<T: RouteStore + ?Sized> RouteStore for Arc<T> {
    async fn list(&self) -> Result<Vec<Route>> {
        (**self).list().await
    }

    async fn add(&self, service: &Service, proxy: &Pod) -> Result<()> {
        (**self).add(service, proxy).await
    }

    async fn delete(&self, route: &Route) -> Result<()> {
        (**self).delete(route).await
    }
}
