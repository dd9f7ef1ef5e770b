//! Core reconciliation for external-IP routes
//!
//! This library provides:
//! - Observed-state caches for proxies, services and endpoints
//! - Readiness filters deciding cache membership
//! - The event adapter and informer driving those caches
//! - A dirty reconciler converging a route store to the cached state

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod filters;
pub mod informer;
pub mod metrics;
pub mod reconcile;
pub mod reconciler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CachedObject, ObjectCache};
pub use config::{ControllerConfig, ProxySelector};
pub use controller::ExternalServicesController;
pub use error::{CoreError, Result};
pub use informer::{Informer, ResourceEventHandler};
pub use metrics::ControllerMetrics;
pub use reconcile::{reconcile_routes, ReconcileOutcome, Snapshot};
pub use reconciler::{DirtyReconciler, Reconcile, ReconcilerState};
pub use store::RouteStore;
