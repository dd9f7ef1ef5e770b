//! Shared types for the external-IP route controller
//!
//! This library defines:
//! - ObjectKey: namespace/name identity of cached Kubernetes objects
//! - Route: a (Service, Proxy) pair announced from this node

pub mod key;
pub mod route;

pub use key::ObjectKey;
pub use route::{Route, RouteKey};

/// Name prefix of node-local kube-proxy pods
pub const KUBE_PROXY_PREFIX: &str = "kube-proxy";
/// Namespace the kube-proxy pods run in
pub const KUBE_PROXY_NAMESPACE: &str = "kube-system";
