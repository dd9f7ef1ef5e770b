//! Readiness predicates deciding which objects belong in the caches
//!
//! All predicates are pure: they look at the object state only, never at
//! what is currently cached.

use crate::config::ProxySelector;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use std::net::IpAddr;

/// A proxy is ready when it is a selected proxy pod on this node with a
/// `Ready=True` condition
pub fn proxy_ready(pod: &Pod, selector: &ProxySelector, node_ip: IpAddr) -> bool {
    selector.matches(pod)
        && pod_host_ip(pod).is_some_and(|ip| ip.to_canonical() == node_ip.to_canonical())
        && pod_ready(pod)
}

/// Host address reported in the pod status, if it parses
pub fn pod_host_ip(pod: &Pod) -> Option<IpAddr> {
    pod.status.as_ref()?.host_ip.as_deref()?.parse().ok()
}

pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

pub fn service_external_ips(service: &Service) -> &[String] {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.external_ips.as_deref())
        .unwrap_or_default()
}

/// Services are eligible for announcement when they carry external IPs
pub fn service_eligible(service: &Service) -> bool {
    !service_external_ips(service).is_empty()
}

/// Endpoints are ready when any subset has at least one address
pub fn endpoints_ready(endpoints: &Endpoints) -> bool {
    endpoints
        .subsets
        .iter()
        .flatten()
        .any(|subset| subset.addresses.as_ref().is_some_and(|a| !a.is_empty()))
}
