//! Controller configuration

use crate::{CoreError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use router_api::{KUBE_PROXY_NAMESPACE, KUBE_PROXY_PREFIX};
use std::net::IpAddr;
use std::time::Duration;

/// Which pods count as node-local service proxies
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxySelector {
    /// Pod name prefix, e.g. "kube-proxy"
    pub name_prefix: String,
    /// Namespace the proxies run in
    pub namespace: String,
}

impl Default for ProxySelector {
    fn default() -> Self {
        Self {
            name_prefix: KUBE_PROXY_PREFIX.to_string(),
            namespace: KUBE_PROXY_NAMESPACE.to_string(),
        }
    }
}

impl ProxySelector {
    /// Match on name prefix and namespace only; readiness is checked separately
    pub fn matches(&self, pod: &Pod) -> bool {
        pod.name_any().starts_with(&self.name_prefix)
            && pod.namespace().as_deref() == Some(self.namespace.as_str())
    }
}

/// Controller configuration
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Host address of this node; only proxies on this address are used
    pub node_ip: IpAddr,
    /// Proxy pod selection
    pub proxy: ProxySelector,
    /// Mark the reconciler dirty at this interval, if set
    pub resync_period: Option<Duration>,
    /// Pause before retrying a failed reconcile
    pub retry_delay: Duration,
}

impl ControllerConfig {
    pub fn new(node_ip: IpAddr) -> Self {
        Self {
            node_ip,
            proxy: ProxySelector::default(),
            resync_period: None,
            retry_delay: Duration::ZERO,
        }
    }

    /// Check the configuration for values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.node_ip.is_unspecified() {
            return Err(CoreError::InvalidConfiguration(format!(
                "node IP {} is unspecified",
                self.node_ip
            )));
        }
        if self.proxy.name_prefix.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "proxy name prefix is empty".to_string(),
            ));
        }
        if self.proxy.namespace.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "proxy namespace is empty".to_string(),
            ));
        }
        if self.resync_period.is_some_and(|p| p.is_zero()) {
            return Err(CoreError::InvalidConfiguration(
                "resync period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
