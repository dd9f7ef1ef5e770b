use crate::ObjectKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Identity of a route: the service it announces and the proxy serving it
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub service: ObjectKey,
    pub proxy: ObjectKey,
}

/// Route announces a Service's external IPs from this node, with the
/// node-local proxy's host address as next hop
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Service whose external IPs are announced
    pub service: ObjectKey,

    /// Proxy pod that makes the service servable on this node
    pub proxy: ObjectKey,

    /// External IPs of the service at the time the route was added
    pub external_ips: Vec<IpAddr>,

    /// Host address of the proxy
    pub next_hop: IpAddr,

    /// When this version of the route was announced
    pub announced_at: DateTime<Utc>,
}

impl Route {
    pub fn new(service: ObjectKey, proxy: ObjectKey, external_ips: Vec<IpAddr>, next_hop: IpAddr) -> Self {
        Self {
            service,
            proxy,
            external_ips,
            next_hop,
            announced_at: Utc::now(),
        }
    }

    pub fn key(&self) -> RouteKey {
        RouteKey {
            service: self.service.clone(),
            proxy: self.proxy.clone(),
        }
    }

    /// Whether two routes announce the same prefixes via the same next hop.
    /// The announcement time is ignored.
    pub fn same_announcement(&self, other: &Route) -> bool {
        self.external_ips == other.external_ips && self.next_hop == other.next_hop
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {} ({})", self.service, self.proxy, self.next_hop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(ips: &[&str], next_hop: &str) -> Route {
        Route::new(
            ObjectKey::new("default", "web"),
            ObjectKey::new("kube-system", "kube-proxy-node1"),
            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            next_hop.parse().unwrap(),
        )
    }

    #[test]
    fn test_same_announcement_ignores_timestamp() {
        let first = route(&["1.2.3.4"], "10.0.0.1");
        let mut second = route(&["1.2.3.4"], "10.0.0.1");
        second.announced_at = first.announced_at + chrono::Duration::seconds(30);
        assert!(first.same_announcement(&second));
    }

    #[test]
    fn test_changed_ips_differ() {
        let first = route(&["1.2.3.4"], "10.0.0.1");
        let second = route(&["1.2.3.4", "1.2.3.5"], "10.0.0.1");
        assert!(!first.same_announcement(&second));
        assert_eq!(first.key(), second.key());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(route(&["1.2.3.4"], "10.0.0.1")).unwrap();
        assert_eq!(json["externalIps"][0], "1.2.3.4");
        assert_eq!(json["nextHop"], "10.0.0.1");
        assert_eq!(json["service"]["name"], "web");
    }

    #[test]
    fn test_display() {
        let route = route(&["1.2.3.4"], "10.0.0.1");
        assert_eq!(route.to_string(), "default/web via kube-system/kube-proxy-node1 (10.0.0.1)");
    }
}
