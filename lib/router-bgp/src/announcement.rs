//! Host-prefix announcements derived from routes

use ipnetwork::IpNetwork;
use router_api::Route;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// A single prefix to advertise and the next hop to advertise it with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub prefix: IpNetwork,
    pub next_hop: IpAddr,
}

impl Announcement {
    /// Announce a single address as a host prefix (/32 or /128)
    pub fn host(ip: IpAddr, next_hop: IpAddr) -> Self {
        Self {
            prefix: IpNetwork::from(ip),
            next_hop,
        }
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.prefix, self.next_hop)
    }
}

/// Deduplicated announcements for a set of routes, sorted by prefix then next hop.
/// Several proxies on the same host share a next hop, so their routes
/// collapse into one announcement per external IP.
pub fn collect<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Vec<Announcement> {
    let unique: BTreeSet<(IpAddr, IpAddr)> = routes
        .into_iter()
        .flat_map(|route| route.external_ips.iter().map(move |ip| (*ip, route.next_hop)))
        .collect();

    unique
        .into_iter()
        .map(|(ip, next_hop)| Announcement::host(ip, next_hop))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_api::ObjectKey;

    fn route(service: &str, proxy: &str, ips: &[&str], next_hop: &str) -> Route {
        Route::new(
            ObjectKey::new("default", service),
            ObjectKey::new("kube-system", proxy),
            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            next_hop.parse().unwrap(),
        )
    }

    #[test]
    fn test_host_prefix_lengths() {
        let hop: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(Announcement::host("1.2.3.4".parse().unwrap(), hop).prefix.prefix(), 32);
        assert_eq!(Announcement::host("2001:db8::1".parse().unwrap(), hop).prefix.prefix(), 128);
    }

    #[test]
    fn test_collect_deduplicates_and_sorts() {
        let routes = vec![
            route("web", "kube-proxy-a", &["1.2.3.5", "1.2.3.4"], "10.0.0.1"),
            route("web", "kube-proxy-b", &["1.2.3.4", "1.2.3.5"], "10.0.0.1"),
            route("api", "kube-proxy-a", &["1.2.3.4"], "10.0.0.1"),
        ];

        let announcements: Vec<String> = collect(&routes).iter().map(|a| a.to_string()).collect();
        assert_eq!(announcements, vec!["1.2.3.4/32 via 10.0.0.1", "1.2.3.5/32 via 10.0.0.1"]);
    }

    #[test]
    fn test_collect_empty() {
        assert!(collect(&Vec::<Route>::new()).is_empty());
    }
}
