//! Object builders and an in-memory route store for tests

use crate::filters::{pod_host_ip, service_external_ips};
use crate::{CoreError, Result, RouteStore};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointSubset, Endpoints, Pod, PodCondition, PodStatus, Service, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use router_api::{ObjectKey, Route, RouteKey};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const NODE_IP: &str = "10.0.0.1";

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn proxy_pod(name: &str, host_ip: &str, ready: bool) -> Pod {
    Pod {
        metadata: meta("kube-system", name),
        status: Some(PodStatus {
            host_ip: Some(host_ip.to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(namespace: &str, name: &str, external_ips: &[&str]) -> Service {
    Service {
        metadata: meta(namespace, name),
        spec: Some(ServiceSpec {
            external_ips: Some(external_ips.iter().map(|ip| ip.to_string()).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn endpoints(namespace: &str, name: &str, addresses: &[&str]) -> Endpoints {
    Endpoints {
        metadata: meta(namespace, name),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                addresses
                    .iter()
                    .map(|ip| EndpointAddress {
                        ip: ip.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }]),
    }
}

/// Route store that records every call and can be told to fail
#[derive(Default)]
pub struct MemoryRouteStore {
    routes: Mutex<BTreeMap<RouteKey, Route>>,
    pub fail_adds: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub adds: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl MemoryRouteStore {
    pub fn keys(&self) -> Vec<(String, String)> {
        self.routes
            .lock()
            .unwrap()
            .keys()
            .map(|k| (k.service.to_string(), k.proxy.to_string()))
            .collect()
    }

    pub fn insert(&self, route: Route) {
        self.routes.lock().unwrap().insert(route.key(), route);
    }
}

#[async_trait::async_trait]
impl RouteStore for MemoryRouteStore {
    async fn list(&self) -> Result<Vec<Route>> {
        Ok(self.routes.lock().unwrap().values().cloned().collect())
    }

    async fn add(&self, service: &Service, proxy: &Pod) -> Result<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(CoreError::RouteStore("add rejected".to_string()));
        }
        let route = Route::new(
            ObjectKey::of(service),
            ObjectKey::of(proxy),
            service_external_ips(service)
                .iter()
                .filter_map(|ip| ip.parse().ok())
                .collect(),
            pod_host_ip(proxy).unwrap(),
        );
        self.routes.lock().unwrap().entry(route.key()).or_insert(route);
        Ok(())
    }

    async fn delete(&self, route: &Route) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CoreError::RouteStore("delete rejected".to_string()));
        }
        self.routes.lock().unwrap().remove(&route.key());
        Ok(())
    }
}
