//! Command line and environment configuration

use clap::{Parser, ValueEnum};
use router_api::{KUBE_PROXY_NAMESPACE, KUBE_PROXY_PREFIX};
use router_core::{ControllerConfig, ProxySelector};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Announces Service external IPs from nodes with a ready kube-proxy
#[derive(Debug, Parser)]
#[command(name = "router-controller")]
#[command(version)]
pub struct Config {
    /// Host address of this node
    #[arg(long, env = "NODE_IP")]
    pub node_ip: IpAddr,

    /// Name prefix of the proxy pods
    #[arg(long, env = "PROXY_PREFIX", default_value = KUBE_PROXY_PREFIX)]
    pub proxy_prefix: String,

    /// Namespace of the proxy pods
    #[arg(long, env = "PROXY_NAMESPACE", default_value = KUBE_PROXY_NAMESPACE)]
    pub proxy_namespace: String,

    /// Listen address for /metrics, /healthz, /readyz and /routes
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9102")]
    pub metrics_addr: SocketAddr,

    /// Reconcile at least this often, in seconds
    #[arg(long, env = "RESYNC_SECS")]
    pub resync_secs: Option<u64>,

    /// Delay before retrying a failed reconcile, in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 0)]
    pub retry_delay_ms: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            node_ip: self.node_ip,
            proxy: ProxySelector {
                name_prefix: self.proxy_prefix.clone(),
                namespace: self.proxy_namespace.clone(),
            },
            resync_period: self.resync_secs.map(Duration::from_secs),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["router-controller", "--node-ip", "10.0.0.1"]).unwrap();
        assert_eq!(config.proxy_prefix, "kube-proxy");
        assert_eq!(config.proxy_namespace, "kube-system");
        assert_eq!(config.metrics_addr, "0.0.0.0:9102".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Text);

        let controller = config.controller_config();
        assert_eq!(controller.node_ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(controller.resync_period, None);
        assert_eq!(controller.retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "router-controller",
            "--node-ip",
            "10.0.0.7",
            "--proxy-prefix",
            "cilium",
            "--resync-secs",
            "300",
            "--retry-delay-ms",
            "250",
            "--log-format",
            "json",
        ])
        .unwrap();

        let controller = config.controller_config();
        assert_eq!(controller.proxy.name_prefix, "cilium");
        assert_eq!(controller.resync_period, Some(Duration::from_secs(300)));
        assert_eq!(controller.retry_delay, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_node_ip_rejected() {
        assert!(Config::try_parse_from(["router-controller", "--node-ip", "node-1"]).is_err());
    }
}
