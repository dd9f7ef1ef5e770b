//! Prometheus metrics for the route controller

use crate::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics collector for reconciliation and the route table.
/// Clones share the same registry and metrics.
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Reconcile runs by result ("success" or "error")
    pub reconcile_runs_total: IntCounterVec,
    /// Reconcile run duration in seconds
    pub reconcile_duration_seconds: Histogram,
    /// Dirty signals raised
    pub dirty_signals_total: IntCounter,
    /// Objects held per cache
    pub cached_objects: IntGaugeVec,
    /// Route store mutations by operation ("add" or "delete")
    pub route_mutations_total: IntCounterVec,
    /// Routes in the route table
    pub routes: IntGauge,
    /// Distinct prefixes announced
    pub announced_prefixes: IntGauge,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_runs_total = IntCounterVec::new(
            Opts::new("reconcile_runs_total", "Reconcile runs by result"),
            &["result"],
        )?;

        let reconcile_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "reconcile_duration_seconds",
            "Reconcile run duration in seconds",
        ))?;

        let dirty_signals_total =
            IntCounter::new("dirty_signals_total", "Dirty signals raised by cache changes")?;

        let cached_objects = IntGaugeVec::new(
            Opts::new("cached_objects", "Objects held in each observed-state cache"),
            &["kind"],
        )?;

        let route_mutations_total = IntCounterVec::new(
            Opts::new("route_mutations_total", "Route table mutations by operation"),
            &["operation"],
        )?;

        let routes = IntGauge::new("routes", "Routes in the route table")?;

        let announced_prefixes =
            IntGauge::new("announced_prefixes", "Distinct prefixes announced from this node")?;

        registry.register(Box::new(reconcile_runs_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(dirty_signals_total.clone()))?;
        registry.register(Box::new(cached_objects.clone()))?;
        registry.register(Box::new(route_mutations_total.clone()))?;
        registry.register(Box::new(routes.clone()))?;
        registry.register(Box::new(announced_prefixes.clone()))?;

        Ok(Self {
            reconcile_runs_total,
            reconcile_duration_seconds,
            dirty_signals_total,
            cached_objects,
            route_mutations_total,
            routes,
            announced_prefixes,
            registry,
        })
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
