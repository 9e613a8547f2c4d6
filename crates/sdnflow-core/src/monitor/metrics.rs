//! Prometheus metrics for the forwarding core.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use sdnflow_types::{DatapathId, PortNo};
use std::sync::Arc;

/// Metrics shared by the controller, the stats poller and the health
/// monitor. Cloning shares the underlying registry.
#[derive(Clone)]
pub struct MetricsCollector {
    // Counters
    pub frames_total: Counter,
    pub frames_dropped_total: CounterVec,
    pub floods_total: Counter,
    pub rules_installed_total: Counter,
    pub rules_deleted_total: Counter,
    pub switch_errors_total: Counter,
    pub hosts_moved_total: Counter,

    // Gauges
    pub switches: Gauge,
    pub hosts: Gauge,
    pub links: Gauge,
    pub port_tx_bps: GaugeVec,
    pub port_rx_bps: GaugeVec,
    pub health_status: Gauge,

    // Histograms
    pub event_latency_seconds: Histogram,

    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let frames_total = Counter::with_opts(Opts::new(
            "sdnflow_frames_total",
            "Total number of frames handled by the forwarding engine",
        ))?;
        registry.register(Box::new(frames_total.clone()))?;

        let frames_dropped_total = CounterVec::new(
            Opts::new("sdnflow_frames_dropped_total", "Total number of dropped frames"),
            &["reason"],
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        let floods_total = Counter::with_opts(Opts::new(
            "sdnflow_floods_total",
            "Total number of frames flooded over the spanning tree",
        ))?;
        registry.register(Box::new(floods_total.clone()))?;

        let rules_installed_total = Counter::with_opts(Opts::new(
            "sdnflow_rules_installed_total",
            "Total number of forwarding rules installed",
        ))?;
        registry.register(Box::new(rules_installed_total.clone()))?;

        let rules_deleted_total = Counter::with_opts(Opts::new(
            "sdnflow_rules_deleted_total",
            "Total number of rule delete commands issued",
        ))?;
        registry.register(Box::new(rules_deleted_total.clone()))?;

        let switch_errors_total = Counter::with_opts(Opts::new(
            "sdnflow_switch_errors_total",
            "Total number of failed switch commands and stats requests",
        ))?;
        registry.register(Box::new(switch_errors_total.clone()))?;

        let hosts_moved_total = Counter::with_opts(Opts::new(
            "sdnflow_hosts_moved_total",
            "Total number of host mobility events",
        ))?;
        registry.register(Box::new(hosts_moved_total.clone()))?;

        let switches = Gauge::with_opts(Opts::new(
            "sdnflow_switches",
            "Number of connected switches",
        ))?;
        registry.register(Box::new(switches.clone()))?;

        let hosts = Gauge::with_opts(Opts::new("sdnflow_hosts", "Number of learned hosts"))?;
        registry.register(Box::new(hosts.clone()))?;

        let links = Gauge::with_opts(Opts::new(
            "sdnflow_links",
            "Number of switch-to-switch links",
        ))?;
        registry.register(Box::new(links.clone()))?;

        let port_tx_bps = GaugeVec::new(
            Opts::new("sdnflow_port_tx_bps", "Transmit rate per port in bits per second"),
            &["dpid", "port"],
        )?;
        registry.register(Box::new(port_tx_bps.clone()))?;

        let port_rx_bps = GaugeVec::new(
            Opts::new("sdnflow_port_rx_bps", "Receive rate per port in bits per second"),
            &["dpid", "port"],
        )?;
        registry.register(Box::new(port_rx_bps.clone()))?;

        let health_status = Gauge::with_opts(Opts::new(
            "sdnflow_health_status",
            "Controller health (1.0=healthy, 0.5=degraded, 0.0=unhealthy)",
        ))?;
        registry.register(Box::new(health_status.clone()))?;

        let event_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "sdnflow_event_latency_seconds",
                "Event handling latency in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(event_latency_seconds.clone()))?;

        Ok(Self {
            frames_total,
            frames_dropped_total,
            floods_total,
            rules_installed_total,
            rules_deleted_total,
            switch_errors_total,
            hosts_moved_total,
            switches,
            hosts,
            links,
            port_tx_bps,
            port_rx_bps,
            health_status,
            event_latency_seconds,
            registry: Arc::new(registry),
        })
    }

    pub fn record_drop(&self, reason: &str) {
        self.frames_dropped_total.with_label_values(&[reason]).inc();
    }

    pub fn dropped(&self, reason: &str) -> f64 {
        self.frames_dropped_total.with_label_values(&[reason]).get()
    }

    pub fn set_topology_size(&self, switches: usize, hosts: usize, links: usize) {
        self.switches.set(switches as f64);
        self.hosts.set(hosts as f64);
        self.links.set(links as f64);
    }

    pub fn set_port_rate(&self, dpid: DatapathId, port: PortNo, tx_bps: f64, rx_bps: f64) {
        let dpid = dpid.to_string();
        let port = port.to_string();
        self.port_tx_bps
            .with_label_values(&[dpid.as_str(), port.as_str()])
            .set(tx_bps);
        self.port_rx_bps
            .with_label_values(&[dpid.as_str(), port.as_str()])
            .set(rx_bps);
    }

    pub fn set_health_status(&self, status: HealthStatus) {
        let value = match status {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unhealthy => 0.0,
        };
        self.health_status.set(value);
    }

    pub fn observe_event_latency(&self, duration_secs: f64) {
        self.event_latency_seconds.observe(duration_secs);
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Controller health as reported by [`HealthMonitor`](super::HealthMonitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Events are flowing and almost all succeed
    Healthy,
    /// Events are flowing but too many fail
    Degraded,
    /// No event for longer than the stall limit
    Unhealthy,
}
