// Prometheus metrics for the tool server
//
// Exposed on the /metrics HTTP endpoint in network mode:
// - Tool calls by tool name and status (counter)
// - Tool call durations (histogram)
// - JSON-RPC requests by method (counter)
// - Open SSE streams (gauge)

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metrics owned by one server instance
///
/// Each instance has its own [`Registry`], so tests can create as many as
/// they like without registration conflicts.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    tool_calls_total: CounterVec,
    tool_call_duration_seconds: HistogramVec,
    rpc_requests_total: CounterVec,
    sse_streams_active: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let tool_calls_total = CounterVec::new(
            Opts::new("mcp_tool_calls_total", "Total number of MCP tool calls"),
            &["tool_name", "status"],
        )?;
        let tool_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new("mcp_tool_call_duration_seconds", "Duration of MCP tool calls"),
            &["tool_name"],
        )?;
        let rpc_requests_total = CounterVec::new(
            Opts::new("mcp_rpc_requests_total", "Total number of JSON-RPC requests"),
            &["method"],
        )?;
        let sse_streams_active = IntGauge::new(
            "mcp_sse_streams_active",
            "Number of open server-sent-event streams",
        )?;

        registry.register(Box::new(tool_calls_total.clone()))?;
        registry.register(Box::new(tool_call_duration_seconds.clone()))?;
        registry.register(Box::new(rpc_requests_total.clone()))?;
        registry.register(Box::new(sse_streams_active.clone()))?;

        Ok(Self {
            registry,
            tool_calls_total,
            tool_call_duration_seconds,
            rpc_requests_total,
            sse_streams_active,
        })
    }

    pub fn record_tool_call(&self, tool_name: &str, is_error: bool, duration: Duration) {
        let status = if is_error { "error" } else { "success" };
        self.tool_calls_total
            .with_label_values(&[tool_name, status])
            .inc();
        self.tool_call_duration_seconds
            .with_label_values(&[tool_name])
            .observe(duration.as_secs_f64());
    }

    pub fn record_rpc_request(&self, method: &str) {
        self.rpc_requests_total.with_label_values(&[method]).inc();
    }

    pub fn sse_stream_opened(&self) {
        self.sse_streams_active.inc();
    }

    pub fn sse_stream_closed(&self) {
        self.sse_streams_active.dec();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        // Two instances must not collide on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.record_rpc_request("ping");
        assert!(a.gather().unwrap().contains("mcp_rpc_requests_total{method=\"ping\"} 1"));
        assert!(!b.gather().unwrap().contains("method=\"ping\""));
    }

    #[test]
    fn test_tool_call_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_tool_call("kyverno_apply_policy", false, Duration::from_millis(20));
        metrics.record_tool_call("kyverno_apply_policy", true, Duration::from_millis(5));

        let text = metrics.gather().unwrap();
        assert!(text.contains(
            "mcp_tool_calls_total{status=\"success\",tool_name=\"kyverno_apply_policy\"} 1"
        ));
        assert!(text.contains(
            "mcp_tool_calls_total{status=\"error\",tool_name=\"kyverno_apply_policy\"} 1"
        ));
        assert!(text.contains("mcp_tool_call_duration_seconds_count{tool_name=\"kyverno_apply_policy\"} 2"));
    }

    #[test]
    fn test_sse_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.sse_stream_opened();
        metrics.sse_stream_opened();
        metrics.sse_stream_closed();
        assert!(metrics.gather().unwrap().contains("mcp_sse_streams_active 1"));
    }
}
