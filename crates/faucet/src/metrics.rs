//! Prometheus metrics for the faucet dispatcher.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Request outcomes, used as the `outcome` label.
pub const OUTCOME_GRANTED: &str = "granted";
pub const OUTCOME_RATE_LIMITED: &str = "rate_limited";
pub const OUTCOME_INVALID_ADDRESS: &str = "invalid_address";
pub const OUTCOME_FAILED: &str = "failed";

#[derive(Clone)]
pub struct FaucetMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub queue_depth: IntGauge,
    pub submission_duration: Histogram,
    pub operator_balance_tokens: Gauge,
    pub alerts_total: IntCounter,
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("mission_control_faucet_requests_total", "Funding requests by outcome"),
            &["outcome"],
        )?;

        let queue_depth = IntGauge::new(
            "mission_control_faucet_queue_depth",
            "Requests admitted but not yet completed",
        )?;

        let submission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "mission_control_faucet_submission_duration_seconds",
                "Time from submission to receipt",
            )
            .buckets(vec![1.0, 3.0, 6.0, 12.0, 24.0, 60.0, 120.0]),
        )?;

        let operator_balance_tokens = Gauge::new(
            "mission_control_faucet_operator_balance_tokens",
            "Last sampled operator balance in whole tokens",
        )?;

        let alerts_total = IntCounter::new(
            "mission_control_faucet_low_balance_alerts_total",
            "Low balance alerts emitted",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(submission_duration.clone()))?;
        registry.register(Box::new(operator_balance_tokens.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            queue_depth,
            submission_duration,
            operator_balance_tokens,
            alerts_total,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.requests_total.with_label_values(&[outcome]).get()
    }

    /// Text exposition format.
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
