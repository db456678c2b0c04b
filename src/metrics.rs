//! Prometheus metrics for the submission pipeline
//!
//! A [`Metrics`] value owns its registry and is handed to the components
//! that record into it; nothing is registered process-wide.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::time::Instant;

pub struct Metrics {
    registry: Registry,

    pub submissions_total: IntCounter,
    pub submissions_failed: IntCounter,
    pub simulations_failed: IntCounter,
    pub fee_ceiling_rejections: IntCounter,
    pub probe_retries: IntCounter,
    pub broadcasts_total: IntCounter,
    pub confirmation_timeouts: IntCounter,

    pub submit_latency: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("submissions_total", &self.submissions_total.get())
            .field("submissions_failed", &self.submissions_failed.get())
            .field("broadcasts_total", &self.broadcasts_total.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Number of batch submissions attempted",
        ))?;
        let submissions_failed = IntCounter::with_opts(Opts::new(
            "submissions_failed",
            "Number of batch submissions that failed at any stage",
        ))?;
        let simulations_failed = IntCounter::with_opts(Opts::new(
            "simulations_failed",
            "Number of batches rejected by simulation",
        ))?;
        let fee_ceiling_rejections = IntCounter::with_opts(Opts::new(
            "fee_ceiling_rejections",
            "Number of batches whose fee exceeded the ceiling",
        ))?;
        let probe_retries = IntCounter::with_opts(Opts::new(
            "probe_retries",
            "Number of fee estimates retried with the minimal amount",
        ))?;
        let broadcasts_total = IntCounter::with_opts(Opts::new(
            "broadcasts_total",
            "Number of signed batches injected",
        ))?;
        let confirmation_timeouts = IntCounter::with_opts(Opts::new(
            "confirmation_timeouts",
            "Number of injected batches whose inclusion could not be confirmed",
        ))?;
        let submit_latency = Histogram::with_opts(
            HistogramOpts::new("submit_latency_seconds", "Submission latency up to injection")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;

        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submissions_failed.clone()))?;
        registry.register(Box::new(simulations_failed.clone()))?;
        registry.register(Box::new(fee_ceiling_rejections.clone()))?;
        registry.register(Box::new(probe_retries.clone()))?;
        registry.register(Box::new(broadcasts_total.clone()))?;
        registry.register(Box::new(confirmation_timeouts.clone()))?;
        registry.register(Box::new(submit_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submissions_failed,
            simulations_failed,
            fee_ceiling_rejections,
            probe_retries,
            broadcasts_total,
            confirmation_timeouts,
            submit_latency,
        })
    }

    /// Registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every metric
    pub fn render(&self) -> anyhow::Result<String> {
        use prometheus::Encoder;
        let mut buf = Vec::new();
        prometheus::TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Measures elapsed time into a histogram
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.submissions_total.inc();
        assert_eq!(a.submissions_total.get(), 1);
        assert_eq!(b.submissions_total.get(), 0);
    }

    #[test]
    fn test_render_and_timer() {
        let metrics = Metrics::new().unwrap();
        metrics.probe_retries.inc();
        let timer = Timer::start();
        timer.observe_duration(&metrics.submit_latency);
        assert_eq!(metrics.submit_latency.get_sample_count(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("probe_retries 1"));
        assert!(text.contains("submit_latency_seconds_count 1"));
    }
}
