use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub coordinator_operations_total: IntCounterVec,
    pub coordinator_latency_seconds: HistogramVec,
    pub drivers_busy: IntGauge,
    pub rides_completed_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let coordinator_operations_total = IntCounterVec::new(
            Opts::new(
                "coordinator_operations_total",
                "Ride coordinator operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid coordinator_operations_total metric");

        let coordinator_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "coordinator_latency_seconds",
                "Latency of ride coordinator operations in seconds",
            ),
            &["operation", "outcome"],
        )
        .expect("valid coordinator_latency_seconds metric");

        let drivers_busy = IntGauge::new("drivers_busy", "Drivers currently holding a ride")
            .expect("valid drivers_busy metric");

        let rides_completed_total =
            IntCounter::new("rides_completed_total", "Rides driven to completion")
                .expect("valid rides_completed_total metric");

        registry
            .register(Box::new(coordinator_operations_total.clone()))
            .expect("register coordinator_operations_total");
        registry
            .register(Box::new(coordinator_latency_seconds.clone()))
            .expect("register coordinator_latency_seconds");
        registry
            .register(Box::new(drivers_busy.clone()))
            .expect("register drivers_busy");
        registry
            .register(Box::new(rides_completed_total.clone()))
            .expect("register rides_completed_total");

        Self {
            registry,
            coordinator_operations_total,
            coordinator_latency_seconds,
            drivers_busy,
            rides_completed_total,
        }
    }

    pub fn observe(&self, operation: &str, success: bool, elapsed_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.coordinator_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.coordinator_latency_seconds
            .with_label_values(&[operation, outcome])
            .observe(elapsed_secs);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
