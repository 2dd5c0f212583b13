use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub feedback_submitted_total: IntCounter,
    pub dispatch_queue_depth: IntGauge,
    pub operation_latency_seconds: HistogramVec,
    pub rider_utilization: GaugeVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Applied order status transitions"),
            &["to"],
        )
        .expect("valid order_transitions_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Rider assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let feedback_submitted_total =
            IntCounter::new("feedback_submitted_total", "Accepted customer feedback")
                .expect("valid feedback_submitted_total metric");

        let dispatch_queue_depth = IntGauge::new(
            "dispatch_queue_depth",
            "Ready orders waiting for automatic rider assignment",
        )
        .expect("valid dispatch_queue_depth metric");

        let operation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of core mutations in seconds",
            ),
            &["operation"],
        )
        .expect("valid operation_latency_seconds metric");

        let rider_utilization = GaugeVec::new(
            Opts::new("rider_utilization", "Rider load ratio against capacity [0..1]"),
            &["rider_id"],
        )
        .expect("valid rider_utilization metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(feedback_submitted_total.clone()))
            .expect("register feedback_submitted_total");
        registry
            .register(Box::new(dispatch_queue_depth.clone()))
            .expect("register dispatch_queue_depth");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("register operation_latency_seconds");
        registry
            .register(Box::new(rider_utilization.clone()))
            .expect("register rider_utilization");

        Self {
            registry,
            order_transitions_total,
            assignments_total,
            feedback_submitted_total,
            dispatch_queue_depth,
            operation_latency_seconds,
            rider_utilization,
        }
    }

    pub fn observe_operation(&self, operation: &str, started: std::time::Instant) {
        self.operation_latency_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
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
