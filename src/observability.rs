use std::sync::Arc;

use hyper::{Body, Response};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    ticks_total: IntCounter,
    tick_latency: Histogram,
    writes_total: IntCounterVec,
    bulk_variables: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ticks_total = IntCounter::new("uats_ticks_total", "Completed update ticks").expect("metric");
        let tick_latency = Histogram::with_opts(HistogramOpts::new(
            "uats_tick_latency_seconds",
            "Time spent writing one tick, excluding the sleep",
        ))
        .expect("metric");
        let writes_total = IntCounterVec::new(
            prometheus::Opts::new("uats_writes_total", "Value writes issued by the scheduler"),
            &["outcome"],
        )
        .expect("metric");
        let bulk_variables = IntGauge::new("uats_bulk_variables", "Number of ManyObjects variables").expect("metric");

        registry.register(Box::new(ticks_total.clone())).expect("register");
        registry.register(Box::new(tick_latency.clone())).expect("register");
        registry.register(Box::new(writes_total.clone())).expect("register");
        registry.register(Box::new(bulk_variables.clone())).expect("register");

        Self {
            inner: Arc::new(Inner { registry, ticks_total, tick_latency, writes_total, bulk_variables }),
        }
    }

    pub fn render(&self) -> Response<Body> {
        let mf = self.inner.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&mf, &mut buf).expect("encode");

        Response::builder()
            .header("content-type", TextEncoder::new().format_type())
            .body(Body::from(buf))
            .unwrap()
    }

    pub fn observe_tick(&self, seconds: f64) {
        self.inner.ticks_total.inc();
        self.inner.tick_latency.observe(seconds);
    }

    pub fn inc_writes(&self, outcome: &'static str, n: u64) {
        self.inner.writes_total.with_label_values(&[outcome]).inc_by(n);
    }

    pub fn set_bulk_variables(&self, n: usize) {
        self.inner.bulk_variables.set(n as i64);
    }

    pub fn ticks(&self) -> u64 {
        self.inner.ticks_total.get()
    }

    pub fn writes(&self, outcome: &'static str) -> u64 {
        self.inner.writes_total.with_label_values(&[outcome]).get()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
