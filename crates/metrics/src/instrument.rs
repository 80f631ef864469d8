use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntCounter, IntGauge, Opts};

use crate::exposition::{exposition_name, summary_family};
use crate::sample::{ExpDecaySample, HistogramSnapshot, SampleParams};

/// Exposition options for the instrument named `name`.
fn opts(name: &str) -> Opts {
    Opts::new(exposition_name(name), name)
}

/// Monotonically non-decreasing 64-bit counter.
///
/// Cloning yields another handle to the same value.
#[derive(Debug, Clone)]
pub struct Counter(IntCounter);

impl Counter {
    /// Create an unregistered counter. Fails if `name` cannot be exposed.
    pub fn new(name: &str) -> prometheus::Result<Self> {
        IntCounter::with_opts(opts(name)).map(Self)
    }

    /// Increase the counter by `delta`.
    pub fn add(&self, delta: u64) {
        self.0.inc_by(delta);
    }

    pub fn inc(&self) {
        self.0.inc();
    }

    pub fn value(&self) -> u64 {
        self.0.get()
    }

    pub(crate) fn collector(&self) -> Box<dyn Collector> {
        Box::new(self.0.clone())
    }
}

/// Signed 64-bit gauge holding the last value set.
#[derive(Debug, Clone)]
pub struct Gauge(IntGauge);

impl Gauge {
    pub fn new(name: &str) -> prometheus::Result<Self> {
        IntGauge::with_opts(opts(name)).map(Self)
    }

    pub fn set(&self, value: i64) {
        self.0.set(value);
    }

    pub fn inc(&self) {
        self.0.inc();
    }

    pub fn dec(&self) {
        self.0.dec();
    }

    pub fn value(&self) -> i64 {
        self.0.get()
    }

    pub(crate) fn collector(&self) -> Box<dyn Collector> {
        Box::new(self.0.clone())
    }
}

/// Histogram backed by an exponentially decaying reservoir.
///
/// Collected as a summary: reservoir quantiles plus the running count and sum
/// of every observation.
#[derive(Clone)]
pub struct Histogram {
    sample: Arc<Mutex<ExpDecaySample>>,
    desc: Desc,
}

impl Histogram {
    pub fn new(name: &str, params: SampleParams) -> prometheus::Result<Self> {
        let desc = Desc::new(exposition_name(name), name.to_string(), vec![], HashMap::new())?;
        Ok(Self {
            sample: Arc::new(Mutex::new(ExpDecaySample::new(params))),
            desc,
        })
    }

    /// Record one observed value.
    pub fn observe(&self, value: i64) {
        self.sample().update(value);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.sample().snapshot()
    }

    pub fn clear(&self) {
        self.sample().clear();
    }

    pub fn params(&self) -> SampleParams {
        self.sample().params()
    }

    pub(crate) fn collector(&self) -> Box<dyn Collector> {
        Box::new(self.clone())
    }

    // Poisoning is ignored: every update leaves the sample consistent.
    fn sample(&self) -> MutexGuard<'_, ExpDecaySample> {
        self.sample.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Collector for Histogram {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![summary_family(&self.desc, &self.snapshot())]
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("name", &self.desc.help)
            .field("params", &self.params())
            .finish()
    }
}

/// Instrument kinds held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered instrument handle
#[derive(Debug, Clone)]
pub enum Instrument {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
}

impl Instrument {
    pub(crate) fn collector(&self) -> Box<dyn Collector> {
        match self {
            Instrument::Counter(c) => c.collector(),
            Instrument::Gauge(g) => g.collector(),
            Instrument::Histogram(h) => h.collector(),
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::Counter(_) => InstrumentKind::Counter,
            Instrument::Gauge(_) => InstrumentKind::Gauge,
            Instrument::Histogram(_) => InstrumentKind::Histogram,
        }
    }

    /// Read the instrument's current value(s).
    pub fn read(&self) -> InstrumentValue {
        match self {
            Instrument::Counter(c) => InstrumentValue::Counter(c.value()),
            Instrument::Gauge(g) => InstrumentValue::Gauge(g.value()),
            Instrument::Histogram(h) => InstrumentValue::Histogram(h.snapshot()),
        }
    }
}

/// Current value(s) of one instrument
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentValue {
    Counter(u64),
    Gauge(i64),
    Histogram(HistogramSnapshot),
}

impl InstrumentValue {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentValue::Counter(_) => InstrumentKind::Counter,
            InstrumentValue::Gauge(_) => InstrumentKind::Gauge,
            InstrumentValue::Histogram(_) => InstrumentKind::Histogram,
        }
    }
}

/// One entry of a registry snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub value: InstrumentValue,
}

impl MetricSnapshot {
    pub fn kind(&self) -> InstrumentKind {
        self.value.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accumulates() {
        let counter = Counter::new("proposer/epoch").unwrap();
        counter.add(3);
        counter.inc();
        counter.add(0);
        assert_eq!(counter.value(), 4);

        // clones share state
        let other = counter.clone();
        other.add(6);
        assert_eq!(counter.value(), 10);
    }

    #[test]
    fn test_gauge_keeps_last_value() {
        let gauge = Gauge::new("proposer/blockFee").unwrap();
        gauge.set(42);
        gauge.set(-7);
        assert_eq!(gauge.value(), -7);

        gauge.inc();
        gauge.inc();
        gauge.dec();
        assert_eq!(gauge.value(), -6);
    }

    #[test]
    fn test_histogram_observe() {
        let histogram =
            Histogram::new("prover/proof/pse/generation/time", SampleParams::default()).unwrap();
        histogram.observe(10);
        histogram.observe(20);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.sum, 30);
        assert_eq!(snapshot.min(), 10);
        assert_eq!(snapshot.max(), 20);

        histogram.clear();
        assert_eq!(histogram.snapshot().count, 0);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(Counter::new("").is_err());
        assert!(Gauge::new("1st/gauge").is_err());
        assert!(Histogram::new("has space", SampleParams::default()).is_err());
    }

    #[test]
    fn test_histogram_collects_summary() {
        let histogram =
            Histogram::new("prover/proof/pse/generation/time", SampleParams::default()).unwrap();
        histogram.observe(4);

        assert_eq!(histogram.desc()[0].fq_name, "prover_proof_pse_generation_time");
        let families = histogram.collect();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_help(), "prover/proof/pse/generation/time");
        assert_eq!(families[0].get_metric()[0].get_summary().get_sample_count(), 1);
    }

    #[test]
    fn test_instrument_read() {
        let counter = Counter::new("proposer/proposed/txs").unwrap();
        counter.add(2);
        let instrument = Instrument::Counter(counter);

        assert_eq!(instrument.kind(), InstrumentKind::Counter);
        assert_eq!(instrument.read(), InstrumentValue::Counter(2));
        assert_eq!(InstrumentKind::Histogram.to_string(), "histogram");
    }
}
