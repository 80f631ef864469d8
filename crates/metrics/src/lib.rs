//! Operational metrics for the rollup client
//!
//! This crate holds the registry of named instruments that the driver, proposer
//! and prover update, and the HTTP endpoint that exposes them for scraping.
//!
//! # Features
//!
//! - Counters, gauges and exponentially decaying sample histograms
//! - Lock-free `prometheus` integer counters and gauges, safe from any number
//!   of producers
//! - Prometheus text exposition on `GET /metrics`
//! - Endpoint lifetime bound to a cancellation token, closing open
//!   connections as well as the listener
//!
//! # Example
//!
//! ```no_run
//! use rollup_client_metrics::{start, ClientMetrics, Registry};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(Registry::new());
//!     let metrics = ClientMetrics::register(&registry).unwrap();
//!
//!     // Producers update their instruments
//!     metrics.proposer.epoch.inc();
//!
//!     // Serve until cancelled
//!     let cancel = CancellationToken::new();
//!     start(true, "0.0.0.0", 6060, registry, cancel).await.unwrap();
//! }
//! ```

pub mod exposition;
pub mod http;
pub mod instrument;
pub mod metrics;
pub mod registry;
pub mod sample;
pub mod tracing;

pub use exposition::MetricsError;
pub use http::{
    start, BoundMetricsServer, MetricsServer, MetricsServerError, ServeOutcome, METRICS_PATH,
};
pub use instrument::{
    Counter, Gauge, Histogram, Instrument, InstrumentKind, InstrumentValue, MetricSnapshot,
};
pub use metrics::{ClientMetrics, DriverMetrics, ProposerMetrics, ProverMetrics};
pub use registry::{Registry, RegistryError};
pub use sample::{ExpDecaySample, HistogramSnapshot, SampleParams};
pub use self::tracing::{init_tracing, TracingError};
