//! Prometheus text rendering.
//!
//! Registry names use `/` as a hierarchy separator, which the exposition format
//! does not allow, so rendered names replace it with `_`. The original name is
//! kept as the HELP text. Histograms are rendered as summaries.

use prometheus::core::Desc;
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::sample::HistogramSnapshot;

/// Quantiles reported for every histogram.
pub const SUMMARY_QUANTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.99, 0.999, 0.9999];

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Name under which `name` is exposed.
pub fn exposition_name(name: &str) -> String {
    name.replace('/', "_")
}

/// Render gathered metric families in the text exposition format.
pub fn encode(families: &[MetricFamily]) -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(families, &mut buffer)
        .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
}

/// Summary family for a decaying-sample histogram described by `desc`.
pub(crate) fn summary_family(desc: &Desc, histogram: &HistogramSnapshot) -> MetricFamily {
    let mut summary = proto::Summary::default();
    summary.set_sample_count(histogram.count);
    summary.set_sample_sum(histogram.sum as f64);

    for (q, value) in SUMMARY_QUANTILES
        .iter()
        .zip(histogram.percentiles(&SUMMARY_QUANTILES))
    {
        let mut quantile = proto::Quantile::default();
        quantile.set_quantile(*q);
        quantile.set_value(value);
        summary.mut_quantile().push(quantile);
    }

    let mut metric = proto::Metric::default();
    metric.set_summary(summary);

    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(MetricType::SUMMARY);
    family.mut_metric().push(metric);
    family
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}
