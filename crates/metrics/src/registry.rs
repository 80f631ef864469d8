use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::exposition::{self, exposition_name, MetricsError};
use crate::instrument::{Counter, Gauge, Histogram, Instrument, MetricSnapshot};
use crate::sample::SampleParams;

/// Registry of named instruments.
///
/// Collection and rendering go through an owned [`prometheus::Registry`]. The
/// handles are also indexed by their original name for lookups and typed
/// snapshots. Instruments are registered once, usually during start-up, and
/// live as long as the registry. Updating an instrument never touches the
/// registry lock.
#[derive(Debug)]
pub struct Registry {
    registry: prometheus::Registry,
    index: RwLock<Index>,
}

#[derive(Debug, Default)]
struct Index {
    instruments: BTreeMap<String, Instrument>,
    // exposition name -> registered name
    rendered: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            registry: prometheus::Registry::new(),
            index: RwLock::new(Index::default()),
        }
    }

    /// Register a counter under `name`.
    pub fn register_counter(&self, name: &str) -> Result<Counter, RegistryError> {
        let counter = Counter::new(name).map_err(|e| invalid_name(name, e))?;
        self.register(name, Instrument::Counter(counter.clone()))?;
        Ok(counter)
    }

    /// Register a gauge under `name`.
    pub fn register_gauge(&self, name: &str) -> Result<Gauge, RegistryError> {
        let gauge = Gauge::new(name).map_err(|e| invalid_name(name, e))?;
        self.register(name, Instrument::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Register a decaying-sample histogram under `name`.
    pub fn register_histogram(
        &self,
        name: &str,
        params: SampleParams,
    ) -> Result<Histogram, RegistryError> {
        let histogram = Histogram::new(name, params).map_err(|e| invalid_name(name, e))?;
        self.register(name, Instrument::Histogram(histogram.clone()))?;
        Ok(histogram)
    }

    /// Registering a name twice is an error, as is a name that renders
    /// identically to one already registered.
    fn register(&self, name: &str, instrument: Instrument) -> Result<(), RegistryError> {
        let rendered = exposition_name(name);
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);

        if index.instruments.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        if let Some(existing) = index.rendered.get(&rendered) {
            return Err(RegistryError::NameCollision {
                name: name.to_string(),
                existing: existing.clone(),
            });
        }

        self.registry
            .register(instrument.collector())
            .map_err(|e| match e {
                prometheus::Error::AlreadyReg => RegistryError::DuplicateName(name.to_string()),
                other => RegistryError::Prometheus(other),
            })?;

        tracing::debug!(name, kind = %instrument.kind(), "registered instrument");
        index.rendered.insert(rendered, name.to_string());
        index.instruments.insert(name.to_string(), instrument);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Instrument> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .instruments
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .instruments
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .instruments
            .keys()
            .cloned()
            .collect()
    }

    /// Read every instrument, ordered by name.
    ///
    /// Handles are cloned under the read lock and values are read after it is
    /// released, so the result is not atomic across instruments.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let instruments: Vec<(String, Instrument)> = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .instruments
            .iter()
            .map(|(name, instrument)| (name.clone(), instrument.clone()))
            .collect();

        instruments
            .into_iter()
            .map(|(name, instrument)| MetricSnapshot {
                name,
                value: instrument.read(),
            })
            .collect()
    }

    /// Export a fresh snapshot in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        exposition::encode(&self.registry.gather())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_name(name: &str, source: prometheus::Error) -> RegistryError {
    RegistryError::InvalidName {
        name: name.to_string(),
        reason: source.to_string(),
    }
}

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("instrument already registered: {0}")]
    DuplicateName(String),
    #[error("invalid instrument name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("instrument name {name} renders the same as {existing}")]
    NameCollision { name: String, existing: String },
    #[error("invalid sample parameters: {0}")]
    InvalidSampleParams(String),
    #[error("prometheus registration failed: {0}")]
    Prometheus(#[source] prometheus::Error),
}
