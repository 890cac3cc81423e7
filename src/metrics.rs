//! Metrics helpers and per-layer cache telemetry bookkeeping.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_CACHE_REQUESTS_TOTAL: &str = "vmwatch_cache_requests_total";
const METRIC_CACHE_HITS_TOTAL: &str = "vmwatch_cache_hits_total";
const METRIC_CACHE_MISSES_TOTAL: &str = "vmwatch_cache_misses_total";
const METRIC_UPSTREAM_REQUESTS_TOTAL: &str = "vmwatch_upstream_requests_total";
const METRIC_UPSTREAM_DURATION: &str = "vmwatch_upstream_duration_seconds";
const METRIC_CREDENTIAL_RENEWALS_TOTAL: &str = "vmwatch_credential_renewals_total";
const METRIC_FANOUT_DROPPED_TOTAL: &str = "vmwatch_fanout_dropped_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe counters for a single cache layer.
#[derive(Debug, Default)]
pub struct LayerMetrics {
	lookups: AtomicU64,
	hits: AtomicU64,
	writes: AtomicU64,
	store_errors: AtomicU64,
}
impl LayerMetrics {
	/// Create a new accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup outcome.
	pub fn record_lookup(&self, hit: bool) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
		if hit {
			self.hits.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Record a successful write.
	pub fn record_write(&self) {
		self.writes.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a store failure on either the read or the write path.
	pub fn record_store_error(&self) {
		self.store_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> LayerMetricsSnapshot {
		LayerMetricsSnapshot {
			lookups: self.lookups.load(Ordering::Relaxed),
			hits: self.hits.load(Ordering::Relaxed),
			writes: self.writes.load(Ordering::Relaxed),
			store_errors: self.store_errors.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of a layer's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetricsSnapshot {
	/// Total lookups against the layer.
	pub lookups: u64,
	/// Lookups answered by the layer.
	pub hits: u64,
	/// Values written to the layer.
	pub writes: u64,
	/// Store failures observed (reads degrade to misses, writes are skipped).
	pub store_errors: u64,
}
impl LayerMetricsSnapshot {
	/// Ratio of hits to lookups.
	pub fn hit_rate(&self) -> f64 {
		if self.lookups == 0 { 0.0 } else { self.hits as f64 / self.lookups as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a cache layer lookup.
pub fn record_cache_lookup(layer: &'static str, hit: bool) {
	let labels = layer_labels(layer);

	metrics::counter!(METRIC_CACHE_REQUESTS_TOTAL, labels.iter()).increment(1);

	if hit {
		metrics::counter!(METRIC_CACHE_HITS_TOTAL, labels.iter()).increment(1);
	} else {
		metrics::counter!(METRIC_CACHE_MISSES_TOTAL, labels.iter()).increment(1);
	}
}

/// Record one upstream HTTP call along with its latency.
pub fn record_upstream_request(endpoint: &'static str, success: bool, duration: Duration) {
	let mut labels = endpoint_labels(endpoint);

	metrics::histogram!(METRIC_UPSTREAM_DURATION, labels.iter()).record(duration.as_secs_f64());

	labels.push(Label::new("status", if success { "success" } else { "error" }));

	metrics::counter!(METRIC_UPSTREAM_REQUESTS_TOTAL, labels.iter()).increment(1);
}

/// Record a credential renewal attempt (`login` or `refresh`).
pub fn record_credential_renewal(method: &'static str, success: bool) {
	let labels: LabelSet = SmallVec::from_iter([
		Label::new("method", method),
		Label::new("status", if success { "success" } else { "error" }),
	]);

	metrics::counter!(METRIC_CREDENTIAL_RENEWALS_TOTAL, labels.iter()).increment(1);
}

/// Record fan-out branches dropped from an aggregation.
pub fn record_fanout_dropped(count: usize) {
	if count > 0 {
		metrics::counter!(METRIC_FANOUT_DROPPED_TOTAL).increment(count as u64);
	}
}

fn layer_labels(layer: &'static str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("layer", layer));

	labels
}

fn endpoint_labels(endpoint: &'static str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("endpoint", endpoint));

	labels
}
