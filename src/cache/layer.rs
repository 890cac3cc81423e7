//! Ordered per-asset cache layers consulted before the upstream status endpoint.
//!
//! A [`LayerStack`] is tried front to back; the first layer holding a value for the asset answers
//! the lookup. Layers further from the source of truth should carry a TTL at least as long as the
//! layers behind them, otherwise the outer layer is refilled from a still-cached inner value.

// crates.io
use serde::Serialize;
// self
use crate::{
	_prelude::*,
	cache::store::CacheStore,
	metrics::{self, LayerMetrics, LayerMetricsSnapshot},
	model::{MachineDetail, RawStatusRecord},
};

/// What a layer caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
	/// Fully normalized machine payload.
	Machine,
	/// Raw upstream status records.
	Status,
}
impl LayerKind {
	/// Key prefix and metrics label.
	pub fn name(self) -> &'static str {
		match self {
			Self::Machine => "machine",
			Self::Status => "status",
		}
	}
}

/// Owned value returned by a layer hit.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerHit {
	/// Cached machine payload; served verbatim.
	Machine(MachineDetail),
	/// Cached raw records; the machine payload still has to be built.
	Status(Vec<RawStatusRecord>),
}

/// Borrowed value written into the matching layer.
#[derive(Clone, Copy, Debug)]
pub enum LayerValue<'a> {
	/// Value for the machine layer.
	Machine(&'a MachineDetail),
	/// Value for the status layer.
	Status(&'a [RawStatusRecord]),
}
impl LayerValue<'_> {
	fn kind(&self) -> LayerKind {
		match self {
			Self::Machine(_) => LayerKind::Machine,
			Self::Status(_) => LayerKind::Status,
		}
	}
}

/// One keyed TTL layer over a [`CacheStore`].
#[derive(Clone, Debug)]
pub struct CacheLayer {
	kind: LayerKind,
	ttl: Duration,
	store: CacheStore,
	metrics: Arc<LayerMetrics>,
}
impl CacheLayer {
	/// Build a layer; a zero TTL disables it.
	pub fn new(kind: LayerKind, store: CacheStore, ttl: Duration) -> Self {
		Self { kind, ttl, store, metrics: LayerMetrics::new() }
	}

	/// What this layer caches.
	pub fn kind(&self) -> LayerKind {
		self.kind
	}

	/// Entry lifetime; zero disables the layer.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Counters accumulated by this layer.
	pub fn metrics(&self) -> LayerMetricsSnapshot {
		self.metrics.snapshot()
	}

	/// Store key for an asset.
	pub fn key(&self, asset_id: &str) -> String {
		format!("{}:{asset_id}", self.kind.name())
	}

	/// Look the asset up. Store failures and undecodable values count as a miss.
	pub async fn lookup(&self, asset_id: &str) -> Option<LayerHit> {
		let key = self.key(asset_id);
		let hit = match self.kind {
			LayerKind::Machine =>
				self.store.get_json::<MachineDetail>(&key).await.map(|v| v.map(LayerHit::Machine)),
			LayerKind::Status => self
				.store
				.get_json::<Vec<RawStatusRecord>>(&key)
				.await
				.map(|v| v.map(LayerHit::Status)),
		};
		let hit = match hit {
			Ok(hit) => hit,
			Err(err) => {
				tracing::warn!(
					layer = self.kind.name(),
					%key,
					error = %err,
					"cache read failed; treating as miss"
				);

				self.metrics.record_store_error();

				None
			},
		};

		self.metrics.record_lookup(hit.is_some());
		metrics::record_cache_lookup(self.kind.name(), hit.is_some());
		tracing::debug!(layer = self.kind.name(), %key, hit = hit.is_some(), "cache lookup");

		hit
	}

	/// Replace the cached value for an asset. Failures are logged, never returned.
	pub async fn write(&self, asset_id: &str, value: LayerValue<'_>) {
		if value.kind() != self.kind || self.ttl.is_zero() {
			return;
		}

		let key = self.key(asset_id);
		let outcome = match value {
			LayerValue::Machine(detail) => self.store.set_json(&key, detail, self.ttl).await,
			LayerValue::Status(records) => self.store.set_json(&key, &records, self.ttl).await,
		};

		match outcome {
			Ok(()) => self.metrics.record_write(),
			Err(err) => {
				tracing::warn!(layer = self.kind.name(), %key, error = %err, "cache write failed");

				self.metrics.record_store_error();
			},
		}
	}
}

/// Layers in lookup precedence order, nearest to the caller first.
#[derive(Clone, Debug)]
pub struct LayerStack {
	layers: Vec<CacheLayer>,
}
impl LayerStack {
	/// Build a stack, warning when an outer layer would expire before an inner one.
	pub fn new(layers: Vec<CacheLayer>) -> Self {
		for pair in layers.windows(2) {
			if pair[0].ttl < pair[1].ttl {
				tracing::warn!(
					outer = pair[0].kind.name(),
					outer_ttl = ?pair[0].ttl,
					inner = pair[1].kind.name(),
					inner_ttl = ?pair[1].ttl,
					"outer cache layer expires before the layer it is built from"
				);
			}
		}

		Self { layers }
	}

	/// Layers in precedence order.
	pub fn layers(&self) -> &[CacheLayer] {
		&self.layers
	}

	/// First hit in precedence order.
	pub async fn first_hit(&self, asset_id: &str) -> Option<LayerHit> {
		for layer in &self.layers {
			if let Some(hit) = layer.lookup(asset_id).await {
				return Some(hit);
			}
		}

		None
	}

	/// Write a value into every layer of the matching kind.
	pub async fn fill(&self, asset_id: &str, value: LayerValue<'_>) {
		for layer in self.layers.iter().filter(|layer| layer.kind == value.kind()) {
			layer.write(asset_id, value).await;
		}
	}
}
