//! Backend tier: asset listing and read-through machine detail.

// crates.io
use serde::Serialize;
// self
use crate::{
	_prelude::*,
	auth::{manager::CredentialManager, state::CredentialStatus},
	cache::{
		layer::{CacheLayer, LayerHit, LayerKind, LayerStack, LayerValue},
		store::CacheStore,
	},
	directory::AssetDirectory,
	metrics::LayerMetricsSnapshot,
	model::{Asset, MachineDetail, RawStatusRecord},
	normalize,
	upstream::client::UpstreamClient,
};

/// Serves asset listings and machine details through the credential manager and cache layers.
#[derive(Clone, Debug)]
pub struct MachineService {
	credentials: CredentialManager,
	upstream: Arc<UpstreamClient>,
	directory: Arc<AssetDirectory>,
	store: CacheStore,
	layers: LayerStack,
}
impl MachineService {
	/// Wire the service; the machine layer is consulted before the status layer.
	pub fn new(
		credentials: CredentialManager,
		upstream: Arc<UpstreamClient>,
		directory: Arc<AssetDirectory>,
		store: CacheStore,
		machine_ttl: Duration,
		status_ttl: Duration,
	) -> Self {
		let layers = LayerStack::new(vec![
			CacheLayer::new(LayerKind::Machine, store.clone(), machine_ttl),
			CacheLayer::new(LayerKind::Status, store.clone(), status_ttl),
		]);

		Self { credentials, upstream, directory, store, layers }
	}

	/// Full asset listing, optionally narrowed by a case-insensitive customer name substring.
	#[tracing::instrument(skip(self))]
	pub async fn list_assets(&self, client: Option<&str>) -> Result<Vec<Asset>> {
		let token = self.credentials.get_token().await?;
		let assets = self.directory.list(&token).await?;

		Ok(match client.filter(|c| !c.is_empty()) {
			Some(client) => assets.iter().filter(|a| a.belongs_to(client)).cloned().collect(),
			None => assets.as_ref().clone(),
		})
	}

	/// Machine detail for an asset name, read through the machine and status layers.
	#[tracing::instrument(skip(self))]
	pub async fn machine_detail(&self, name: &str) -> Result<MachineDetail> {
		let token = self.credentials.get_token().await?;
		let assets = self.directory.list(&token).await?;
		let asset = assets
			.iter()
			.find(|a| a.asset_name == name)
			.ok_or_else(|| Error::not_found(format!("Machine {name}")))?;
		let asset_id = asset.asset_id.as_str();
		let records = match self.layers.first_hit(asset_id).await {
			Some(LayerHit::Machine(detail)) => return Ok(detail),
			Some(LayerHit::Status(records)) => records,
			None => {
				let records = self.fetch_status(&token, asset_id).await?;

				self.layers.fill(asset_id, LayerValue::Status(&records)).await;

				records
			},
		};
		let summary = normalize::build_status(&records);
		let checks = records.iter().map(normalize::normalize_check).collect();
		let detail = MachineDetail::assemble(asset, summary, checks);

		self.layers.fill(asset_id, LayerValue::Machine(&detail)).await;

		Ok(detail)
	}

	/// Credential state plus per-layer cache counters.
	pub async fn health(&self) -> BackendHealth {
		BackendHealth {
			credentials: self.credentials.status().await,
			store: self.store.backend(),
			directory_ttl_secs: self.directory.ttl().as_secs(),
			layers: self
				.layers
				.layers()
				.iter()
				.map(|layer| {
					let metrics = layer.metrics();

					LayerHealth {
						layer: layer.kind(),
						ttl_secs: layer.ttl().as_secs(),
						hit_rate: metrics.hit_rate(),
						metrics,
					}
				})
				.collect(),
		}
	}

	async fn fetch_status(&self, token: &str, asset_id: &str) -> Result<Vec<RawStatusRecord>> {
		self.upstream.asset_status(token, asset_id).await.inspect_err(|err| {
			tracing::warn!(asset_id, error = %err, "upstream status fetch failed");
		})
	}
}

/// Health payload served by the backend.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
	/// Credential lifecycle state.
	pub credentials: CredentialStatus,
	/// Cache store backend name.
	pub store: &'static str,
	/// Asset directory snapshot TTL.
	pub directory_ttl_secs: u64,
	/// Cache layers in lookup order.
	pub layers: Vec<LayerHealth>,
}

/// Counters for one cache layer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerHealth {
	/// Layer kind.
	pub layer: LayerKind,
	/// Entry lifetime.
	pub ttl_secs: u64,
	/// Share of lookups answered by this layer.
	pub hit_rate: f64,
	/// Lookup and write counters.
	pub metrics: LayerMetricsSnapshot,
}
