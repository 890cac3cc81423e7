//! Gateway tier: per-client aggregation over the backend with partial-failure tolerance.

pub mod client;

// crates.io
use serde::{Serialize, de::DeserializeOwned};
use tokio::{task::JoinSet, time};
// self
use crate::{
	_prelude::*,
	cache::store::CacheStore,
	gateway::client::BackendClient,
	metrics,
	model::{DataEnvelope, MachineDetail, VmNames},
};

/// Default TTL of aggregated gateway responses.
pub const DEFAULT_GATEWAY_TTL: Duration = Duration::from_secs(120);

/// Aggregates backend calls per client and caches the results.
#[derive(Clone, Debug)]
pub struct Gateway {
	backend: BackendClient,
	store: CacheStore,
	ttl: Duration,
	fetch_timeout: Duration,
}
impl Gateway {
	/// Build a gateway; a zero TTL disables response caching.
	pub fn new(
		backend: BackendClient,
		store: CacheStore,
		ttl: Duration,
		fetch_timeout: Duration,
	) -> Self {
		Self { backend, store, ttl, fetch_timeout }
	}

	/// Machine details for every asset of a client, in backend listing order.
	///
	/// Details are fetched concurrently. A branch that fails or times out is dropped from the
	/// result; only a failed asset listing fails the call.
	#[tracing::instrument(skip(self))]
	pub async fn client_status(&self, client: &str) -> Result<DataEnvelope<MachineDetail>> {
		let key = format!("status:{client}");

		if let Some(cached) = self.read(&key).await {
			return Ok(cached);
		}

		let names = self
			.backend
			.assets(client)
			.await?
			.into_iter()
			.map(|asset| asset.asset_name)
			.filter(|name| !name.is_empty())
			.collect::<Vec<_>>();
		let details = self.fan_out(names).await;
		let envelope = DataEnvelope::new(details);

		self.write(&key, &envelope).await;

		Ok(envelope)
	}

	/// Asset names of a client, cached independently of [`client_status`](Self::client_status).
	#[tracing::instrument(skip(self))]
	pub async fn vm_names(&self, client: &str) -> Result<VmNames> {
		let key = format!("vmnames:{client}");

		if let Some(cached) = self.read(&key).await {
			return Ok(cached);
		}

		let names = self
			.backend
			.assets(client)
			.await?
			.into_iter()
			.map(|asset| asset.asset_name)
			.filter(|name| !name.is_empty())
			.collect();
		let names = VmNames { names };

		self.write(&key, &names).await;

		Ok(names)
	}

	/// Uncached pass-through to the backend machine detail.
	#[tracing::instrument(skip(self))]
	pub async fn machine(&self, name: &str) -> Result<MachineDetail> {
		self.backend.machine(name).await
	}

	async fn fan_out(&self, names: Vec<String>) -> Vec<MachineDetail> {
		let mut slots: Vec<Option<MachineDetail>> = vec![None; names.len()];
		let mut set = JoinSet::new();

		for (index, name) in names.into_iter().enumerate() {
			let backend = self.backend.clone();
			let fetch_timeout = self.fetch_timeout;

			set.spawn(async move {
				let outcome = time::timeout(fetch_timeout, backend.machine(&name))
					.await
					.map_err(Error::from)
					.and_then(|outcome| outcome);

				(index, name, outcome)
			});
		}

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok((index, _, Ok(detail))) => slots[index] = Some(detail),
				Ok((_, name, Err(err))) => {
					tracing::warn!(machine = %name, error = %err, "machine dropped from aggregate");
				},
				Err(err) => tracing::warn!(error = %err, "machine fetch task failed"),
			}
		}

		let total = slots.len();
		let details = slots.into_iter().flatten().collect::<Vec<_>>();

		metrics::record_fanout_dropped(total - details.len());

		details
	}

	async fn read<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		match self.store.get_json(key).await {
			Ok(hit) => {
				tracing::debug!(%key, hit = hit.is_some(), "gateway cache lookup");

				hit
			},
			Err(err) => {
				tracing::warn!(%key, error = %err, "gateway cache read failed; treating as miss");

				None
			},
		}
	}

	async fn write<T>(&self, key: &str, value: &T)
	where
		T: Serialize,
	{
		if let Err(err) = self.store.set_json(key, value, self.ttl).await {
			tracing::warn!(%key, error = %err, "gateway cache write failed");
		}
	}
}
