//! In-process, all-or-nothing cache of the full upstream asset listing.

// crates.io
use tokio::sync::{Mutex, RwLock};
// self
use crate::{_prelude::*, model::Asset, upstream::client::UpstreamClient};

/// Default page size requested from the asset search endpoint.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Default `l2Support` value the listing is filtered on.
pub const DEFAULT_SUPPORT_GROUP: &str = "ATQIHF";

/// Paginated asset listing cached as one snapshot.
///
/// The snapshot is replaced as a unit; there is no per-asset invalidation. A zero TTL disables
/// caching and every call walks the pages again. Concurrent misses wait for a single fetch.
#[derive(Debug)]
pub struct AssetDirectory {
	upstream: Arc<UpstreamClient>,
	ttl: Duration,
	page_size: u32,
	support_group: String,
	snapshot: RwLock<Option<DirectorySnapshot>>,
	single_flight: Mutex<()>,
}
impl AssetDirectory {
	/// Build a directory with the default page size and support group.
	pub fn new(upstream: Arc<UpstreamClient>, ttl: Duration) -> Self {
		Self {
			upstream,
			ttl,
			page_size: DEFAULT_PAGE_SIZE,
			support_group: DEFAULT_SUPPORT_GROUP.into(),
			snapshot: RwLock::new(None),
			single_flight: Mutex::new(()),
		}
	}

	/// Override the page size. Zero is rejected.
	pub fn with_page_size(mut self, page_size: u32) -> Result<Self> {
		if page_size == 0 {
			return Err(Error::Validation {
				field: "page_size",
				reason: "Page size must be greater than zero.".into(),
			});
		}

		self.page_size = page_size;

		Ok(self)
	}

	/// Override the support group filter.
	pub fn with_support_group(mut self, support_group: impl Into<String>) -> Self {
		self.support_group = support_group.into();

		self
	}

	/// Snapshot TTL.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Return the cached listing, or fetch every page when it is absent or expired.
	///
	/// A failure on any page fails the whole call and leaves the previous snapshot untouched.
	#[tracing::instrument(skip_all)]
	pub async fn list(&self, token: &str) -> Result<Arc<Vec<Asset>>> {
		if let Some(assets) = self.cached(Instant::now()).await {
			tracing::debug!(count = assets.len(), "asset directory hit");

			return Ok(assets);
		}

		if self.ttl.is_zero() {
			return Ok(Arc::new(self.fetch_all(token).await?));
		}

		let _guard = self.single_flight.lock().await;

		// Another caller may have loaded the snapshot while this one waited.
		if let Some(assets) = self.cached(Instant::now()).await {
			return Ok(assets);
		}

		let assets = Arc::new(self.fetch_all(token).await?);
		let expires_at = Instant::now() + self.ttl;
		let snapshot = DirectorySnapshot { assets: assets.clone(), expires_at };

		*self.snapshot.write().await = Some(snapshot);

		Ok(assets)
	}

	async fn cached(&self, now: Instant) -> Option<Arc<Vec<Asset>>> {
		if self.ttl.is_zero() {
			return None;
		}

		self.snapshot
			.read()
			.await
			.as_ref()
			.filter(|snapshot| now < snapshot.expires_at)
			.map(|snapshot| snapshot.assets.clone())
	}

	async fn fetch_all(&self, token: &str) -> Result<Vec<Asset>> {
		let mut assets = Vec::new();
		let mut page = 1;

		loop {
			let chunk = self
				.upstream
				.search_assets(token, page, self.page_size, &self.support_group)
				.await?;
			let len = chunk.len();

			tracing::debug!(page, len, "fetched asset page");

			assets.extend(chunk);

			// An empty or short page marks the end of the listing.
			if len < self.page_size as usize {
				break;
			}

			page += 1;
		}

		tracing::info!(count = assets.len(), pages = page, "asset directory loaded");

		Ok(assets)
	}
}

#[derive(Debug)]
struct DirectorySnapshot {
	assets: Arc<Vec<Asset>>,
	expires_at: Instant,
}
