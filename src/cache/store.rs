//! Keyed get / set-with-TTL stores holding JSON-serialized values.
//!
//! Every write replaces the whole value, so concurrent writers can race but never interleave. A
//! zero TTL disables the store for that write: nothing is kept, and a subsequent `get` misses.

// std
use std::collections::HashMap;
// crates.io
#[cfg(feature = "redis")] use redis::AsyncCommands;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
// self
use crate::_prelude::*;

/// Cache store backend shared by the cache layers of one process.
#[derive(Clone, Debug)]
pub enum CacheStore {
	/// Process-local map.
	Memory(MemoryStore),
	/// Shared Redis instance.
	#[cfg(feature = "redis")]
	Redis(RedisStore),
}
impl CacheStore {
	/// Fresh process-local store.
	pub fn memory() -> Self {
		Self::Memory(MemoryStore::default())
	}

	#[cfg(feature = "redis")]
	/// Redis-backed store; every key is prefixed with `namespace`.
	pub fn redis(url: &str, namespace: impl Into<Arc<str>>) -> Result<Self> {
		let client = redis::Client::open(url)?;

		Ok(Self::Redis(RedisStore::new(client, namespace)))
	}

	/// Short backend name for logs.
	pub fn backend(&self) -> &'static str {
		match self {
			Self::Memory(_) => "memory",
			#[cfg(feature = "redis")]
			Self::Redis(_) => "redis",
		}
	}

	/// Fetch the raw value stored under `key`, if present and unexpired.
	pub async fn get(&self, key: &str) -> Result<Option<String>> {
		match self {
			Self::Memory(store) => Ok(store.get(key).await),
			#[cfg(feature = "redis")]
			Self::Redis(store) => store.get(key).await,
		}
	}

	/// Replace the value under `key`, expiring after `ttl`.
	pub async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		if ttl.is_zero() {
			return Ok(());
		}

		match self {
			Self::Memory(store) => {
				store.set(key, value, ttl).await;

				Ok(())
			},
			#[cfg(feature = "redis")]
			Self::Redis(store) => store.set(key, value, ttl).await,
		}
	}

	/// Typed read; a stored value that no longer decodes is reported as an error.
	pub async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		match self.get(key).await? {
			Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
			None => Ok(None),
		}
	}

	/// Typed write.
	pub async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
	where
		T: Serialize,
	{
		if ttl.is_zero() {
			return Ok(());
		}

		self.set_with_ttl(key, serde_json::to_string(value)?, ttl).await
	}
}
impl Default for CacheStore {
	fn default() -> Self {
		Self::memory()
	}
}

/// In-process TTL map. Expired entries are evicted on read and swept on every write.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}
impl MemoryStore {
	/// Fetch an unexpired value.
	pub async fn get(&self, key: &str) -> Option<String> {
		let now = Instant::now();

		{
			let entries = self.entries.read().await;

			match entries.get(key) {
				Some(stored) if now < stored.expires_at => return Some(stored.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut entries = self.entries.write().await;

		if entries.get(key).is_some_and(|stored| now >= stored.expires_at) {
			entries.remove(key);
		}

		None
	}

	/// Store a value; a zero TTL stores nothing.
	///
	/// Every write also drops entries that have expired, so keys that are never read again do not
	/// accumulate.
	pub async fn set(&self, key: &str, value: String, ttl: Duration) {
		if ttl.is_zero() {
			return;
		}

		let now = Instant::now();
		let mut entries = self.entries.write().await;

		entries.retain(|_, stored| now < stored.expires_at);
		entries.insert(key.to_owned(), StoredValue { value, expires_at: now + ttl });
	}

	/// Number of entries currently held, expired or not.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	/// Whether the store holds no entries.
	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[derive(Clone, Debug)]
struct StoredValue {
	value: String,
	expires_at: Instant,
}

#[cfg(feature = "redis")]
/// Redis store using `GET` / `SETEX` under a key namespace.
#[derive(Clone, Debug)]
pub struct RedisStore {
	client: redis::Client,
	namespace: Arc<str>,
}
#[cfg(feature = "redis")]
impl RedisStore {
	/// Wrap a client; keys are stored as `<namespace>:<key>`.
	pub fn new(client: redis::Client, namespace: impl Into<Arc<str>>) -> Self {
		Self { client, namespace: namespace.into() }
	}

	async fn get(&self, key: &str) -> Result<Option<String>> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;
		let value: Option<String> = conn.get(self.key(key)).await?;

		Ok(value)
	}

	async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;
		// SETEX has second granularity; round sub-second TTLs up rather than to zero.
		let ttl_secs = ttl.as_secs().max(1);

		conn.set_ex::<_, _, ()>(self.key(key), value, ttl_secs).await?;

		Ok(())
	}

	fn key(&self, key: &str) -> String {
		format!("{}:{key}", self.namespace)
	}
}
