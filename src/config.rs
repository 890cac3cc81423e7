//! Environment-driven configuration for both service tiers.

// std
use std::{net::SocketAddr, str::FromStr};
// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	auth::state::UpstreamCredentials,
	cache::store::CacheStore,
	directory::{DEFAULT_PAGE_SIZE, DEFAULT_SUPPORT_GROUP},
	gateway::DEFAULT_GATEWAY_TTL,
	upstream::client::DEFAULT_UPSTREAM_TIMEOUT,
};

/// Redis key namespace of the backend tier.
pub const BACKEND_NAMESPACE: &str = "vmwatch-backend";
/// Redis key namespace of the gateway tier.
pub const GATEWAY_NAMESPACE: &str = "vmwatch-gateway";

/// Backend tier settings.
#[derive(Clone, Debug)]
pub struct BackendConfig {
	/// Listen address.
	pub bind: SocketAddr,
	/// Base URL shared by the identity provider and the monitoring API.
	pub upstream_base_url: Url,
	/// Login identity.
	pub credentials: UpstreamCredentials,
	/// Accept self-signed upstream certificates.
	pub accept_invalid_certs: bool,
	/// Bound applied to every upstream call.
	pub upstream_timeout: Duration,
	/// Asset directory snapshot TTL; zero disables it.
	pub directory_ttl: Duration,
	/// Raw status layer TTL.
	pub status_ttl: Duration,
	/// Machine detail layer TTL.
	pub machine_ttl: Duration,
	/// Asset search page size.
	pub page_size: u32,
	/// `l2Support` value the asset search is filtered on.
	pub support_group: String,
	/// Redis connection URL; the in-process store is used when unset.
	pub redis_url: Option<String>,
}
impl BackendConfig {
	/// Load from the process environment, reading a `.env` file first when one exists.
	pub fn from_env() -> Result<Self> {
		let _ = dotenvy::dotenv();

		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Load through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let vars = Vars(lookup);
		let page_size = vars.parse("ASSET_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;

		if page_size == 0 {
			return Err(Error::Validation {
				field: "ASSET_PAGE_SIZE",
				reason: "Must be greater than zero.".into(),
			});
		}

		let config = Self {
			bind: vars.parse("BACKEND_BIND", SocketAddr::from(([0, 0, 0, 0], 5001)))?,
			upstream_base_url: vars.required("UPSTREAM_BASE_URL")?,
			credentials: UpstreamCredentials {
				user: vars.required("UPSTREAM_USER")?,
				password: vars.required("UPSTREAM_PASSWORD")?,
			},
			accept_invalid_certs: vars.parse("UPSTREAM_ACCEPT_INVALID_CERTS", false)?,
			upstream_timeout: vars.secs("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT)?,
			directory_ttl: vars.secs("DIRECTORY_TTL_SECS", Duration::ZERO)?,
			status_ttl: vars.secs("STATUS_TTL_SECS", Duration::from_secs(60))?,
			machine_ttl: vars.secs("MACHINE_TTL_SECS", Duration::from_secs(300))?,
			page_size,
			support_group: vars
				.get("SUPPORT_GROUP_FILTER")
				.unwrap_or_else(|| DEFAULT_SUPPORT_GROUP.into()),
			redis_url: vars.get("REDIS_URL"),
		};

		if config.upstream_timeout.is_zero() {
			return Err(Error::Validation {
				field: "UPSTREAM_TIMEOUT_SECS",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(config)
	}

	/// Cache store selected by `REDIS_URL`.
	pub fn cache_store(&self) -> Result<CacheStore> {
		build_store(self.redis_url.as_deref(), BACKEND_NAMESPACE)
	}
}

/// Gateway tier settings.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Listen address.
	pub bind: SocketAddr,
	/// Backend tier base URL.
	pub backend_url: Url,
	/// Aggregated response TTL; zero disables caching.
	pub cache_ttl: Duration,
	/// Bound applied to every backend call.
	pub timeout: Duration,
	/// Redis connection URL; the in-process store is used when unset.
	pub redis_url: Option<String>,
}
impl GatewayConfig {
	/// Load from the process environment, reading a `.env` file first when one exists.
	pub fn from_env() -> Result<Self> {
		let _ = dotenvy::dotenv();

		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Load through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let vars = Vars(lookup);
		let config = Self {
			bind: vars.parse("GATEWAY_BIND", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
			backend_url: vars.parse("BACKEND_URL", Url::parse("http://localhost:5001")?)?,
			cache_ttl: vars.secs("GATEWAY_CACHE_TTL_SECS", DEFAULT_GATEWAY_TTL)?,
			timeout: vars.secs("GATEWAY_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT)?,
			redis_url: vars.get("REDIS_URL"),
		};

		if config.timeout.is_zero() {
			return Err(Error::Validation {
				field: "GATEWAY_TIMEOUT_SECS",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(config)
	}

	/// Cache store selected by `REDIS_URL`.
	pub fn cache_store(&self) -> Result<CacheStore> {
		build_store(self.redis_url.as_deref(), GATEWAY_NAMESPACE)
	}
}

#[cfg(feature = "redis")]
fn build_store(redis_url: Option<&str>, namespace: &'static str) -> Result<CacheStore> {
	match redis_url {
		Some(url) => CacheStore::redis(url, namespace),
		None => Ok(CacheStore::memory()),
	}
}

#[cfg(not(feature = "redis"))]
fn build_store(redis_url: Option<&str>, _namespace: &'static str) -> Result<CacheStore> {
	if redis_url.is_some() {
		tracing::warn!(
			"REDIS_URL is set but the redis feature is disabled; using the in-process store"
		);
	}

	Ok(CacheStore::memory())
}

struct Vars<F>(F);
impl<F> Vars<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn get(&self, key: &str) -> Option<String> {
		(self.0)(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
	}

	fn required<T>(&self, key: &'static str) -> Result<T>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		let raw = self.get(key).ok_or_else(|| Error::Validation {
			field: key,
			reason: "Required variable is not set.".into(),
		})?;

		parse_value(key, &raw)
	}

	fn parse<T>(&self, key: &'static str, default: T) -> Result<T>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		match self.get(key) {
			Some(raw) => parse_value(key, &raw),
			None => Ok(default),
		}
	}

	fn secs(&self, key: &'static str, default: Duration) -> Result<Duration> {
		Ok(Duration::from_secs(self.parse(key, default.as_secs())?))
	}
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	raw.parse().map_err(|err| Error::Validation { field: key, reason: format!("{raw:?}: {err}.") })
}
