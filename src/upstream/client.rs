//! HTTP client for the identity provider and the monitoring API.

// crates.io
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;
// self
use crate::{
	_prelude::*,
	metrics,
	model::{Asset, DataEnvelope, RawStatusRecord},
};

/// Default bound applied to every upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

const LOGIN_PATH: &[&str] = &["api", "auth", "login"];
const REFRESH_PATH: &[&str] = &["api", "auth", "refresh"];
const ASSET_SEARCH_PATH: &[&str] = &["api", "v1", "assets", "search"];

/// Client for the upstream identity and monitoring endpoints, which share one base URL.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
	client: Client,
	base_url: Url,
	timeout: Duration,
}
impl UpstreamClient {
	/// Build a client with its own connection pool.
	pub fn new(base_url: Url, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
		let client = Client::builder()
			.user_agent(format!("vmwatch/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.danger_accept_invalid_certs(accept_invalid_certs)
			.build()?;

		Self::with_client(base_url, client, timeout)
	}

	/// Build a client around the supplied reqwest client (primarily for tests).
	pub fn with_client(base_url: Url, client: Client, timeout: Duration) -> Result<Self> {
		if base_url.cannot_be_a_base() {
			return Err(Error::Validation {
				field: "upstream_base_url",
				reason: format!("{base_url} cannot be used as a base URL."),
			});
		}

		Ok(Self { client, base_url, timeout })
	}

	/// Full login with form-encoded credentials; returns the access token.
	#[tracing::instrument(skip_all)]
	pub async fn login(&self, user: &str, password: &str) -> Result<String> {
		let url = self.endpoint(LOGIN_PATH);
		let form = LoginForm { user_id: user, password };
		let response: TokenResponse =
			self.send("login", self.client.post(url.clone()).form(&form), url).await?;

		Ok(response.access_token)
	}

	/// Lightweight refresh using the current bearer token; returns the new access token.
	#[tracing::instrument(skip_all)]
	pub async fn refresh(&self, token: &str) -> Result<String> {
		let url = self.endpoint(REFRESH_PATH);
		let response: TokenResponse =
			self.send("refresh", self.client.post(url.clone()).bearer_auth(token), url).await?;

		Ok(response.access_token)
	}

	/// Fetch one page of assets whose `l2Support` equals `support_group`.
	#[tracing::instrument(skip(self, token))]
	pub async fn search_assets(
		&self,
		token: &str,
		page: u32,
		per_page: u32,
		support_group: &str,
	) -> Result<Vec<Asset>> {
		let url = self.endpoint(ASSET_SEARCH_PATH);
		let body = AssetSearch {
			pagination: Pagination { page, per_page },
			filtering: [Filter { property: "l2Support", rule: "eq", value: support_group }],
		};
		let envelope: DataEnvelope<Asset> = self
			.send("asset_search", self.client.post(url.clone()).bearer_auth(token).json(&body), url)
			.await?;

		Ok(envelope.data)
	}

	/// Fetch the raw monitored-service records of one asset.
	#[tracing::instrument(skip(self, token))]
	pub async fn asset_status(&self, token: &str, asset_id: &str) -> Result<Vec<RawStatusRecord>> {
		let url = self.endpoint(&["api", "v1", "assets", asset_id, "status"]);
		let envelope: DataEnvelope<RawStatusRecord> =
			self.send("asset_status", self.client.get(url.clone()).bearer_auth(token), url).await?;

		Ok(envelope.data)
	}

	fn endpoint(&self, segments: &[&str]) -> Url {
		let mut url = self.base_url.clone();

		// Checked in the constructor.
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		url
	}

	async fn send<T>(&self, endpoint: &'static str, builder: RequestBuilder, url: Url) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let start = Instant::now();
		let outcome = execute(builder.timeout(self.timeout), url).await;
		let elapsed = start.elapsed();

		metrics::record_upstream_request(endpoint, outcome.is_ok(), elapsed);

		match &outcome {
			Ok(_) => tracing::debug!(endpoint, elapsed = ?elapsed, "upstream call complete"),
			Err(err) => {
				tracing::debug!(endpoint, elapsed = ?elapsed, error = %err, "upstream call failed")
			},
		}

		outcome
	}
}

async fn execute<T>(builder: RequestBuilder, url: Url) -> Result<T>
where
	T: DeserializeOwned,
{
	let response = builder.send().await?;
	let status = response.status();

	if !status.is_success() {
		let body = response.text().await.ok().filter(|body| !body.is_empty());

		return Err(Error::UpstreamStatus { status, url, body });
	}

	let bytes = response.bytes().await?;

	Ok(serde_json::from_slice(&bytes)?)
}

/// Whether an error is a 404 from a remote tier.
pub fn is_not_found(err: &Error) -> bool {
	matches!(err, Error::UpstreamStatus { status, .. } if *status == StatusCode::NOT_FOUND)
}

#[derive(Serialize)]
struct LoginForm<'a> {
	#[serde(rename = "userId")]
	user_id: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
	access_token: String,
}

#[derive(Serialize)]
struct AssetSearch<'a> {
	pagination: Pagination,
	filtering: [Filter<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
	page: u32,
	per_page: u32,
}

#[derive(Serialize)]
struct Filter<'a> {
	property: &'static str,
	rule: &'static str,
	value: &'a str,
}
