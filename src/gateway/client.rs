//! HTTP client the gateway uses to reach the backend tier.

// crates.io
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;
// self
use crate::{
	_prelude::*,
	model::{Asset, DataEnvelope, MachineDetail},
	upstream::client::is_not_found,
};

/// Backend tier client.
#[derive(Clone, Debug)]
pub struct BackendClient {
	client: Client,
	base_url: Url,
	timeout: Duration,
}
impl BackendClient {
	/// Build a client with its own connection pool.
	pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.user_agent(format!("vmwatch-gateway/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Self::with_client(base_url, client, timeout)
	}

	/// Build a client around the supplied reqwest client (primarily for tests).
	pub fn with_client(base_url: Url, client: Client, timeout: Duration) -> Result<Self> {
		if base_url.cannot_be_a_base() {
			return Err(Error::Validation {
				field: "backend_url",
				reason: format!("{base_url} cannot be used as a base URL."),
			});
		}

		Ok(Self { client, base_url, timeout })
	}

	/// Assets whose customer name contains `client`.
	pub async fn assets(&self, client: &str) -> Result<Vec<Asset>> {
		let mut url = self.endpoint(&["assets"]);

		url.query_pairs_mut().append_pair("client", client);

		let envelope: DataEnvelope<Asset> = self.get(url).await?;

		Ok(envelope.data)
	}

	/// Machine detail by asset name; a backend 404 becomes [`Error::NotFound`].
	pub async fn machine(&self, name: &str) -> Result<MachineDetail> {
		self.get(self.endpoint(&["machine", name])).await.map_err(|err| {
			if is_not_found(&err) { Error::not_found(format!("Machine {name}")) } else { err }
		})
	}

	fn endpoint(&self, segments: &[&str]) -> Url {
		let mut url = self.base_url.clone();

		// Checked in the constructor.
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		url
	}

	async fn get<T>(&self, url: Url) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.client.get(url.clone()).timeout(self.timeout).send().await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.ok().filter(|body| !body.is_empty());

			return Err(Error::UpstreamStatus { status, url, body });
		}

		let bytes = response.bytes().await?;

		Ok(serde_json::from_slice(&bytes)?)
	}
}
