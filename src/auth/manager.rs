//! Single-flight credential manager for the upstream bearer token.

// crates.io
use tokio::{
	sync::Mutex,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::state::{Credential, CredentialSlot, CredentialStatus, UpstreamCredentials},
	metrics,
	upstream::client::UpstreamClient,
};

/// Lifetime stamped on every token; one minute under the upstream's fifteen.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(14 * 60);
/// Period of the background expiry check.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Keeps one bearer token valid across concurrent callers.
///
/// The token slot sits behind a single async mutex that is held for the whole renewal round-trip,
/// so callers arriving while a renewal is in flight wait for it and then reuse its token.
#[derive(Clone, Debug)]
pub struct CredentialManager {
	upstream: Arc<UpstreamClient>,
	credentials: Arc<UpstreamCredentials>,
	lifetime: Duration,
	refresh_interval: Duration,
	slot: Arc<Mutex<CredentialSlot>>,
}
impl CredentialManager {
	/// Build a manager with no token held.
	pub fn new(upstream: Arc<UpstreamClient>, credentials: UpstreamCredentials) -> Self {
		Self {
			upstream,
			credentials: Arc::new(credentials),
			lifetime: TOKEN_LIFETIME,
			refresh_interval: REFRESH_INTERVAL,
			slot: Arc::new(Mutex::new(CredentialSlot::default())),
		}
	}

	/// Override the lifetime stamped on new tokens (primarily for tests).
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Override the background check period (primarily for tests).
	pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = interval;

		self
	}

	/// Current credential status for health reporting.
	pub async fn status(&self) -> CredentialStatus {
		self.slot.lock().await.status()
	}

	/// Return a valid token, renewing it first when none is held or it has expired.
	#[tracing::instrument(skip(self))]
	pub async fn get_token(&self) -> Result<Arc<str>> {
		let mut slot = self.slot.lock().await;

		if let Some(token) = slot.usable(Instant::now()) {
			return Ok(token);
		}

		self.renew(&mut slot).await
	}

	/// Renew the token if it is missing or expired; a valid token is left untouched.
	pub async fn refresh_if_expired(&self) -> Result<()> {
		let mut slot = self.slot.lock().await;

		if slot.usable(Instant::now()).is_none() {
			self.renew(&mut slot).await?;
		}

		Ok(())
	}

	/// Attempt an initial login, then start the background refresher.
	///
	/// A failed login is logged and otherwise ignored; the next [`get_token`](Self::get_token)
	/// call retries it.
	pub async fn startup(&self) -> JoinHandle<()> {
		{
			let mut slot = self.slot.lock().await;

			if let Err(err) = self.login(&mut slot).await {
				tracing::warn!(error = %err, "initial login failed; will retry on demand");
			}
		}

		self.spawn_refresher()
	}

	/// Spawn the periodic expiry check. The task runs until the runtime shuts down.
	pub fn spawn_refresher(&self) -> JoinHandle<()> {
		let manager = self.clone();

		tokio::spawn(async move {
			let interval = manager.refresh_interval;
			let mut ticker = time::interval_at(Instant::now() + interval, interval);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				if let Err(err) = manager.refresh_if_expired().await {
					tracing::warn!(error = %err, "background credential refresh failed");
				}
			}
		})
	}

	// Caller holds the slot lock.
	async fn renew(&self, slot: &mut CredentialSlot) -> Result<Arc<str>> {
		if let Some(current) = slot.current().map(|c| c.token.clone()) {
			match self.upstream.refresh(&current).await {
				Ok(token) => {
					metrics::record_credential_renewal("refresh", true);
					tracing::info!("upstream token refreshed");

					return Ok(self.install(slot, token));
				},
				Err(err) => {
					metrics::record_credential_renewal("refresh", false);
					tracing::warn!(error = %err, "token refresh failed; falling back to login");
				},
			}
		}

		self.login(slot).await
	}

	async fn login(&self, slot: &mut CredentialSlot) -> Result<Arc<str>> {
		match self.upstream.login(&self.credentials.user, &self.credentials.password).await {
			Ok(token) => {
				metrics::record_credential_renewal("login", true);
				tracing::info!(user = %self.credentials.user, "upstream login succeeded");

				Ok(self.install(slot, token))
			},
			Err(err) => {
				metrics::record_credential_renewal("login", false);
				slot.clear();

				Err(Error::Auth { reason: format!("Login failed: {err}") })
			},
		}
	}

	fn install(&self, slot: &mut CredentialSlot, token: String) -> Arc<str> {
		let credential = Credential::issue(token, self.lifetime);
		let token = credential.token.clone();

		slot.install(credential);

		token
	}
}
