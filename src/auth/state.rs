//! Credential lifecycle states.

// std
use std::fmt;
// crates.io
use serde::Serialize;
// self
use crate::_prelude::*;

/// Login identity presented to the upstream identity provider.
#[derive(Clone)]
pub struct UpstreamCredentials {
	/// Upstream user id.
	pub user: String,
	/// Upstream password; never logged.
	pub password: String,
}
impl fmt::Debug for UpstreamCredentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UpstreamCredentials")
			.field("user", &self.user)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Bearer token and its validity window.
#[derive(Clone, Debug)]
pub struct Credential {
	/// Opaque access token.
	pub token: Arc<str>,
	/// UTC timestamp when the token was obtained.
	pub issued_at: DateTime<Utc>,
	/// Monotonic deadline after which the token must be renewed before use.
	pub expires_at: Instant,
}
impl Credential {
	/// Stamp a freshly issued token.
	pub fn issue(token: impl Into<Arc<str>>, lifetime: Duration) -> Self {
		Self { token: token.into(), issued_at: Utc::now(), expires_at: Instant::now() + lifetime }
	}

	/// Whether the token is past its deadline at `now`.
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}
}

/// Credential lifecycle states as reported to operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CredentialState {
	/// No token has been obtained yet, or the last renewal discarded it.
	NoToken,
	/// A token is held and within its lifetime.
	Valid,
	/// A token is held but must be renewed before the next use.
	Expired,
}

/// Slot guarded by the credential manager's single-flight lock.
#[derive(Clone, Debug, Default)]
pub struct CredentialSlot {
	current: Option<Credential>,
}
impl CredentialSlot {
	/// Current credential, expired or not.
	pub fn current(&self) -> Option<&Credential> {
		self.current.as_ref()
	}

	/// Token usable at `now`, if any.
	pub fn usable(&self, now: Instant) -> Option<Arc<str>> {
		self.current.as_ref().filter(|c| !c.is_expired(now)).map(|c| c.token.clone())
	}

	/// Install a freshly issued credential.
	pub fn install(&mut self, credential: Credential) {
		self.current = Some(credential);
	}

	/// Discard the held credential.
	pub fn clear(&mut self) {
		self.current = None;
	}

	/// Lifecycle state at `now`.
	pub fn state(&self, now: Instant) -> CredentialState {
		match &self.current {
			None => CredentialState::NoToken,
			Some(c) if c.is_expired(now) => CredentialState::Expired,
			Some(_) => CredentialState::Valid,
		}
	}

	/// Point-in-time status with wall-clock timestamps.
	pub fn status(&self) -> CredentialStatus {
		let now = Instant::now();
		let wallclock = Utc::now();

		CredentialStatus {
			state: self.state(now),
			issued_at: self.current.as_ref().map(|c| c.issued_at),
			expires_at: self
				.current
				.as_ref()
				.and_then(|c| to_datetime(now, wallclock, c.expires_at)),
		}
	}
}

/// Serializable credential status for the health endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
	/// Lifecycle state.
	pub state: CredentialState,
	/// When the held token was obtained.
	pub issued_at: Option<DateTime<Utc>>,
	/// When the held token stops being used.
	pub expires_at: Option<DateTime<Utc>>,
}

// Map a monotonic instant onto the wall clock using a paired capture.
fn to_datetime(
	captured_at: Instant,
	captured_at_wallclock: DateTime<Utc>,
	instant: Instant,
) -> Option<DateTime<Utc>> {
	if let Some(delta) = instant.checked_duration_since(captured_at) {
		captured_at_wallclock.checked_add_signed(TimeDelta::from_std(delta).ok()?)
	} else {
		let delta = captured_at.checked_duration_since(instant)?;

		captured_at_wallclock.checked_sub_signed(TimeDelta::from_std(delta).ok()?)
	}
}
