//! Credential manager behaviour against a mocked identity provider.

// std
use std::time::Duration;
// crates.io
use tokio::task::JoinSet;
use vmwatch::{CredentialState, Error, Result};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path},
};
// self
use crate::support;

#[tokio::test]
async fn concurrent_callers_share_one_login() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/api/auth/login"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(support::token_body("t-1"))
				.set_delay(Duration::from_millis(200)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server));
	let mut callers = JoinSet::new();

	for _ in 0..20 {
		let manager = manager.clone();

		callers.spawn(async move { manager.get_token().await });
	}

	while let Some(joined) = callers.join_next().await {
		let token = joined.expect("caller task")?;

		assert_eq!(&*token, "t-1");
	}

	assert_eq!(manager.status().await.state, CredentialState::Valid);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn expired_token_is_refreshed_once_for_concurrent_callers() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;

	Mock::given(method("POST"))
		.and(path("/api/auth/refresh"))
		.and(header("authorization", "Bearer t-1"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(support::token_body("t-2"))
				.set_delay(Duration::from_millis(100)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server))
		.with_lifetime(Duration::from_millis(300));

	assert_eq!(&*manager.get_token().await?, "t-1");

	tokio::time::sleep(Duration::from_millis(400)).await;

	assert_eq!(manager.status().await.state, CredentialState::Expired);

	let mut callers = JoinSet::new();

	for _ in 0..10 {
		let manager = manager.clone();

		callers.spawn(async move { manager.get_token().await });
	}

	while let Some(joined) = callers.join_next().await {
		assert_eq!(&*joined.expect("caller task")?, "t-2");
	}

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn failed_refresh_falls_back_to_login() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-login", 2).await;

	Mock::given(method("POST"))
		.and(path("/api/auth/refresh"))
		.respond_with(ResponseTemplate::new(401))
		.expect(1)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server))
		.with_lifetime(Duration::from_millis(200));

	manager.get_token().await?;
	tokio::time::sleep(Duration::from_millis(300)).await;

	assert_eq!(&*manager.get_token().await?, "t-login");
	assert_eq!(manager.status().await.state, CredentialState::Valid);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn login_failure_surfaces_as_auth_error_and_startup_survives() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/api/auth/login"))
		.respond_with(ResponseTemplate::new(403).set_body_string("locked"))
		.expect(2)
		.mount(&server)
		.await;
	// Nothing is held, so a refresh must never be attempted.
	Mock::given(method("POST"))
		.and(path("/api/auth/refresh"))
		.respond_with(ResponseTemplate::new(500))
		.expect(0)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server));
	let refresher = manager.startup().await;

	assert_eq!(manager.status().await.state, CredentialState::NoToken);

	let err = manager.get_token().await.expect_err("login is rejected");

	assert!(matches!(err, Error::Auth { .. }), "unexpected error: {err:?}");
	assert_eq!(err.status_code(), http::StatusCode::BAD_GATEWAY);

	refresher.abort();
	server.verify().await;
}

#[tokio::test]
async fn background_refresher_renews_expired_token() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;

	Mock::given(method("POST"))
		.and(path("/api/auth/refresh"))
		.respond_with(ResponseTemplate::new(200).set_body_json(support::token_body("t-2")))
		.expect(1..)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server))
		.with_lifetime(Duration::from_millis(200))
		.with_refresh_interval(Duration::from_millis(300));
	let refresher = manager.startup().await;

	assert_eq!(manager.status().await.state, CredentialState::Valid);

	tokio::time::sleep(Duration::from_millis(380)).await;

	let status = manager.status().await;

	assert_eq!(status.state, CredentialState::Valid);
	assert!(status.issued_at.is_some());

	refresher.abort();
	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn valid_token_is_left_alone() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;

	Mock::given(method("POST"))
		.and(path("/api/auth/refresh"))
		.respond_with(ResponseTemplate::new(200).set_body_json(support::token_body("t-2")))
		.expect(0)
		.mount(&server)
		.await;

	let manager = support::credentials(support::upstream(&server));

	manager.get_token().await?;
	manager.refresh_if_expired().await?;

	assert_eq!(&*manager.get_token().await?, "t-1");

	server.verify().await;
	Ok(())
}
