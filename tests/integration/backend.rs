//! Backend read-through behaviour: directory, machine and status layers, HTTP surface.

// std
use std::time::Duration;
// crates.io
use serde_json::{Value, json};
use vmwatch::{CredentialState, Error, LayerKind, Result, ServiceStatus, server};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::support;

const HOUR: Duration = Duration::from_secs(3600);

async fn mount_assets(server: &MockServer, expected: u64) {
	let body = json!({
		"data": [
			support::asset_json("a-1", "vm-01", "ACME Industries"),
			support::asset_json("a-2", "vm-02", "Globex"),
			support::asset_json("a-3", "vm-03", "acme labs"),
		]
	});

	Mock::given(method("POST"))
		.and(path("/api/v1/assets/search"))
		.respond_with(ResponseTemplate::new(200).set_body_json(body))
		.expect(expected)
		.mount(server)
		.await;
}

fn status_body() -> Value {
	json!({
		"data": [
			{
				"status": "ok",
				"description": "ping",
				"objectClass": "ICMP",
				"lastChange": "2024-05-01T10:00:00Z",
			},
			{ "status": "WARN", "description": "disk /var", "severity": "minor" },
			{ "status": "", "instance": { "instanceName": "agent" } },
		]
	})
}

async fn mount_status(
	server: &MockServer,
	asset_id: &str,
	template: ResponseTemplate,
	expected: u64,
) {
	Mock::given(method("GET"))
		.and(path(format!("/api/v1/assets/{asset_id}/status")))
		.respond_with(template)
		.expect(expected)
		.mount(server)
		.await;
}

#[tokio::test]
async fn machine_detail_is_idempotent_within_ttl() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 1).await;
	mount_status(&server, "a-1", ResponseTemplate::new(200).set_body_json(status_body()), 1).await;

	let service = support::service(&server, HOUR, HOUR, HOUR);
	let first = service.machine_detail("vm-01").await?;
	let second = service.machine_detail("vm-01").await?;

	assert_eq!(serde_json::to_vec(&first)?, serde_json::to_vec(&second)?);
	assert_eq!(first.machine, "vm-01");
	assert_eq!(first.customer_name.as_deref(), Some("ACME Industries"));
	assert_eq!(first.summary.global_status, ServiceStatus::Warning);
	assert_eq!(first.summary.monitored_services["ping"], ServiceStatus::Ok);
	assert_eq!(first.summary.monitored_services["disk /var"], ServiceStatus::Warning);
	assert_eq!(first.summary.monitored_services["agent"], ServiceStatus::Unknown);
	assert_eq!(first.monitoring_details.len(), 3);
	assert_eq!(first.monitoring_details[1].status, "Warn");
	assert_eq!(first.monitoring_details[2].last_change, "Never");

	let health = service.health().await;
	let machine =
		health.layers.iter().find(|l| l.layer == LayerKind::Machine).expect("machine layer");

	assert_eq!(machine.metrics.lookups, 2);
	assert_eq!(machine.metrics.hits, 1);
	assert!((machine.hit_rate - 0.5).abs() < f64::EPSILON);
	assert_eq!(health.credentials.state, CredentialState::Valid);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn status_layer_answers_when_machine_layer_is_disabled() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 2).await;
	mount_status(&server, "a-3", ResponseTemplate::new(200).set_body_json(status_body()), 1).await;

	let service = support::service(&server, Duration::ZERO, Duration::ZERO, HOUR);
	let first = service.machine_detail("vm-03").await?;
	let second = service.machine_detail("vm-03").await?;

	assert_eq!(first, second);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn unknown_machine_is_not_found() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 1).await;
	mount_status(&server, "a-1", ResponseTemplate::new(200).set_body_json(status_body()), 0).await;

	let service = support::service(&server, HOUR, HOUR, HOUR);
	let err = service.machine_detail("vm-99").await.expect_err("unknown machine");

	assert!(matches!(err, Error::NotFound { .. }), "unexpected error: {err:?}");

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn upstream_status_failure_is_reported_and_not_cached() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 1).await;
	mount_status(&server, "a-2", ResponseTemplate::new(503).set_body_string("maintenance"), 2)
		.await;

	let service = support::service(&server, HOUR, HOUR, HOUR);

	for _ in 0..2 {
		match service.machine_detail("vm-02").await {
			Err(Error::UpstreamStatus { status, body, .. }) => {
				assert_eq!(status.as_u16(), 503);
				assert_eq!(body.as_deref(), Some("maintenance"));
			},
			other => panic!("expected upstream error, got {other:?}"),
		}
	}

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn asset_listing_filters_by_customer_substring() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 1).await;

	let service = support::service(&server, HOUR, HOUR, HOUR);
	let acme = service.list_assets(Some("ACME")).await?;
	let everyone = service.list_assets(None).await?;
	let blank = service.list_assets(Some("")).await?;

	assert_eq!(acme.iter().map(|a| a.asset_name.as_str()).collect::<Vec<_>>(), ["vm-01", "vm-03"]);
	assert_eq!(everyone.len(), 3);
	assert_eq!(blank.len(), 3);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn http_surface_maps_outcomes_to_status_codes() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	support::mount_login(&server, "t-1", 1).await;
	mount_assets(&server, 1).await;
	mount_status(&server, "a-1", ResponseTemplate::new(200).set_body_json(status_body()), 1).await;
	mount_status(&server, "a-2", ResponseTemplate::new(404), 1).await;

	let service = support::service(&server, HOUR, HOUR, HOUR);
	let base = support::spawn(server::backend::router(service)).await;
	let http = reqwest::Client::new();

	let assets: Value = http
		.get(base.join("/assets?client=globex")?)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	assert_eq!(assets["data"].as_array().map(Vec::len), Some(1));
	assert_eq!(assets["data"][0]["assetName"], "vm-02");

	let detail_url = base.join("/machine/vm-01")?;
	let first = http.get(detail_url.clone()).send().await?.error_for_status()?.bytes().await?;
	let second = http.get(detail_url).send().await?.error_for_status()?.bytes().await?;

	assert_eq!(first, second);

	let detail: Value = serde_json::from_slice(&first)?;

	assert_eq!(detail["global_status"], "Warning");
	assert_eq!(detail["L2Support"], "ATQIHF");

	let missing = http.get(base.join("/machine/vm-99")?).send().await?;

	assert_eq!(missing.status().as_u16(), 404);

	let body: Value = missing.json().await?;

	assert_eq!(body["error"]["code"], "NOT_FOUND");

	let upstream = http.get(base.join("/machine/vm-02")?).send().await?;

	assert_eq!(upstream.status().as_u16(), 502);

	let health: Value = http.get(base.join("/health")?).send().await?.json().await?;

	assert_eq!(health["credentials"]["state"], "Valid");
	assert_eq!(health["store"], "memory");
	assert_eq!(health["layers"][0]["layer"], "machine");

	server.verify().await;
	Ok(())
}
