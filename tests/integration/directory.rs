//! Asset directory pagination and snapshot caching.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use serde_json::{Value, json};
use vmwatch::{AssetDirectory, Error, Result};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_partial_json, header, method, path},
};
// self
use crate::support;

fn page(start: usize, len: usize) -> Value {
	let assets: Vec<Value> = (start..start + len)
		.map(|i| support::asset_json(&format!("a-{i}"), &format!("vm-{i:03}"), "ACME"))
		.collect();

	json!({ "data": assets })
}

async fn mount_page(server: &MockServer, number: u32, body: Value, expected: u64) {
	Mock::given(method("POST"))
		.and(path("/api/v1/assets/search"))
		.and(header("authorization", "Bearer t-1"))
		.and(body_partial_json(json!({ "pagination": { "page": number, "perPage": 100 } })))
		.respond_with(ResponseTemplate::new(200).set_body_json(body))
		.expect(expected)
		.mount(server)
		.await;
}

#[tokio::test]
async fn short_page_ends_pagination() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_page(&server, 1, page(0, 100), 1).await;
	mount_page(&server, 2, page(100, 100), 1).await;
	mount_page(&server, 3, page(200, 37), 1).await;
	mount_page(&server, 4, page(237, 1), 0).await;

	let directory = AssetDirectory::new(support::upstream(&server), Duration::ZERO);
	let assets = directory.list("t-1").await?;

	assert_eq!(assets.len(), 237);
	assert_eq!(assets[0].asset_name, "vm-000");
	assert_eq!(assets[236].asset_name, "vm-236");

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn empty_page_ends_pagination() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_page(&server, 1, page(0, 100), 1).await;
	mount_page(&server, 2, json!({ "data": [] }), 1).await;

	let directory = AssetDirectory::new(support::upstream(&server), Duration::ZERO);

	assert_eq!(directory.list("t-1").await?.len(), 100);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn search_body_carries_support_group_filter() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/api/v1/assets/search"))
		.and(body_partial_json(json!({
			"pagination": { "page": 1, "perPage": 25 },
			"filtering": [{ "property": "l2Support", "rule": "eq", "value": "OPS" }],
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(page(0, 3)))
		.expect(1)
		.mount(&server)
		.await;

	let directory = AssetDirectory::new(support::upstream(&server), Duration::ZERO)
		.with_page_size(25)?
		.with_support_group("OPS");

	assert_eq!(directory.list("t-1").await?.len(), 3);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn snapshot_is_reused_within_ttl_and_zero_ttl_refetches() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_page(&server, 1, page(0, 5), 3).await;

	let upstream = support::upstream(&server);
	let cached = AssetDirectory::new(upstream.clone(), Duration::from_secs(60));
	let first = cached.list("t-1").await?;
	let second = cached.list("t-1").await?;

	assert!(Arc::ptr_eq(&first, &second));

	let uncached = AssetDirectory::new(upstream, Duration::ZERO);

	uncached.list("t-1").await?;
	uncached.list("t-1").await?;

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn failed_page_fails_whole_listing_and_caches_nothing() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_page(&server, 1, page(0, 100), 2).await;

	Mock::given(method("POST"))
		.and(path("/api/v1/assets/search"))
		.and(body_partial_json(json!({ "pagination": { "page": 2 } })))
		.respond_with(ResponseTemplate::new(500))
		.expect(2)
		.mount(&server)
		.await;

	let directory = AssetDirectory::new(support::upstream(&server), Duration::from_secs(60));

	for _ in 0..2 {
		let err = directory.list("t-1").await.expect_err("page 2 fails");

		assert!(matches!(err, Error::UpstreamStatus { .. }), "unexpected error: {err:?}");
	}

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
	let server = MockServer::start().await;
	let err = AssetDirectory::new(support::upstream(&server), Duration::ZERO)
		.with_page_size(0)
		.expect_err("zero page size");

	assert!(matches!(err, Error::Validation { field: "page_size", .. }));
}
