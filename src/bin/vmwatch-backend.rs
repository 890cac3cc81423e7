//! Backend tier: authenticates upstream, paginates assets, serves normalized machine details.

// std
use std::sync::Arc;
// crates.io
use tokio::net::TcpListener;
// self
use vmwatch::{
	AssetDirectory, BackendConfig, CredentialManager, MachineService, Result, UpstreamClient,
	server,
};

#[tokio::main]
async fn main() -> Result<()> {
	server::init_tracing();

	#[cfg(feature = "prometheus")]
	vmwatch::metrics::install_default_exporter()?;

	let config = BackendConfig::from_env()?;
	let upstream = Arc::new(UpstreamClient::new(
		config.upstream_base_url.clone(),
		config.upstream_timeout,
		config.accept_invalid_certs,
	)?);
	let credentials = CredentialManager::new(upstream.clone(), config.credentials.clone());
	let directory = AssetDirectory::new(upstream.clone(), config.directory_ttl)
		.with_page_size(config.page_size)?
		.with_support_group(config.support_group.clone());
	let store = config.cache_store()?;

	tracing::info!(
		upstream = %config.upstream_base_url,
		store = store.backend(),
		directory_ttl = ?config.directory_ttl,
		status_ttl = ?config.status_ttl,
		machine_ttl = ?config.machine_ttl,
		"starting backend"
	);

	let _refresher = credentials.startup().await;
	let service = MachineService::new(
		credentials,
		upstream,
		Arc::new(directory),
		store,
		config.machine_ttl,
		config.status_ttl,
	);
	let listener = TcpListener::bind(config.bind).await?;

	server::serve(listener, server::backend::router(service)).await
}
