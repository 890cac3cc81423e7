//! Gateway tier: per-client aggregation over the backend, cached with a TTL.

// crates.io
use tokio::net::TcpListener;
// self
use vmwatch::{BackendClient, Gateway, GatewayConfig, Result, server};

#[tokio::main]
async fn main() -> Result<()> {
	server::init_tracing();

	#[cfg(feature = "prometheus")]
	vmwatch::metrics::install_default_exporter()?;

	let config = GatewayConfig::from_env()?;
	let backend = BackendClient::new(config.backend_url.clone(), config.timeout)?;
	let store = config.cache_store()?;

	tracing::info!(
		backend = %config.backend_url,
		store = store.backend(),
		cache_ttl = ?config.cache_ttl,
		"starting gateway"
	);

	let gateway = Gateway::new(backend, store, config.cache_ttl, config.timeout);
	let listener = TcpListener::bind(config.bind).await?;

	server::serve(listener, server::gateway::router(gateway)).await
}
