//! HTTP surface of both tiers: routers, error responses, tracing setup.

pub mod backend;
pub mod gateway;

// crates.io
use axum::{
	Json, Router,
	response::{IntoResponse, Response},
	routing::get,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
// self
use crate::_prelude::*;

/// Install the global `fmt` subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Serve `router` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
	tracing::info!(addr = %listener.local_addr()?, "listening");

	axum::serve(listener, router.layer(TraceLayer::new_for_http()))
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("server stopped");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %err, "failed to listen for shutdown signal");

		std::future::pending::<()>().await;
	}
}

/// `/metrics` route rendering the Prometheus exporter, when installed.
pub fn metrics_routes() -> Router {
	Router::new().route("/metrics", get(render_metrics))
}

#[cfg(feature = "prometheus")]
async fn render_metrics() -> Response {
	match crate::metrics::prometheus_handle() {
		Some(handle) => handle.render().into_response(),
		None => http::StatusCode::NOT_FOUND.into_response(),
	}
}

#[cfg(not(feature = "prometheus"))]
async fn render_metrics() -> Response {
	http::StatusCode::NOT_FOUND.into_response()
}

#[derive(Serialize)]
struct ErrorBody {
	error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
	code: &'static str,
	message: String,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status_code();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		let body =
			ErrorBody { error: ErrorDetail { code: self.code(), message: self.to_string() } };

		(status, Json(body)).into_response()
	}
}
