//! Backend tier routes.

// crates.io
use axum::{
	Json, Router,
	extract::{Path, Query, State},
	routing::get,
};
use serde::Deserialize;
// self
use crate::{
	_prelude::*,
	backend::{BackendHealth, MachineService},
	model::{Asset, DataEnvelope, MachineDetail},
	server,
};

/// Query accepted by `GET /assets`.
#[derive(Debug, Default, Deserialize)]
pub struct AssetQuery {
	/// Case-insensitive customer name substring.
	pub client: Option<String>,
}

/// `/assets`, `/machine/{name}`, `/health` and `/metrics`.
pub fn router(service: MachineService) -> Router {
	Router::new()
		.route("/assets", get(assets))
		.route("/machine/{name}", get(machine))
		.route("/health", get(health))
		.with_state(service)
		.merge(server::metrics_routes())
}

async fn assets(
	State(service): State<MachineService>,
	Query(query): Query<AssetQuery>,
) -> Result<Json<DataEnvelope<Asset>>> {
	let assets = service.list_assets(query.client.as_deref()).await?;

	Ok(Json(DataEnvelope::new(assets)))
}

async fn machine(
	State(service): State<MachineService>,
	Path(name): Path<String>,
) -> Result<Json<MachineDetail>> {
	Ok(Json(service.machine_detail(&name).await?))
}

async fn health(State(service): State<MachineService>) -> Json<BackendHealth> {
	Json(service.health().await)
}
