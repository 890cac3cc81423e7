//! Gateway tier routes.

// crates.io
use axum::{
	Json, Router,
	extract::{Path, State},
	routing::get,
};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	model::{DataEnvelope, MachineDetail, VmNames},
	server,
};

/// `/`, `/api/status/{client}`, `/api/machine/{name}`, `/api/vmnames/{client}` and `/metrics`.
///
/// Every route answers cross-origin requests; the dashboard is served from another origin.
pub fn router(gateway: Gateway) -> Router {
	Router::new()
		.route("/", get(home))
		.route("/api/status/{client}", get(client_status))
		.route("/api/machine/{name}", get(machine))
		.route("/api/vmnames/{client}", get(vm_names))
		.with_state(gateway)
		.merge(server::metrics_routes())
		.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn home() -> Json<Value> {
	Json(json!({ "message": "vmwatch gateway is up." }))
}

async fn client_status(
	State(gateway): State<Gateway>,
	Path(client): Path<String>,
) -> Result<Json<DataEnvelope<MachineDetail>>> {
	Ok(Json(gateway.client_status(&client).await?))
}

async fn machine(
	State(gateway): State<Gateway>,
	Path(name): Path<String>,
) -> Result<Json<MachineDetail>> {
	Ok(Json(gateway.machine(&name).await?))
}

async fn vm_names(
	State(gateway): State<Gateway>,
	Path(client): Path<String>,
) -> Result<Json<VmNames>> {
	Ok(Json(gateway.vm_names(&client).await?))
}
