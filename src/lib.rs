//! Caching gateway and backend over a virtual-machine monitoring API, with single-flight
//! credential refresh, layered TTL caches, and partial-failure tolerant fan-out.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod directory;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod server;
pub mod upstream;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	auth::{
		manager::CredentialManager,
		state::{CredentialState, CredentialStatus},
	},
	backend::MachineService,
	cache::{
		layer::{CacheLayer, LayerKind},
		store::{CacheStore, MemoryStore},
	},
	config::{BackendConfig, GatewayConfig},
	directory::AssetDirectory,
	error::{Error, Result},
	gateway::{Gateway, client::BackendClient},
	model::{Asset, MachineDetail, RawStatusRecord},
	normalize::{NormalizedCheck, ServiceStatus, StatusSummary, build_status, normalize_check},
	upstream::client::UpstreamClient,
};
