//! HTTP client for the identity provider and the monitoring API.

pub mod client;
