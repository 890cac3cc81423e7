//! Keyed TTL cache stores and the ordered layers built on top of them.

pub mod layer;
pub mod store;
