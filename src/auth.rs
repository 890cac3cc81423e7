//! Bearer credential lifecycle: state tracking and single-flight renewal.

pub mod manager;
pub mod state;
