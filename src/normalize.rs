//! Status normalization: maps free-form upstream status strings onto a fixed vocabulary.

// std
use std::collections::BTreeMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::model::RawStatusRecord;

/// Normalized service status.
///
/// Variants are declared in ascending severity so that `Ord` encodes the precedence
/// `Critical > Warning > Unknown > OK`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
	/// Service reported healthy.
	#[default]
	#[serde(rename = "OK")]
	Ok,
	/// Status string was empty or not recognized.
	Unknown,
	/// Degraded service.
	Warning,
	/// Failed service.
	Critical,
}
impl ServiceStatus {
	/// Classify a raw upstream status string (case-insensitive).
	pub fn classify(raw: &str) -> Self {
		match raw.to_lowercase().as_str() {
			"ok" => Self::Ok,
			"critical" | "ko" | "error" | "not ok" => Self::Critical,
			"warning" | "warn" => Self::Warning,
			_ => Self::Unknown,
		}
	}
}

/// Per-service labels plus the most severe individual status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
	/// Service description mapped to its normalized status.
	pub monitored_services: BTreeMap<String, ServiceStatus>,
	/// Most severe status across all services, `OK` when there are none.
	pub global_status: ServiceStatus,
}

/// A single check normalized for display, every missing field replaced by a placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCheck {
	/// Monitored object class, `"-"` when absent.
	pub object_class: String,
	/// Monitored parameter, `"-"` when absent.
	pub parameter: String,
	/// Monitored object, `"-"` when absent.
	pub object: String,
	/// Capitalized status, `"Unknown"` when absent.
	pub status: String,
	/// Upstream severity, `"-"` when absent.
	pub severity: String,
	/// Last change timestamp, `"Never"` when absent.
	pub last_change: String,
	/// Service description, empty when absent.
	pub description: String,
}

/// Build the status summary for a machine's monitored services.
///
/// Records sharing a description collapse onto one entry; the later record wins for the per-service
/// label while every record still contributes to `global_status`.
pub fn build_status(records: &[RawStatusRecord]) -> StatusSummary {
	let mut summary = StatusSummary::default();

	for record in records {
		let status = ServiceStatus::classify(record.status.as_deref().unwrap_or_default());

		summary.monitored_services.insert(record.service_name().to_owned(), status);
		summary.global_status = summary.global_status.max(status);
	}

	summary
}

/// Normalize one raw record for the check listing.
pub fn normalize_check(record: &RawStatusRecord) -> NormalizedCheck {
	let status = capitalize(record.status.as_deref().unwrap_or_default());

	NormalizedCheck {
		object_class: or_placeholder(&record.object_class, "-"),
		parameter: or_placeholder(&record.parameter, "-"),
		object: or_placeholder(&record.object, "-"),
		status: if status.is_empty() { "Unknown".into() } else { status },
		severity: or_placeholder(&record.severity, "-"),
		last_change: or_placeholder(&record.last_change, "Never"),
		description: or_placeholder(&record.description, ""),
	}
}

fn or_placeholder(value: &Option<String>, placeholder: &str) -> String {
	match value.as_deref() {
		Some(v) if !v.is_empty() => v.to_owned(),
		_ => placeholder.to_owned(),
	}
}

// First character upper-cased, the rest lower-cased.
fn capitalize(value: &str) -> String {
	let mut chars = value.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
		None => String::new(),
	}
}
