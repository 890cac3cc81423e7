//! Wire and cache data model shared by the backend and gateway tiers.
//!
//! Upstream shapes are treated as untrusted: every field is optional and any field this crate does
//! not know about is carried through the caches verbatim.

// crates.io
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
// self
use crate::normalize::{NormalizedCheck, StatusSummary};

/// A monitored virtual machine as known to the upstream inventory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
	/// Upstream-assigned unique identifier.
	#[serde(default, deserialize_with = "lenient_string")]
	pub asset_id: String,
	/// Display name, used as the lookup key by `/machine/{name}`.
	#[serde(default, deserialize_with = "lenient_string")]
	pub asset_name: String,
	/// Upstream asset category.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub asset_type: Option<String>,
	/// Owning customer; the gateway filters on it.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub customer_name: Option<String>,
	/// Owning organization.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub organization: Option<String>,
	/// Customer service unit.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub csu_name: Option<String>,
	/// Support group tag the directory is filtered on.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub l2_support: Option<String>,
	/// Fields not modelled above, preserved as received.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Asset {
	/// Case-insensitive substring match on the customer name.
	pub fn belongs_to(&self, client: &str) -> bool {
		let needle = client.to_lowercase();

		self.customer_name.as_deref().unwrap_or_default().to_lowercase().contains(&needle)
	}
}

/// Instance block occasionally attached to a status record instead of a description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInstance {
	/// Instance label, used when a record has no description.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub instance_name: Option<String>,
	/// Fields not modelled above, preserved as received.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// One monitored-service record returned by the upstream status endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusRecord {
	/// Free-form upstream status vocabulary (`ok`, `KO`, `warn`, ...).
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub status: Option<String>,
	/// Human-readable service description.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub description: Option<String>,
	/// Instance block, if any.
	#[serde(default, deserialize_with = "lenient_instance")]
	pub instance: Option<StatusInstance>,
	/// Monitored object class.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub object_class: Option<String>,
	/// Monitored parameter.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub parameter: Option<String>,
	/// Monitored object.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub object: Option<String>,
	/// Upstream severity label.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub severity: Option<String>,
	/// Timestamp of the last status change.
	#[serde(default, deserialize_with = "lenient_opt_string")]
	pub last_change: Option<String>,
	/// Fields not modelled above, preserved as received.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl RawStatusRecord {
	/// Service label: description, then instance name, then `"Unknown"`.
	pub fn service_name(&self) -> &str {
		non_empty(self.description.as_deref())
			.or_else(|| self.instance.as_ref().and_then(|i| non_empty(i.instance_name.as_deref())))
			.unwrap_or("Unknown")
	}
}

/// Fully normalized machine payload served by `/machine/{name}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineDetail {
	/// Asset name the detail was requested for.
	pub machine: String,
	/// Upstream asset category.
	#[serde(rename = "assetType")]
	pub asset_type: Option<String>,
	/// Owning customer; the gateway filters on it.
	#[serde(rename = "customerName")]
	pub customer_name: Option<String>,
	/// Owning organization.
	pub organization: Option<String>,
	/// Customer service unit.
	#[serde(rename = "csuName")]
	pub csu_name: Option<String>,
	/// Support group tag.
	#[serde(rename = "L2Support")]
	pub l2_support: Option<String>,
	/// Per-service labels and the overall severity.
	#[serde(flatten)]
	pub summary: StatusSummary,
	/// Every check, normalized for display.
	pub monitoring_details: Vec<NormalizedCheck>,
}
impl MachineDetail {
	/// Combine an asset with its built status summary and normalized checks.
	pub fn assemble(
		asset: &Asset,
		summary: StatusSummary,
		monitoring_details: Vec<NormalizedCheck>,
	) -> Self {
		Self {
			machine: asset.asset_name.clone(),
			asset_type: asset.asset_type.clone(),
			customer_name: asset.customer_name.clone(),
			organization: asset.organization.clone(),
			csu_name: asset.csu_name.clone(),
			l2_support: asset.l2_support.clone(),
			summary,
			monitoring_details,
		}
	}
}

/// `{"data": [...]}` envelope used by the upstream API and by both tiers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
	/// Wrapped payload.
	#[serde(default = "Vec::new")]
	pub data: Vec<T>,
}
impl<T> DataEnvelope<T> {
	/// Wrap a list.
	pub fn new(data: Vec<T>) -> Self {
		Self { data }
	}
}

/// `{"names": [...]}` envelope served by the gateway name listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNames {
	/// Asset names in upstream listing order.
	pub names: Vec<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.is_empty())
}

fn scalar_to_string(value: Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(s),
		Value::Bool(b) => Some(b.to_string()),
		Value::Number(n) => Some(n.to_string()),
		other => Some(other.to_string()),
	}
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_instance<'de, D>(
	deserializer: D,
) -> std::result::Result<Option<StatusInstance>, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		value @ Value::Object(_) => Ok(serde_json::from_value(value).ok()),
		_ => Ok(None),
	}
}
