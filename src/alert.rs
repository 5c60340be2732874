//! data structures for incoming alerts
use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// label or annotation set, ordered by key
pub type LabelSet = BTreeMap<String, String>;

/// dashboard the alert rule belongs to
pub const DASHBOARD_UID_ANNOTATION: &str = "__dashboardUid__";
/// panel of the dashboard the alert rule belongs to
pub const PANEL_ID_ANNOTATION: &str = "__panelId__";
/// human readable value attached by the rule evaluator
pub const VALUE_STRING_ANNOTATION: &str = "__value_string__";
/// public url of an image of the alerting panel
pub const IMAGE_ANNOTATION: &str = "image";

/// `true` for internal keys of the form `__name__`
pub fn is_reserved(key: &str) -> bool {
	key.len() >= 4 && key.starts_with("__") && key.ends_with("__")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// state of a single alert or of a whole batch
pub enum AlertStatus {
	Firing,
	Resolved,
}

impl AlertStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Firing => "firing",
			Self::Resolved => "resolved",
		}
	}
}

impl fmt::Display for AlertStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// one firing or resolved alert
pub struct Alert {
	pub status: AlertStatus,
	/// identity of the alert
	#[serde(default)]
	pub labels: LabelSet,
	/// descriptive metadata
	#[serde(default)]
	pub annotations: LabelSet,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub starts_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename = "generatorURL", default, skip_serializing_if = "Option::is_none")]
	pub generator_url: Option<String>,
}

impl Alert {
	/// firing alert without annotations
	pub fn firing<I, K, V>(labels: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			status: AlertStatus::Firing,
			labels: labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
			annotations: LabelSet::new(),
			starts_at: None,
			ends_at: None,
			generator_url: None,
		}
	}

	/// same alert marked as resolved
	pub fn resolved(mut self) -> Self {
		self.status = AlertStatus::Resolved;
		self
	}

	/// same alert with an additional annotation
	pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.annotations.insert(key.into(), value.into());
		self
	}

	pub fn is_firing(&self) -> bool {
		self.status == AlertStatus::Firing
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// alert group posted to the webhook endpoint, in the alertmanager webhook
/// format
#[allow(clippy::missing_docs_in_private_items)]
pub struct Data {
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub group_key: String,
	#[serde(default)]
	pub receiver: String,
	pub status: AlertStatus,
	pub alerts: Vec<Alert>,
	#[serde(default)]
	pub group_labels: LabelSet,
	#[serde(default)]
	pub common_labels: LabelSet,
	#[serde(default)]
	pub common_annotations: LabelSet,
	#[serde(rename = "externalURL", default)]
	pub external_url: String,
}
