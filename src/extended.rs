//! The template-ready view of an alert batch.
//!
//! [ExtendedData] is built once per notification and never changed
//! afterwards. It is what templates see and what most receivers embed in their
//! payload.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
	alert::{
		is_reserved, Alert, AlertStatus, LabelSet, DASHBOARD_UID_ANNOTATION, IMAGE_ANNOTATION,
		PANEL_ID_ANNOTATION, VALUE_STRING_ANNOTATION,
	},
	fingerprint::fingerprint,
	receivers::NotifyContext,
};

/// shown by the details block when no value is attached to an alert
pub const NO_VALUE: &str = "[no value]";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// one alert as seen by templates
pub struct ExtendedAlert {
	pub status: AlertStatus,
	pub labels: LabelSet,
	/// annotations without reserved `__name__` keys
	pub annotations: LabelSet,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub starts_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename = "generatorURL", default, skip_serializing_if = "Option::is_none")]
	pub generator_url: Option<String>,
	pub fingerprint: String,
	#[serde(rename = "silenceURL", default, skip_serializing_if = "Option::is_none")]
	pub silence_url: Option<String>,
	#[serde(rename = "dashboardURL", default, skip_serializing_if = "Option::is_none")]
	pub dashboard_url: Option<String>,
	#[serde(rename = "panelURL", default, skip_serializing_if = "Option::is_none")]
	pub panel_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value_string: Option<String>,
	#[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
	pub image_url: Option<String>,
}

impl ExtendedAlert {
	/// derive the render record of `alert`. `external_url` is `None` if it's
	/// empty or couldn't be parsed, in which case no urls are derived.
	fn new(alert: &Alert, external_url: Option<&Url>) -> Self {
		let annotations = alert
			.annotations
			.iter()
			.filter(|(key, _)| !is_reserved(key))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();

		let mut extended = Self {
			status: alert.status,
			labels: alert.labels.clone(),
			annotations,
			starts_at: alert.starts_at,
			ends_at: alert.ends_at,
			generator_url: alert.generator_url.clone().filter(|url| !url.is_empty()),
			fingerprint: fingerprint(&alert.labels).to_string(),
			silence_url: None,
			dashboard_url: None,
			panel_url: None,
			value_string: non_empty(&alert.annotations, VALUE_STRING_ANNOTATION),
			image_url: non_empty(&alert.annotations, IMAGE_ANNOTATION),
		};

		let base = match external_url {
			Some(base) => base,
			None => return extended,
		};

		if let Some(dashboard) = non_empty(&alert.annotations, DASHBOARD_UID_ANNOTATION) {
			let mut url = base.clone();
			url.set_path(&join_path(base.path(), &format!("d/{dashboard}")));
			url.set_query(None);
			extended.dashboard_url = Some(url.to_string());

			if let Some(panel) = non_empty(&alert.annotations, PANEL_ID_ANNOTATION) {
				url.set_query(Some(&format!("viewPanel={panel}")));
				extended.panel_url = Some(url.to_string());
			}
		}

		let mut silence = base.clone();
		silence.set_path(&join_path(base.path(), "alerting/silence/new"));
		silence.set_query(None);
		{
			let mut query = silence.query_pairs_mut();
			query.append_pair("alertmanager", "grafana");
			for (name, value) in alert.labels.iter().filter(|(name, _)| !is_reserved(name)) {
				query.append_pair("matcher", &format!("{name}={value}"));
			}
		}
		extended.silence_url = Some(silence.to_string());

		extended
	}

	/// Append the human readable details block of this alert. Every block
	/// starts with a newline, so consecutive blocks are separated by a blank
	/// line.
	pub fn write_details(&self, out: &mut String) {
		// writing into a String can't fail
		let _ = self.try_write_details(out);
	}

	fn try_write_details(&self, out: &mut String) -> std::fmt::Result {
		write!(out, "\nValue: {}\n", self.value_string.as_deref().unwrap_or(NO_VALUE))?;

		out.push_str("Labels:\n");
		for (name, value) in &self.labels {
			writeln!(out, " - {name} = {value}")?;
		}

		out.push_str("Annotations:\n");
		for (name, value) in &self.annotations {
			writeln!(out, " - {name} = {value}")?;
		}

		let links = [
			("Source", &self.generator_url),
			("Silence", &self.silence_url),
			("Dashboard", &self.dashboard_url),
			("Panel", &self.panel_url),
		];
		for (title, link) in links {
			if let Some(link) = link {
				writeln!(out, "{title}: {link}")?;
			}
		}

		Ok(())
	}
}

/// details blocks of all `alerts`
pub fn details(alerts: &[ExtendedAlert]) -> String {
	let mut out = String::new();
	for alert in alerts {
		alert.write_details(&mut out);
	}
	out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// bookkeeping of how many alerts were cut from the rendered view
pub struct Truncation {
	/// configured limit, 0 means unlimited
	pub max_alerts: usize,
	/// number of alerts removed from [ExtendedData::alerts]
	pub truncated: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// the full render context of one notification
pub struct ExtendedData {
	pub receiver: String,
	pub status: AlertStatus,
	/// rendered alerts, possibly truncated
	pub alerts: Vec<ExtendedAlert>,
	pub group_labels: LabelSet,
	/// computed over the whole batch, before truncation
	pub common_labels: LabelSet,
	/// computed over the whole batch, before truncation
	pub common_annotations: LabelSet,
	#[serde(rename = "externalURL")]
	pub external_url: String,
}

impl ExtendedData {
	/// Build the view of `alerts`.
	///
	/// # Arguments
	///
	/// * `alerts` - the complete batch, in the order it was received
	///
	/// * `ctx` - grouping context of the batch
	///
	/// * `external_url` - base url for silence/dashboard links, may be empty
	///
	/// * `max_alerts` - limit of rendered alerts, 0 for no limit
	pub fn build(
		alerts: &[Alert],
		ctx: &NotifyContext,
		external_url: &str,
		max_alerts: usize,
	) -> (Self, Truncation) {
		let status = if alerts.iter().any(Alert::is_firing) {
			AlertStatus::Firing
		} else {
			AlertStatus::Resolved
		};

		let common_labels = common(alerts.iter().map(|alert| &alert.labels));
		let common_annotations = common(alerts.iter().map(|alert| &alert.annotations))
			.into_iter()
			.filter(|(key, _)| !is_reserved(key))
			.collect();

		let base = Url::parse(external_url).ok();
		if base.is_none() && !external_url.is_empty() {
			tracing::debug!("external url {external_url:?} can't be parsed, omitting alert links");
		}

		let mut extended: Vec<_> =
			alerts.iter().map(|alert| ExtendedAlert::new(alert, base.as_ref())).collect();

		let mut truncation = Truncation { max_alerts, truncated: 0 };
		if max_alerts > 0 && extended.len() > max_alerts {
			truncation.truncated = extended.len() - max_alerts;
			extended.truncate(max_alerts);
		}

		let data = Self {
			receiver: ctx.receiver_name.clone(),
			status,
			alerts: extended,
			group_labels: ctx.group_labels.clone(),
			common_labels,
			common_annotations,
			external_url: external_url.to_owned(),
		};

		(data, truncation)
	}

	/// rendered alerts with status `status`
	pub fn alerts_with_status(&self, status: AlertStatus) -> impl Iterator<Item = &ExtendedAlert> {
		self.alerts.iter().filter(move |alert| alert.status == status)
	}

	pub fn is_firing(&self) -> bool {
		self.status == AlertStatus::Firing
	}
}

/// pairs present with the same value in every set
fn common<'a>(mut sets: impl Iterator<Item = &'a LabelSet>) -> LabelSet {
	let mut common = match sets.next() {
		Some(first) => first.clone(),
		None => return LabelSet::new(),
	};

	for set in sets {
		common.retain(|key, value| set.get(key) == Some(value));
		if common.is_empty() {
			break;
		}
	}

	common
}

/// value of `key` if it's present and not empty
fn non_empty(annotations: &LabelSet, key: &str) -> Option<String> {
	annotations.get(key).filter(|value| !value.is_empty()).cloned()
}

/// join url paths, keeping exactly one slash between them
fn join_path(base: &str, path: &str) -> String {
	format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
