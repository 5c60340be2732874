//! Renders alert views via tera templates.
//!
//! Views are built by [extended](crate::extended), rendered strings end up in
//! the payloads of [receivers](crate::receivers).

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

use crate::{
	alert::{AlertStatus, LabelSet},
	error::{error_chain, RenderError},
	extended::{details, ExtendedAlert, ExtendedData},
};

/// name of the default title template
pub const DEFAULT_TITLE: &str = "default.title";
/// name of the default message template
pub const DEFAULT_MESSAGE: &str = "default.message";

/// renders the default title when used as a receiver template
pub const DEFAULT_TITLE_EMBED: &str = r#"{% include "default.title" %}"#;
/// renders the default message when used as a receiver template
pub const DEFAULT_MESSAGE_EMBED: &str = r#"{% include "default.message" %}"#;

/// `[FIRING:2] group label values (other common label values)`, the
/// parenthesis only if there are more common labels than group labels
const DEFAULT_TITLE_TEMPLATE: &str = concat!(
	r#"{%- set extra_labels = commonLabels | remove(keys=groupLabels) -%}"#,
	r#"[{{ status | upper }}:"#,
	r#"{% if status == "firing" %}{{ alerts | firing | length }}{% else %}{{ alerts | resolved | length }}{% endif %}] "#,
	r#"{{ groupLabels | label_values | join(sep=" ") }} "#,
	r#"{% if commonLabels | length > groupLabels | length %}({{ extra_labels | label_values | join(sep=" ") }}){% endif %}"#,
);

/// details of firing alerts, then details of resolved alerts
const DEFAULT_MESSAGE_TEMPLATE: &str = concat!(
	"{%- set firing_alerts = alerts | firing -%}",
	"{%- set resolved_alerts = alerts | resolved -%}",
	"{% if firing_alerts | length > 0 %}**Firing**\n{{ firing_alerts | details }}",
	"{% if resolved_alerts | length > 0 %}\n\n{% endif %}{% endif %}",
	"{% if resolved_alerts | length > 0 %}**Resolved**\n{{ resolved_alerts | details }}{% endif %}",
);

/// Alert renderer. Holds the prepared engine only, rendering never changes it,
/// so one renderer can be shared by all notifiers.
#[derive(Debug, Clone)]
pub struct AlertRenderer {
	tera: Tera,
}

impl AlertRenderer {
	/// Return new renderer with the default templates and filters registered.
	///
	/// # Arguments
	///
	/// * `templates` - optional glob of additional template files, which
	///   receiver templates can include by file name
	pub fn new(templates: Option<&str>) -> Result<Self, RenderError> {
		let mut tera = match templates {
			Some(glob) => Tera::new(glob).map_err(|err| RenderError(error_chain(&err)))?,
			None => Tera::default(),
		};

		// payloads are json or plain text, never html
		tera.autoescape_on(Vec::new());

		tera.add_raw_templates([
			(DEFAULT_TITLE, DEFAULT_TITLE_TEMPLATE),
			(DEFAULT_MESSAGE, DEFAULT_MESSAGE_TEMPLATE),
		])
		.map_err(|err| RenderError(error_chain(&err)))?;

		tera.register_filter("firing", filter_status(AlertStatus::Firing));
		tera.register_filter("resolved", filter_status(AlertStatus::Resolved));
		tera.register_filter("details", details_filter);
		tera.register_filter("label_values", label_values_filter);
		tera.register_filter("remove", remove_filter);

		Ok(Self { tera })
	}

	/// Prepare rendering several templates against the same view.
	pub fn session(&self, data: &ExtendedData) -> Result<RenderSession, RenderError> {
		RenderSession::new(self.tera.clone(), data)
	}

	/// Render a single template against `data`.
	pub fn render(&self, template: &str, data: &ExtendedData) -> Result<String, RenderError> {
		self.session(data)?.render(template)
	}
}

impl Default for AlertRenderer {
	fn default() -> Self {
		// only fails on user supplied template files
		#[allow(clippy::expect_used)]
		Self::new(None).expect("default templates are valid")
	}
}

/// renders templates of one notification
pub struct RenderSession {
	tera: Tera,
	context: Context,
}

impl RenderSession {
	fn new(tera: Tera, data: &impl Serialize) -> Result<Self, RenderError> {
		let context = Context::from_serialize(data).map_err(|err| RenderError(error_chain(&err)))?;
		Ok(Self { tera, context })
	}

	/// Render the template text `template`. Empty templates render to an
	/// empty string.
	pub fn render(&mut self, template: &str) -> Result<String, RenderError> {
		if template.is_empty() {
			return Ok(String::new());
		}

		self.tera.render_str(template, &self.context).map_err(|err| {
			let err = RenderError(error_chain(&err));
			tracing::debug!("{err}");
			err
		})
	}
}

/// filter keeping the alerts with status `status`
fn filter_status(
	status: AlertStatus,
) -> impl Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync {
	move |value, _| {
		let alerts = value
			.as_array()
			.ok_or_else(|| tera::Error::msg(format!("filter `{status}` expects an array of alerts")))?;

		Ok(Value::Array(
			alerts
				.iter()
				.filter(|alert| alert.get("status").and_then(Value::as_str) == Some(status.as_str()))
				.cloned()
				.collect(),
		))
	}
}

/// human readable details of an array of alerts
fn details_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	let alerts: Vec<ExtendedAlert> = serde_json::from_value(value.clone())
		.map_err(|err| tera::Error::chain("filter `details` expects an array of alerts", err))?;

	Ok(Value::String(details(&alerts)))
}

/// non-empty values of a label set, in key order
fn label_values_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	let labels: LabelSet = serde_json::from_value(value.clone())
		.map_err(|err| tera::Error::chain("filter `label_values` expects a label set", err))?;

	Ok(Value::Array(
		labels.into_values().filter(|value| !value.is_empty()).map(Value::String).collect(),
	))
}

/// label set without the keys given by `keys`, either an array of keys or
/// another label set
fn remove_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
	let mut labels = value
		.as_object()
		.cloned()
		.ok_or_else(|| tera::Error::msg("filter `remove` expects a label set"))?;

	match args.get("keys") {
		Some(Value::Array(keys)) => {
			for key in keys.iter().filter_map(Value::as_str) {
				labels.remove(key);
			}
		}
		Some(Value::Object(keys)) => {
			for key in keys.keys() {
				labels.remove(key);
			}
		}
		Some(Value::String(key)) => {
			labels.remove(key);
		}
		_ => return Err(tera::Error::msg("filter `remove` expects an argument `keys`")),
	}

	Ok(Value::Object(labels))
}
