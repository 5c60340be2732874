//! Notifiers for the supported receiver types.
//!
//! Every receiver validates its settings once in its constructor, builds the
//! alert view per notification, renders its templates and hands the payload
//! to [delivery](crate::delivery).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
	alert::{Alert, LabelSet},
	alert_renderer::AlertRenderer,
	error::{ConfigError, NotifyError},
	extended::{ExtendedData, Truncation},
	hostname::HostnameResolver,
	http_client::HttpSender,
	images::{with_images, ImageStore},
};

pub mod alertmanager;
pub mod googlechat;
pub mod kafka;
pub mod pagerduty;
pub mod pushover;
pub mod settings;
pub mod webhook;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// grouping context of one alert batch
pub struct NotifyContext {
	/// identifies the alert group
	pub group_key: String,
	/// labels the batch was grouped by, empty values for labels the alerts
	/// don't have
	pub group_labels: LabelSet,
	/// name of the receiver the batch was routed to
	pub receiver_name: String,
}

impl NotifyContext {
	pub fn new<I, K, V>(group_key: impl Into<String>, group_labels: I, receiver_name: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			group_key: group_key.into(),
			group_labels: group_labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
			receiver_name: receiver_name.into(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
/// configuration of one receiver, as found in the settings file
pub struct ReceiverConfig {
	/// unique name, also the url path the receiver is reachable at
	pub name: String,
	/// receiver type, e.g. `webhook`
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub disable_resolve_message: bool,
	/// receiver specific settings
	#[serde(default)]
	pub settings: Value,
	/// already decrypted secrets, they take precedence over `settings`
	#[serde(default)]
	pub secure_settings: HashMap<String, String>,
}

#[derive(Clone)]
/// collaborators shared by all notifiers
pub struct NotifierDeps {
	pub sender: Arc<dyn HttpSender>,
	pub images: Arc<dyn ImageStore>,
	pub renderer: Arc<AlertRenderer>,
	pub hostname: Arc<dyn HostnameResolver>,
	/// base of the links in notifications
	pub external_url: String,
	pub org_id: i64,
}

impl NotifierDeps {
	/// Attach images to `alerts` and build their view.
	pub async fn view(
		&self,
		ctx: &NotifyContext,
		alerts: &[Alert],
		max_alerts: usize,
	) -> (ExtendedData, Truncation) {
		let alerts = with_images(self.images.as_ref(), alerts).await;
		ExtendedData::build(&alerts, ctx, &self.external_url, max_alerts)
	}
}

#[async_trait]
/// Sends alert batches to one receiver.
pub trait Notifier: Send + Sync {
	/// name of the receiver
	fn name(&self) -> &str;

	/// Deliver `alerts`. `Ok(())` means the notification was delivered, an
	/// empty batch is delivered without doing anything.
	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError>;

	/// whether batches without firing alerts are sent at all
	fn send_resolved(&self) -> bool;
}

#[derive(Debug, Clone)]
/// fields every notifier shares
pub struct Base {
	pub name: String,
	pub disable_resolve_message: bool,
}

impl Base {
	pub fn new(config: &ReceiverConfig) -> Self {
		Self { name: config.name.clone(), disable_resolve_message: config.disable_resolve_message }
	}

	pub fn send_resolved(&self) -> bool {
		!self.disable_resolve_message
	}
}

/// Construct the notifier for `config`, selected by its type.
pub fn build(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Arc<dyn Notifier>, ConfigError> {
	let notifier: Arc<dyn Notifier> = match config.kind.as_str() {
		"webhook" => Arc::new(webhook::WebhookNotifier::new(config, deps)?),
		"prometheus-alertmanager" | "alertmanager" => {
			Arc::new(alertmanager::AlertmanagerNotifier::new(config, deps)?)
		}
		"pagerduty" => Arc::new(pagerduty::PagerdutyNotifier::new(config, deps)?),
		"kafka" => Arc::new(kafka::KafkaNotifier::new(config, deps)?),
		"googlechat" => Arc::new(googlechat::GoogleChatNotifier::new(config, deps)?),
		"pushover" => Arc::new(pushover::PushoverNotifier::new(config, deps)?),
		kind => return Err(ConfigError::UnknownReceiverType(kind.to_owned())),
	};

	tracing::debug!("constructed {} receiver {}", config.kind, config.name);

	Ok(notifier)
}


#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::{testing::*, *};
	use crate::http_client::fake::RecordingSender;

	#[test]
	fn selects_receiver_by_type() {
		let deps = deps(Arc::new(RecordingSender::default()));

		let notifier = build(&config("webhook", json!({"url": "http://localhost/test"})), deps.clone()).unwrap();
		assert_eq!(notifier.name(), "webhook_testing");
		assert!(notifier.send_resolved());

		let mut kafka = config("kafka", json!({"kafkaRestProxy": "http://localhost", "kafkaTopic": "t"}));
		kafka.disable_resolve_message = true;
		assert!(!build(&kafka, deps.clone()).unwrap().send_resolved());

		let err = build(&config("carrier-pigeon", json!({})), deps).err().unwrap();
		assert_eq!(err.to_string(), "unknown receiver type \"carrier-pigeon\"");
	}

	#[test]
	fn construction_errors_surface() {
		let deps = deps(Arc::new(RecordingSender::default()));
		let err = build(&config("pagerduty", json!({})), deps).err().unwrap();
		assert!(matches!(err, ConfigError::MissingIntegrationKey));
	}

	#[test]
	fn receiver_config_from_json() {
		let config: ReceiverConfig = serde_json::from_value(json!({
			"name": "ops",
			"type": "webhook",
			"settings": {"url": "http://hook"},
			"secure_settings": {"password": "secret"}
		}))
		.unwrap();

		assert_eq!(config.kind, "webhook");
		assert!(!config.disable_resolve_message);
		assert_eq!(config.secure_settings["password"], "secret");
	}
}
