//! pagerduty receiver, speaks the Events API v2
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
	settings::{decode, non_empty, or_default, secret},
	Base, Notifier, NotifierDeps, NotifyContext, ReceiverConfig,
};
use crate::{
	alert::Alert,
	alert_renderer::{RenderSession, DEFAULT_TITLE_EMBED},
	delivery::deliver,
	error::{ConfigError, NotifyError},
	fingerprint::hash_key,
	http_client::HttpRequest,
};

/// events api endpoint
pub const EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

pub const DEFAULT_SEVERITY: &str = "critical";
pub const DEFAULT_CLASS: &str = "default";
pub const DEFAULT_COMPONENT: &str = "Grafana";
pub const DEFAULT_GROUP: &str = "default";
pub const DEFAULT_CLIENT: &str = "Grafana";
pub const DEFAULT_CLIENT_URL: &str = "{{ externalURL }}";

/// longest summary pagerduty accepts, in characters
const MAX_SUMMARY_LEN: usize = 1024;

/// custom details sent with every event, rendered per notification
fn default_custom_details() -> IndexMap<String, String> {
	[
		("firing", "{{ alerts | firing | details }}"),
		("resolved", "{{ alerts | resolved | details }}"),
		("num_firing", "{{ alerts | firing | length }}"),
		("num_resolved", "{{ alerts | resolved | length }}"),
	]
	.into_iter()
	.map(|(key, value)| (key.to_owned(), value.to_owned()))
	.collect()
}

#[derive(Debug, Deserialize)]
struct RawSettings {
	#[serde(rename = "integrationKey")]
	integration_key: Option<String>,
	severity: Option<String>,
	class: Option<String>,
	component: Option<String>,
	group: Option<String>,
	summary: Option<String>,
	source: Option<String>,
	client: Option<String>,
	client_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated pagerduty settings, all fields but `key` are templates
pub struct Config {
	/// integration (routing) key
	pub key: String,
	pub severity: String,
	pub custom_details: IndexMap<String, String>,
	pub class: String,
	pub component: String,
	pub group: String,
	pub summary: String,
	pub source: String,
	pub client: String,
	pub client_url: String,
}

impl Config {
	pub fn new(config: &ReceiverConfig, deps: &NotifierDeps) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;

		let key = secret(&config.secure_settings, "integrationKey", raw.integration_key)
			.ok_or(ConfigError::MissingIntegrationKey)?;

		let client = or_default(raw.client, DEFAULT_CLIENT);
		let source = match non_empty(raw.source) {
			Some(source) => source,
			None => match deps.hostname.hostname() {
				Ok(hostname) => hostname,
				Err(err) => {
					tracing::debug!("can't resolve hostname, using client as source: {err}");
					client.clone()
				}
			},
		};

		Ok(Self {
			key,
			severity: or_default(raw.severity, DEFAULT_SEVERITY),
			custom_details: default_custom_details(),
			class: or_default(raw.class, DEFAULT_CLASS),
			component: or_default(raw.component, DEFAULT_COMPONENT),
			group: or_default(raw.group, DEFAULT_GROUP),
			summary: or_default(raw.summary, DEFAULT_TITLE_EMBED),
			source,
			client,
			client_url: or_default(raw.client_url, DEFAULT_CLIENT_URL),
		})
	}
}

#[derive(Debug, Serialize)]
struct Message {
	routing_key: String,
	dedup_key: String,
	event_action: &'static str,
	payload: Payload,
	#[serde(skip_serializing_if = "String::is_empty")]
	client: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	client_url: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	links: Vec<Link>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	images: Vec<Image>,
}

#[derive(Debug, Serialize)]
struct Payload {
	summary: String,
	source: String,
	severity: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	class: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	component: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	group: String,
	custom_details: IndexMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Link {
	href: String,
	text: &'static str,
}

#[derive(Debug, Serialize)]
struct Image {
	src: String,
}

/// `text`, shortened to at most `max` characters
fn truncate(text: String, max: usize) -> String {
	if text.chars().count() <= max {
		return text;
	}

	let mut truncated: String = text.chars().take(max - 1).collect();
	truncated.push('…');
	truncated
}

/// triggers and resolves pagerduty incidents, one per alert group
pub struct PagerdutyNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl PagerdutyNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config, &deps)?, deps })
	}

	fn custom_details(&self, session: &mut RenderSession) -> Result<IndexMap<String, String>, NotifyError> {
		let mut details = IndexMap::with_capacity(self.config.custom_details.len());
		for (key, template) in &self.config.custom_details {
			details.insert(key.clone(), session.render(template)?);
		}
		Ok(details)
	}
}

#[async_trait]
impl Notifier for PagerdutyNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending pagerduty event to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let (data, _) = self.deps.view(ctx, alerts, 0).await;
		let mut session = self.deps.renderer.session(&data)?;
		let config = &self.config;

		let severity = non_empty(Some(session.render(&config.severity)?))
			.unwrap_or_else(|| DEFAULT_SEVERITY.to_owned())
			.to_lowercase();
		let summary = session.render(&config.summary)?;
		let client_url = session.render(&config.client_url)?;

		let payload = Payload {
			summary: truncate(summary, MAX_SUMMARY_LEN),
			source: session.render(&config.source)?,
			severity,
			class: session.render(&config.class)?,
			component: session.render(&config.component)?,
			group: session.render(&config.group)?,
			custom_details: self.custom_details(&mut session)?,
		};

		let mut links = Vec::new();
		if !client_url.is_empty() {
			links.push(Link { href: client_url.clone(), text: "External URL" });
		}

		let images = data
			.alerts
			.iter()
			.filter_map(|alert| alert.image_url.clone())
			.map(|src| Image { src })
			.collect();

		let message = Message {
			routing_key: config.key.clone(),
			dedup_key: hash_key(&ctx.group_key),
			event_action: if data.is_firing() { "trigger" } else { "resolve" },
			payload,
			client: session.render(&config.client)?,
			client_url,
			links,
			images,
		};

		tracing::info!(
			"notifying pagerduty, event {} with key {}",
			message.event_action,
			message.dedup_key
		);

		let request = HttpRequest::json(EVENTS_URL, serde_json::to_vec(&message)?);
		deliver(self.deps.sender.as_ref(), request).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}

#[cfg(test)]
mod tests {
	use std::{collections::HashMap, sync::Arc};

	use serde_json::{json, Value};

	use super::*;
	use crate::{
		hostname::StaticHostname, http_client::fake::RecordingSender, images::fake::StaticImageStore,
		receivers::testing::*,
	};

	fn validate(settings: Value, secrets: &[(&str, &str)]) -> Result<Config, ConfigError> {
		let sender = Arc::new(RecordingSender::default());
		Config::new(&with_secrets(config("pagerduty", settings), secrets), &deps(sender))
	}

	fn expected(key: &str) -> Config {
		Config {
			key: key.into(),
			severity: DEFAULT_SEVERITY.into(),
			custom_details: default_custom_details(),
			class: DEFAULT_CLASS.into(),
			component: DEFAULT_COMPONENT.into(),
			group: DEFAULT_GROUP.into(),
			summary: DEFAULT_TITLE_EMBED.into(),
			source: "Grafana-TEST-host".into(),
			client: DEFAULT_CLIENT.into(),
			client_url: DEFAULT_CLIENT_URL.into(),
		}
	}

	#[test]
	fn settings_validation() {
		let err = validate(Value::Null, &[]).unwrap_err();
		assert_eq!(err.to_string(), "failed to unmarshal settings");

		let err = validate(json!({}), &[]).unwrap_err();
		assert_eq!(err.to_string(), "could not find integration key property in settings");

		assert_eq!(validate(json!({"integrationKey": "test-api-key"}), &[]).unwrap(), expected("test-api-key"));
		assert_eq!(validate(json!({}), &[("integrationKey", "test-api-key")]).unwrap(), expected("test-api-key"));
		assert_eq!(
			validate(json!({"integrationKey": "test"}), &[("integrationKey", "test-api-key")]).unwrap(),
			expected("test-api-key")
		);
	}

	#[test]
	fn empty_fields_fall_back_to_defaults() {
		let settings = json!({
			"integrationKey": "",
			"severity": "",
			"class": "",
			"component": "",
			"group": "",
			"summary": "",
			"source": "",
			"client": "",
			"client_url": "",
			"custom_details": {"test": "test"}
		});
		assert_eq!(validate(settings, &[("integrationKey", "test-api-key")]).unwrap(), expected("test-api-key"));
	}

	#[test]
	fn all_fields() {
		let settings = json!({
			"severity": "test-severity",
			"class": "test-class",
			"component": "test-component",
			"group": "test-group",
			"summary": "test-summary",
			"source": "test-source",
			"client": "test-client",
			"client_url": "test-client-url"
		});
		let config = validate(settings, &[("integrationKey", "test-api-key")]).unwrap();

		assert_eq!(config.severity, "test-severity");
		assert_eq!(config.class, "test-class");
		assert_eq!(config.component, "test-component");
		assert_eq!(config.group, "test-group");
		assert_eq!(config.summary, "test-summary");
		assert_eq!(config.source, "test-source");
		assert_eq!(config.client, "test-client");
		assert_eq!(config.client_url, "test-client-url");
	}

	#[test]
	fn source_falls_back_to_client() {
		let mut deps = deps(Arc::new(RecordingSender::default()));
		deps.hostname = Arc::new(StaticHostname(None));

		let receiver = with_secrets(
			config("pagerduty", json!({"client": "test-client"})),
			&[("integrationKey", "test-api-key")],
		);
		let config = Config::new(&receiver, &deps).unwrap();
		assert_eq!(config.source, "test-client");
		assert_eq!(config.client, "test-client");
	}

	#[tokio::test]
	async fn trigger_event() {
		let sender = Arc::new(RecordingSender::default());
		let mut deps = deps(sender.clone());
		deps.images = Arc::new(StaticImageStore(HashMap::from([(
			"alert1".to_owned(),
			"http://img/1.png".to_owned(),
		)])));

		let notifier =
			PagerdutyNotifier::new(&config("pagerduty", json!({"integrationKey": "abcdefgh0123456789"})), deps)
				.unwrap();

		let alerts = [alert(&[("alertname", "alert1"), ("lbl1", "val1")], &[("ann1", "annv1")])];
		notifier.notify(&ctx(), &alerts).await.unwrap();

		let body = sender.single_json();
		assert_eq!(sender.requests()[0].url, EVENTS_URL);
		assert_eq!(body["routing_key"], "abcdefgh0123456789");
		assert_eq!(body["dedup_key"], hash_key("alertname"));
		assert_eq!(body["event_action"], "trigger");
		assert_eq!(body["client"], "Grafana");
		assert_eq!(body["client_url"], "http://localhost");
		assert_eq!(body["links"], json!([{"href": "http://localhost", "text": "External URL"}]));
		assert_eq!(body["images"], json!([{"src": "http://img/1.png"}]));

		let payload = &body["payload"];
		assert_eq!(payload["summary"], "[FIRING:1]  (val1)");
		assert_eq!(payload["source"], "Grafana-TEST-host");
		assert_eq!(payload["severity"], "critical");
		assert_eq!(payload["class"], "default");
		assert_eq!(payload["component"], "Grafana");
		assert_eq!(payload["group"], "default");
		assert_eq!(payload["custom_details"]["num_firing"], "1");
		assert_eq!(payload["custom_details"]["num_resolved"], "0");
		assert_eq!(payload["custom_details"]["resolved"], "");
		assert!(payload["custom_details"]["firing"].as_str().unwrap().contains(" - ann1 = annv1\n"));
	}

	#[tokio::test]
	async fn resolve_event_with_long_summary() {
		let sender = Arc::new(RecordingSender::default());
		let settings = json!({
			"integrationKey": "key",
			"summary": "{% for i in range(end=2000) %}x{% endfor %}",
			"severity": "{{ commonLabels.severity }}"
		});
		let notifier = PagerdutyNotifier::new(&config("pagerduty", settings), deps(sender.clone())).unwrap();

		let alerts = [alert(&[("alertname", "a"), ("severity", "WARNING")], &[]).resolved()];
		notifier.notify(&ctx(), &alerts).await.unwrap();

		let body = sender.single_json();
		assert_eq!(body["event_action"], "resolve");
		assert_eq!(body["payload"]["severity"], "warning");
		let summary = body["payload"]["summary"].as_str().unwrap();
		assert_eq!(summary.chars().count(), MAX_SUMMARY_LEN);
		assert!(summary.ends_with('…'));
		assert!(body.get("images").is_none());
	}

	#[test]
	fn truncate_keeps_short_text() {
		assert_eq!(truncate("abc".into(), 3), "abc");
		assert_eq!(truncate("abcd".into(), 3), "ab…");
	}
}
