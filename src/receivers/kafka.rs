//! kafka receiver, produces records through a kafka REST proxy
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
	settings::{decode, non_empty, or_default, secret},
	Base, Notifier, NotifierDeps, NotifyContext, ReceiverConfig,
};
use crate::{
	alert::Alert,
	alert_renderer::{DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED},
	delivery::deliver,
	error::{ConfigError, NotifyError},
	fingerprint::hash_key,
	http_client::{BasicAuth, HttpRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// version of the REST proxy api
pub enum ApiVersion {
	V2,
	V3,
}

impl ApiVersion {
	fn parse(version: Option<String>) -> Result<Self, ConfigError> {
		match non_empty(version).as_deref() {
			None | Some("v2") => Ok(Self::V2),
			Some("v3") => Ok(Self::V3),
			Some(version) => Err(ConfigError::UnsupportedApiVersion(version.to_owned())),
		}
	}
}

#[derive(Debug, Deserialize)]
struct RawSettings {
	#[serde(rename = "kafkaRestProxy")]
	endpoint: Option<String>,
	#[serde(rename = "kafkaTopic")]
	topic: Option<String>,
	description: Option<String>,
	details: Option<String>,
	username: Option<String>,
	password: Option<String>,
	#[serde(rename = "apiVersion")]
	api_version: Option<String>,
	#[serde(rename = "kafkaClusterId")]
	cluster_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated kafka settings
pub struct Config {
	/// REST proxy url, without trailing slash
	pub endpoint: String,
	pub topic: String,
	/// template of the record description
	pub description: String,
	/// template of the record details
	pub details: String,
	pub username: Option<String>,
	pub password: Option<String>,
	pub api_version: ApiVersion,
	/// required for [ApiVersion::V3]
	pub cluster_id: Option<String>,
}

impl Config {
	pub fn new(config: &ReceiverConfig) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;

		let endpoint = non_empty(raw.endpoint)
			.map(|endpoint| endpoint.trim_end_matches('/').to_owned())
			.ok_or(ConfigError::MissingKafkaEndpoint)?;
		let topic = non_empty(raw.topic).ok_or(ConfigError::MissingKafkaTopic)?;

		let api_version = ApiVersion::parse(raw.api_version)?;
		let cluster_id = non_empty(raw.cluster_id);
		if api_version == ApiVersion::V3 && cluster_id.is_none() {
			return Err(ConfigError::MissingKafkaClusterId);
		}

		Ok(Self {
			endpoint,
			topic,
			description: or_default(raw.description, DEFAULT_TITLE_EMBED),
			details: or_default(raw.details, DEFAULT_MESSAGE_EMBED),
			username: non_empty(raw.username),
			password: secret(&config.secure_settings, "password", raw.password),
			api_version,
			cluster_id,
		})
	}

	/// url records are posted to
	fn records_url(&self) -> String {
		match (&self.api_version, &self.cluster_id) {
			(ApiVersion::V3, Some(cluster_id)) => format!(
				"{}/kafka/v3/clusters/{cluster_id}/topics/{}/records",
				self.endpoint, self.topic
			),
			_ => format!("{}/topics/{}", self.endpoint, self.topic),
		}
	}
}

#[derive(Debug, Serialize)]
struct Record {
	alert_state: &'static str,
	client: &'static str,
	client_url: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	contexts: Vec<Context>,
	description: String,
	details: String,
	incident_key: String,
}

#[derive(Debug, Serialize)]
struct Context {
	#[serde(rename = "type")]
	kind: &'static str,
	src: String,
}

#[derive(Debug, Serialize)]
struct V2Body {
	records: [V2Record; 1],
}

#[derive(Debug, Serialize)]
struct V2Record {
	value: Record,
}

#[derive(Debug, Serialize)]
struct V3Body {
	value: V3Value,
}

#[derive(Debug, Serialize)]
struct V3Value {
	#[serde(rename = "type")]
	kind: &'static str,
	data: Record,
}

/// produces one record per alert group
pub struct KafkaNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl KafkaNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config)?, deps })
	}
}

#[async_trait]
impl Notifier for KafkaNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending kafka record to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let (data, _) = self.deps.view(ctx, alerts, 0).await;
		let mut session = self.deps.renderer.session(&data)?;

		let record = Record {
			alert_state: if data.is_firing() { "alerting" } else { "ok" },
			client: "Grafana",
			client_url: data.external_url.clone(),
			contexts: data
				.alerts
				.iter()
				.filter_map(|alert| alert.image_url.clone())
				.map(|src| Context { kind: "image", src })
				.collect(),
			description: session.render(&self.config.description)?,
			details: session.render(&self.config.details)?,
			incident_key: hash_key(&ctx.group_key),
		};

		let url = self.config.records_url();
		let request = match self.config.api_version {
			ApiVersion::V2 => {
				let body = serde_json::to_vec(&V2Body { records: [V2Record { value: record }] })?;
				HttpRequest::json(url, body)
					.with_header("Content-Type", "application/vnd.kafka.json.v2+json")
					.with_header("Accept", "application/vnd.kafka.v2+json")
			}
			ApiVersion::V3 => {
				let body = serde_json::to_vec(&V3Body { value: V3Value { kind: "JSON", data: record } })?;
				HttpRequest::json(url, body)
			}
		};

		let basic_auth = self.config.username.clone().map(|user| BasicAuth {
			user,
			password: self.config.password.clone().unwrap_or_default(),
		});

		deliver(self.deps.sender.as_ref(), request.with_basic_auth(basic_auth)).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}
