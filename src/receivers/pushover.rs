//! pushover receiver, sends form encoded messages to the pushover api
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{
	settings::{decode, integer, non_empty, or_default, secret},
	Base, Notifier, NotifierDeps, NotifyContext, ReceiverConfig,
};
use crate::{
	alert::Alert,
	alert_renderer::{DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED},
	delivery::deliver,
	error::{ConfigError, NotifyError},
	http_client::HttpRequest,
};

/// message api endpoint
pub const MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";

/// priority that repeats the notification until it's acknowledged
const EMERGENCY_PRIORITY: i64 = 2;
/// longest title pushover accepts, in characters
const MAX_TITLE_LEN: usize = 250;
/// longest message pushover accepts, in characters
const MAX_MESSAGE_LEN: usize = 1024;

#[derive(Debug, Deserialize)]
struct RawSettings {
	#[serde(rename = "userKey")]
	user_key: Option<String>,
	#[serde(rename = "apiToken")]
	api_token: Option<String>,
	priority: Option<Value>,
	#[serde(rename = "okPriority")]
	ok_priority: Option<Value>,
	retry: Option<Value>,
	expire: Option<Value>,
	device: Option<String>,
	sound: Option<String>,
	#[serde(rename = "okSound")]
	ok_sound: Option<String>,
	#[serde(rename = "uploadImage")]
	upload_image: Option<bool>,
	title: Option<String>,
	message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated pushover settings
pub struct Config {
	pub user_key: String,
	pub api_token: String,
	pub alerting_priority: i64,
	pub ok_priority: i64,
	/// seconds between retries of emergency notifications
	pub retry: i64,
	/// seconds until emergency notifications stop being retried
	pub expire: i64,
	pub device: Option<String>,
	pub alerting_sound: Option<String>,
	pub ok_sound: Option<String>,
	/// attach the alert image, not uploaded yet
	pub upload_image: bool,
	pub title: String,
	pub message: String,
}

impl Config {
	pub fn new(config: &ReceiverConfig) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;
		let secure = &config.secure_settings;

		let user_key = secret(secure, "userKey", raw.user_key).ok_or(ConfigError::MissingUserKey)?;
		let api_token = secret(secure, "apiToken", raw.api_token).ok_or(ConfigError::MissingApiToken)?;

		let alerting_priority = integer(raw.priority.as_ref(), "alerting priority")?.unwrap_or(0);
		let ok_priority = integer(raw.ok_priority.as_ref(), "OK priority")?.unwrap_or(0);

		// pushover ignores them unless the priority is an emergency
		let retry = integer(raw.retry.as_ref(), "retry").ok().flatten().unwrap_or(0);
		let expire = integer(raw.expire.as_ref(), "expire").ok().flatten().unwrap_or(0);

		Ok(Self {
			user_key,
			api_token,
			alerting_priority,
			ok_priority,
			retry,
			expire,
			device: non_empty(raw.device),
			alerting_sound: non_empty(raw.sound),
			ok_sound: non_empty(raw.ok_sound),
			upload_image: raw.upload_image.unwrap_or(true),
			title: or_default(raw.title, DEFAULT_TITLE_EMBED),
			message: or_default(raw.message, DEFAULT_MESSAGE_EMBED),
		})
	}
}

/// `text`, shortened to at most `max` characters
fn truncate(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((end, _)) => text[..end].to_owned(),
		None => text.to_owned(),
	}
}

/// sends one push notification per alert group
pub struct PushoverNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl PushoverNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config)?, deps })
	}
}

#[async_trait]
impl Notifier for PushoverNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending pushover notification to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let (data, _) = self.deps.view(ctx, alerts, 0).await;
		let mut session = self.deps.renderer.session(&data)?;
		let config = &self.config;

		let title = session.render(&config.title)?;
		let mut message = session.render(&config.message)?;
		if message.is_empty() {
			message = "(no details)".to_owned();
		}

		let (priority, sound) = if data.is_firing() {
			(config.alerting_priority, &config.alerting_sound)
		} else {
			(config.ok_priority, &config.ok_sound)
		};

		let body = {
			let mut form = url::form_urlencoded::Serializer::new(String::new());
			form.append_pair("user", &config.user_key)
				.append_pair("token", &config.api_token)
				.append_pair("title", &truncate(&title, MAX_TITLE_LEN))
				.append_pair("message", &truncate(&message, MAX_MESSAGE_LEN))
				.append_pair("priority", &priority.to_string())
				.append_pair("html", "1");

			if priority == EMERGENCY_PRIORITY {
				form.append_pair("retry", &config.retry.to_string())
					.append_pair("expire", &config.expire.to_string());
			}
			if !data.external_url.is_empty() {
				form.append_pair("url", &format!("{}/alerting/list", data.external_url.trim_end_matches('/')))
					.append_pair("url_title", "Show alert rule");
			}
			if let Some(device) = &config.device {
				form.append_pair("device", device);
			}
			if let Some(sound) = sound {
				form.append_pair("sound", sound);
			}

			form.finish()
		};

		deliver(self.deps.sender.as_ref(), HttpRequest::form(MESSAGES_URL, body)).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}
