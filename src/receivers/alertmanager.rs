//! forwards alerts to one or more other alertmanagers
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{
	settings::{decode, non_empty, secret},
	Base, Notifier, NotifierDeps, NotifyContext, ReceiverConfig,
};
use crate::{
	alert::Alert,
	delivery::deliver_all,
	error::{ConfigError, NotifyError},
	http_client::{BasicAuth, HttpRequest},
	images::with_images,
};

/// path of the alert ingestion api, relative to an alertmanager url
const ALERTS_PATH: &str = "api/v1/alerts";

#[derive(Debug, Deserialize)]
struct RawSettings {
	url: Option<String>,
	#[serde(rename = "basicAuthUser")]
	basic_auth_user: Option<String>,
	#[serde(rename = "basicAuthPassword")]
	basic_auth_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated alertmanager settings
pub struct Config {
	/// alert ingestion endpoints
	pub urls: Vec<Url>,
	pub basic_auth: Option<BasicAuth>,
}

impl Config {
	pub fn new(config: &ReceiverConfig) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;

		let urls = non_empty(raw.url)
			.ok_or(ConfigError::UrlNotFound)?
			.split(',')
			.map(str::trim)
			.filter(|url| !url.is_empty())
			.map(|url| {
				Url::parse(&format!("{}/{ALERTS_PATH}", url.trim_end_matches('/')))
					.map_err(|source| ConfigError::InvalidUrl { url: url.to_owned(), source })
			})
			.collect::<Result<Vec<_>, _>>()?;

		if urls.is_empty() {
			return Err(ConfigError::UrlNotFound);
		}

		let user = non_empty(raw.basic_auth_user);
		let password = secret(&config.secure_settings, "basicAuthPassword", raw.basic_auth_password);

		let basic_auth = user.map(|user| BasicAuth { user, password: password.unwrap_or_default() });

		Ok(Self { urls, basic_auth })
	}
}

/// sends alerts to every configured alertmanager, delivered if at least one
/// accepted them
pub struct AlertmanagerNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl AlertmanagerNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config)?, deps })
	}
}

#[async_trait]
impl Notifier for AlertmanagerNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, _: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending alertmanager alert to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let alerts = with_images(self.deps.images.as_ref(), alerts).await;
		let body = bytes::Bytes::from(serde_json::to_vec(&alerts)?);

		let requests = self
			.config
			.urls
			.iter()
			.map(|url| {
				HttpRequest::json(url.as_str(), body.clone()).with_basic_auth(self.config.basic_auth.clone())
			})
			.collect();

		deliver_all(self.deps.sender.as_ref(), requests).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}
