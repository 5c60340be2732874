use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, log::LogSettings, receivers::ReceiverConfig,
	telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientSettings {
	/// timeout of a single outgoing request
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub timeout: Duration,
}

impl Default for HttpClientSettings {
	fn default() -> Self {
		Self { timeout: Duration::from_secs(30) }
	}
}

fn default_org_id() -> i64 {
	1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	/// base of the links in notifications
	#[serde(default)]
	pub external_url: String,
	#[serde(default = "default_org_id")]
	pub org_id: i64,
	/// glob of template files receiver templates can include
	pub templates: Option<String>,
	#[serde(default)]
	pub http_client: HttpClientSettings,
	pub receivers: Vec<ReceiverConfig>,
	pub alert_webhook_receiver: AlertReceiverSettings,
	pub telemetry_endpoint: TelemetryEndpointSettings,
	pub log: LogSettings,
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| match Self::load().context("failed to load config and command line arguments") {
			Ok(settings) => settings,
			Err(err) => {
				// tracing wasn't setup yet
				panic!("{:#?}", err);
			}
		})
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").unwrap_or("./config.yaml");

		let mut settings = Self::from_file(config_path)?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// Load settings from `path`. Environment variables prefixed with
	/// `ALERTRELAY` override them, nested keys are separated by `__`.
	pub fn from_file(path: &str) -> Result<Self> {
		Config::builder()
			.add_source(File::with_name(path))
			.add_source(Environment::with_prefix("ALERTRELAY").separator("__"))
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't load config")
	}
}
