//! alertmanager webhook receiver that renders alerts and relays them to
//! notification services
//!
//! Features:
//! - forwards different webhook url paths to different receivers
//! - per receiver tera templates with the alert view as context
//! - webhooks, alertmanager, pagerduty, kafka, google chat and pushover

use std::sync::Arc;

use alertrelay::{
	alert_renderer::AlertRenderer, alertmanager_webhook_receiver, dispatcher::Dispatcher, hostname::SystemHostname,
	http_client::ReqwestSender, images::UnavailableImageStore, log, receivers::NotifierDeps, settings::Settings,
	telemetry_endpoint,
};
use anyhow::{anyhow, Context, Result};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// construct the notifiers of all configured receivers
fn dispatcher(settings: &Settings) -> Result<Dispatcher> {
	let sender = ReqwestSender::new(settings.http_client.timeout).context("failed to construct http client")?;

	let renderer = AlertRenderer::new(settings.templates.as_deref()).context("failed to load templates")?;

	let deps = NotifierDeps {
		sender: Arc::new(sender),
		images: Arc::new(UnavailableImageStore),
		renderer: Arc::new(renderer),
		hostname: Arc::new(SystemHostname),
		external_url: settings.external_url.clone(),
		org_id: settings.org_id,
	};

	Dispatcher::new(&settings.receivers, deps)
		.map_err(|(name, err)| anyhow!(err).context(format!("invalid receiver {name}")))
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let dispatcher = Arc::new(dispatcher(Settings::global())?);

	for receiver in dispatcher.receivers() {
		tracing::info!("receiver {receiver} ready");
	}

	tokio::spawn(async move {
		#[allow(clippy::expect_used)]
		alertmanager_webhook_receiver::run_alertmanager_receiver(dispatcher)
			.await
			.expect("alertmanager webhook endpoint failed to start or crashed");
	});

	telemetry_endpoint::run_telemetry_endpoint().await
}
