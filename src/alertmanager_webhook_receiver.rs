//! http endpoint accepting alert groups in the alertmanager webhook format
//!
//! `POST /{receiver}` hands the body to the receiver of that name.
use std::{
	net::{IpAddr, SocketAddr, TcpListener},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::JsonRejection, Extension, Json, Path},
	http::StatusCode,
	routing::post,
	Router,
};
use once_cell::sync::OnceCell;
use prometheus::IntCounterVec;
use serde::Deserialize;

use crate::{
	alert,
	dispatcher::{DispatchError, Dispatcher, Outcome},
	error::error_chain,
	settings::Settings,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl AlertReceiverSettings {
	pub fn global() -> &'static Self {
		&Settings::global().alert_webhook_receiver
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

#[derive(Debug)]
/// prometheus meters of the endpoint
struct Metrics {
	/// deserialized alerts per receiver
	received_alerts: IntCounterVec,
	/// dispatched alert groups per receiver and outcome
	notifications: IntCounterVec,
}

static METRICS: OnceCell<Metrics> = OnceCell::new();

impl Metrics {
	fn global() -> Result<&'static Self, prometheus::Error> {
		METRICS.get_or_try_init(|| {
			use prometheus::{opts, register_int_counter_vec};

			let received_alerts = register_int_counter_vec!(
				opts!("received_alerts", "total number of deserialized alerts")
					.namespace("alertrelay")
					.subsystem("alertmanager_webhook"),
				&["receiver"]
			)?;

			let notifications = register_int_counter_vec!(
				opts!("notifications", "total number of dispatched alert groups")
					.namespace("alertrelay")
					.subsystem("alertmanager_webhook"),
				&["receiver", "outcome"]
			)?;

			Ok(Self { received_alerts, notifications })
		})
	}
}

struct State {
	dispatcher: Arc<Dispatcher>,
	metrics: &'static Metrics,
}

async fn alertmanager_receiver(
	Extension(state): Extension<Arc<State>>,
	Path(receiver): Path<String>,
	alert: Result<Json<alert::Data>, JsonRejection>,
) -> StatusCode {
	let State { dispatcher, metrics } = &*state;

	let data = match alert {
		Ok(Json(data)) => data,
		Err(err) => {
			tracing::debug!("failed to deserialize alert: {:?}", err);
			return StatusCode::BAD_REQUEST;
		}
	};

	let alerts = data.alerts.len() as u64;

	match dispatcher.dispatch(&receiver, data).await {
		Ok(outcome) => {
			metrics.received_alerts.with_label_values(&[&receiver]).inc_by(alerts);
			let outcome = match outcome {
				Outcome::Delivered => "delivered",
				Outcome::Skipped => "skipped",
			};
			metrics.notifications.with_label_values(&[&receiver, outcome]).inc();
			StatusCode::OK
		}
		Err(DispatchError::UnknownReceiver(_)) => {
			metrics.notifications.with_label_values(&["unknown", "unknown_receiver"]).inc();
			StatusCode::NOT_FOUND
		}
		Err(err) => {
			metrics.received_alerts.with_label_values(&[&receiver]).inc_by(alerts);
			metrics.notifications.with_label_values(&[&receiver, "failed"]).inc();
			tracing::error!("{}", error_chain(&err));
			StatusCode::BAD_GATEWAY
		}
	}
}

/// routes of the endpoint
pub fn router(dispatcher: Arc<Dispatcher>) -> Result<Router> {
	let metrics = Metrics::global().context("failed to register prometheus meters")?;
	let state = Arc::new(State { dispatcher, metrics });

	Ok(Router::new().route("/:receiver", post(alertmanager_receiver)).layer(Extension(state)))
}

/// serve the endpoint on `listener` until it crashes
pub async fn serve(dispatcher: Arc<Dispatcher>, listener: TcpListener) -> Result<()> {
	let app = router(dispatcher)?;

	axum::Server::from_tcp(listener)
		.context("can't listen for webhooks")?
		.serve(app.into_make_service())
		.await
		.context("alertmanager webhook endpoint crashed")?;

	Ok(())
}

pub async fn run_alertmanager_receiver(dispatcher: Arc<Dispatcher>) -> Result<()> {
	let addr = AlertReceiverSettings::global().to_socket_addr();
	let listener = TcpListener::bind(addr).with_context(|| format!("can't bind {addr}"))?;

	tracing::info!("listening for alertmanager webhooks on {addr}");

	serve(dispatcher, listener).await
}
