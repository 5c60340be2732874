//! routes incoming alert groups to the configured notifiers
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
	alert,
	error::{ConfigError, NotifyError},
	receivers::{self, Notifier, NotifierDeps, NotifyContext, ReceiverConfig},
};

#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("no receiver named {0:?}")]
	UnknownReceiver(String),
	#[error("receiver {receiver} failed")]
	Notify {
		receiver: String,
		#[source]
		source: NotifyError,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// what happened to a dispatched alert group
pub enum Outcome {
	Delivered,
	/// nothing left to send after dropping resolved alerts
	Skipped,
}

/// all notifiers by receiver name
pub struct Dispatcher {
	notifiers: IndexMap<String, Arc<dyn Notifier>>,
}

impl Dispatcher {
	/// Construct a notifier for every receiver. Fails on the first invalid
	/// receiver.
	pub fn new(receivers: &[ReceiverConfig], deps: NotifierDeps) -> Result<Self, (String, ConfigError)> {
		let mut notifiers = IndexMap::with_capacity(receivers.len());

		for config in receivers {
			let notifier = receivers::build(config, deps.clone()).map_err(|err| (config.name.clone(), err))?;
			if notifiers.insert(config.name.clone(), notifier).is_some() {
				tracing::warn!("receiver {} is configured more than once, using the last one", config.name);
			}
		}

		Ok(Self { notifiers })
	}

	pub fn receivers(&self) -> impl Iterator<Item = &str> {
		self.notifiers.keys().map(String::as_str)
	}

	/// Hand the alert group `data` to the receiver `receiver`. Resolved
	/// alerts are dropped for receivers that don't send resolve messages.
	pub async fn dispatch(&self, receiver: &str, data: alert::Data) -> Result<Outcome, DispatchError> {
		let notifier =
			self.notifiers.get(receiver).ok_or_else(|| DispatchError::UnknownReceiver(receiver.to_owned()))?;

		let mut alerts = data.alerts;
		if !notifier.send_resolved() {
			alerts.retain(alert::Alert::is_firing);
		}
		if alerts.is_empty() {
			tracing::debug!("no alerts left to send to {receiver}");
			return Ok(Outcome::Skipped);
		}

		let ctx = NotifyContext {
			group_key: data.group_key,
			group_labels: data.group_labels,
			receiver_name: receiver.to_owned(),
		};

		notifier
			.notify(&ctx, &alerts)
			.await
			.map_err(|source| DispatchError::Notify { receiver: receiver.to_owned(), source })?;

		tracing::info!("delivered {} alerts to {receiver}", alerts.len());

		Ok(Outcome::Delivered)
	}
}
