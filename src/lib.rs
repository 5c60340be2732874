//! Renders grouped alerts through templates and delivers them to receivers:
//! generic webhooks, alertmanager instances, PagerDuty, Kafka REST proxies,
//! Google Chat and Pushover.
//!
//! An alert batch is turned into an [extended view](extended::ExtendedData),
//! the receiver's templates are rendered against it by the
//! [renderer](alert_renderer::AlertRenderer) and the resulting payload is
//! [delivered](delivery) to one or more endpoints.

pub mod alert;
pub mod alert_renderer;
pub mod alertmanager_webhook_receiver;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod extended;
pub mod fingerprint;
pub mod hostname;
pub mod http_client;
pub mod images;
pub mod log;
pub mod receivers;
pub mod settings;
pub mod telemetry_endpoint;
