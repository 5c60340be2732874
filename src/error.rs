//! error kinds of the library, one enum per stage of a notification

use thiserror::Error;

#[derive(Debug, Error)]
/// invalid receiver settings, raised while constructing a notifier
pub enum ConfigError {
	#[error("failed to unmarshal settings")]
	Unmarshal(#[source] serde_json::Error),
	#[error("required field 'url' is not specified")]
	MissingUrl,
	#[error("could not find url property in settings")]
	UrlNotFound,
	#[error("invalid url {url:?}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},
	#[error("could not find integration key property in settings")]
	MissingIntegrationKey,
	#[error("user key not found")]
	MissingUserKey,
	#[error("API token not found")]
	MissingApiToken,
	#[error("could not find kafka rest proxy endpoint property in settings")]
	MissingKafkaEndpoint,
	#[error("could not find kafka topic property in settings")]
	MissingKafkaTopic,
	#[error("kafka cluster id must be provided when using api version 3")]
	MissingKafkaClusterId,
	#[error("unsupported api version: {0}")]
	UnsupportedApiVersion(String),
	#[error("unsupported HTTP method {0:?}, only POST and PUT are permitted")]
	UnsupportedHttpMethod(String),
	#[error("both HTTP Basic Authentication and Authorization Header are set, only 1 is permitted")]
	ConflictingAuth,
	#[error("failed to convert {field} to integer")]
	NotNumeric { field: &'static str },
	#[error("unknown receiver type {0:?}")]
	UnknownReceiverType(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// a template couldn't be parsed or evaluated. contains the whole diagnostic
/// chain of the template engine.
#[error("failed to render template: {0}")]
pub struct RenderError(pub String);

/// boxed error of an [HttpSender](crate::http_client::HttpSender) transport
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
/// failed delivery to one or more endpoints
pub enum DeliveryError {
	#[error("failed to send request to {url}")]
	Transport {
		url: String,
		#[source]
		source: TransportError,
	},
	#[error("{url} responded with status {status}: {body}")]
	Status { url: String, status: u16, body: String },
	#[error("invalid request: {0}")]
	InvalidRequest(String),
	#[error("delivery to all {attempted} endpoints failed")]
	AllFailed {
		attempted: usize,
		#[source]
		last: Box<DeliveryError>,
	},
	#[error("no endpoints to deliver to")]
	NoEndpoints,
}

#[derive(Debug, Error)]
/// outcome of a failed notify call
pub enum NotifyError {
	#[error(transparent)]
	Render(#[from] RenderError),
	#[error("notification was not delivered")]
	Delivery(#[from] DeliveryError),
	#[error("failed to serialize payload")]
	Serialize(#[from] serde_json::Error),
}

/// Format `err` and all of its sources, separated by `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
	let mut text = err.to_string();
	let mut source = err.source();
	while let Some(err) = source {
		let next = err.to_string();
		if !text.ends_with(&next) {
			text.push_str(": ");
			text.push_str(&next);
		}
		source = err.source();
	}
	text
}
