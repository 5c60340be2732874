//! sends http requests for the notifiers and records metrics about them
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use prometheus::{HistogramVec, IntCounterVec};
use url::Url;

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// http basic authentication credentials
pub struct BasicAuth {
	pub user: String,
	pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// one outgoing request
pub struct HttpRequest {
	pub url: String,
	pub method: Method,
	pub body: Bytes,
	/// additional headers, sent in insertion order
	pub headers: IndexMap<String, String>,
	pub basic_auth: Option<BasicAuth>,
}

impl HttpRequest {
	/// `POST` request of a json body
	pub fn json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
		Self::post(url.into(), "application/json", body.into())
	}

	/// `POST` request of a form encoded body
	pub fn form(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
		Self::post(url.into(), "application/x-www-form-urlencoded", body.into())
	}

	fn post(url: String, content_type: &str, body: Bytes) -> Self {
		let mut headers = IndexMap::new();
		headers.insert("Content-Type".to_owned(), content_type.to_owned());

		Self { url, method: Method::POST, body, headers, basic_auth: None }
	}

	pub fn with_method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	pub fn with_basic_auth(mut self, basic_auth: Option<BasicAuth>) -> Self {
		self.basic_auth = basic_auth;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// response to a successful request
pub struct HttpResponse {
	pub status: u16,
	pub body: Bytes,
}

#[async_trait]
/// Capability of sending http requests. Any response with a non-2xx status is
/// a [DeliveryError::Status].
pub trait HttpSender: Send + Sync {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DeliveryError>;
}

#[derive(Debug, Clone)]
/// prometheus meters for the http client
struct Metrics {
	/// total number of http requests
	http_requests: IntCounterVec,
	/// total number of failed http requests
	http_requests_failed: IntCounterVec,
	/// time spent by http requests
	http_request_duration: HistogramVec,
}

static METRICS: OnceCell<Metrics> = OnceCell::new();

impl Metrics {
	/// meters shared by all senders, registered on first use
	fn global() -> Result<&'static Self, prometheus::Error> {
		METRICS.get_or_try_init(Self::new)
	}

	/// construct and register prometheus meters
	fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{
			exponential_buckets, histogram_opts, opts, register_histogram_vec,
			register_int_counter_vec,
		};

		let http_requests = register_int_counter_vec!(
			opts!("requests_total", "total number of http requests")
				.namespace("alertrelay")
				.subsystem("http_client"),
			&["host"]
		)?;

		let http_requests_failed = register_int_counter_vec!(
			opts!("requests_failed", "number of failed http requests")
				.namespace("alertrelay")
				.subsystem("http_client"),
			&["host", "status_code"]
		)?;

		let http_request_duration = register_histogram_vec!(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a http request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.subsystem("http_client")
			.namespace("alertrelay"),
			&["host"]
		)?;

		Ok(Self { http_requests, http_requests_failed, http_request_duration })
	}
}

#[derive(Debug, Clone)]
/// [HttpSender] backed by reqwest. Doesn't retry, retries are the business
/// of whoever calls the notifier.
pub struct ReqwestSender {
	/// http client
	client: reqwest::Client,
	/// prometheus meters for http requests
	metrics: &'static Metrics,
}

impl ReqwestSender {
	/// construct http client
	///
	/// # Arguments
	///
	/// * `timeout` - timeout of a single request, including reading the body
	pub fn new(timeout: Duration) -> anyhow::Result<Self> {
		use anyhow::Context;

		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(timeout)
				.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
				.build()
				.context("failed to build reqwest client")?,
			metrics: Metrics::global().context("failed to register prometheus meters")?,
		})
	}
}

#[async_trait]
impl HttpSender for ReqwestSender {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DeliveryError> {
		let url = Url::parse(&request.url)
			.map_err(|err| DeliveryError::InvalidRequest(format!("invalid url {:?}: {err}", request.url)))?;
		let host = url.host_str().unwrap_or_default().to_owned();

		let _timer = self.metrics.http_request_duration.with_label_values(&[&host]).start_timer();
		self.metrics.http_requests.with_label_values(&[&host]).inc();

		let mut builder = self.client.request(request.method, url).body(request.body);
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(auth) = &request.basic_auth {
			builder = builder.basic_auth(&auth.user, Some(&auth.password));
		}

		let response = match builder.send().await {
			Ok(response) => response,
			Err(err) => {
				self.metrics.http_requests_failed.with_label_values(&[&host, "none"]).inc();
				return Err(DeliveryError::Transport { url: request.url, source: Box::new(err) });
			}
		};

		let status = response.status();
		let body = response
			.bytes()
			.await
			.map_err(|err| DeliveryError::Transport { url: request.url.clone(), source: Box::new(err) })?;

		if !status.is_success() {
			self.metrics.http_requests_failed.with_label_values(&[&host, status.as_str()]).inc();
			return Err(DeliveryError::Status {
				url: request.url,
				status: status.as_u16(),
				body: String::from_utf8_lossy(&body).into_owned(),
			});
		}

		Ok(HttpResponse { status: status.as_u16(), body })
	}
}
