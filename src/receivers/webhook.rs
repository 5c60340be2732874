//! generic webhook receiver, posts the whole alert view as json
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
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
	extended::ExtendedData,
	http_client::{BasicAuth, HttpRequest},
};

const DEFAULT_AUTHORIZATION_SCHEME: &str = "Bearer";

#[derive(Debug, Deserialize)]
struct RawSettings {
	url: Option<String>,
	#[serde(rename = "httpMethod")]
	http_method: Option<String>,
	username: Option<String>,
	password: Option<String>,
	authorization_scheme: Option<String>,
	authorization_credentials: Option<String>,
	#[serde(rename = "maxAlerts")]
	max_alerts: Option<Value>,
	title: Option<String>,
	message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated webhook settings
pub struct Config {
	/// url template
	pub url: String,
	pub http_method: Method,
	pub basic_auth: Option<BasicAuth>,
	/// value of the `Authorization` header
	pub authorization: Option<String>,
	/// 0 for no limit
	pub max_alerts: usize,
	pub title: String,
	pub message: String,
}

impl Config {
	pub fn new(config: &ReceiverConfig) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;
		let secure = &config.secure_settings;

		let url = non_empty(raw.url).ok_or(ConfigError::MissingUrl)?;

		let http_method = match non_empty(raw.http_method).map(|method| method.to_uppercase()).as_deref() {
			None | Some("POST") => Method::POST,
			Some("PUT") => Method::PUT,
			Some(method) => return Err(ConfigError::UnsupportedHttpMethod(method.to_owned())),
		};

		let user = non_empty(raw.username);
		let password = secret(secure, "password", raw.password);
		let credentials = secret(secure, "authorization_credentials", raw.authorization_credentials);

		let basic_auth = match (user, password) {
			(Some(user), Some(password)) => Some(BasicAuth { user, password }),
			_ => None,
		};

		if basic_auth.is_some() && credentials.is_some() {
			return Err(ConfigError::ConflictingAuth);
		}

		let authorization = credentials.map(|credentials| {
			let scheme = or_default(raw.authorization_scheme, DEFAULT_AUTHORIZATION_SCHEME);
			format!("{scheme} {credentials}")
		});

		let max_alerts = integer(raw.max_alerts.as_ref(), "maxAlerts")?
			.and_then(|max| usize::try_from(max).ok())
			.unwrap_or(0);

		Ok(Self {
			url,
			http_method,
			basic_auth,
			authorization,
			max_alerts,
			title: or_default(raw.title, DEFAULT_TITLE_EMBED),
			message: or_default(raw.message, DEFAULT_MESSAGE_EMBED),
		})
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
/// body posted to the webhook
struct WebhookMessage<'a> {
	#[serde(flatten)]
	data: &'a ExtendedData,
	version: &'static str,
	group_key: &'a str,
	truncated_alerts: usize,
	org_id: i64,
	title: String,
	state: &'static str,
	message: String,
}

/// posts alert groups to an arbitrary http endpoint
pub struct WebhookNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl WebhookNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config)?, deps })
	}
}

#[async_trait]
impl Notifier for WebhookNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending webhook notification to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let (data, truncation) = self.deps.view(ctx, alerts, self.config.max_alerts).await;

		let mut session = self.deps.renderer.session(&data)?;
		let url = session.render(&self.config.url)?;
		let title = session.render(&self.config.title)?;
		let message = session.render(&self.config.message)?;

		let payload = WebhookMessage {
			data: &data,
			version: "1",
			group_key: &ctx.group_key,
			truncated_alerts: truncation.truncated,
			org_id: self.deps.org_id,
			title,
			state: if data.is_firing() { "alerting" } else { "ok" },
			message,
		};

		let mut request = HttpRequest::json(url, serde_json::to_vec(&payload)?)
			.with_method(self.config.http_method.clone())
			.with_basic_auth(self.config.basic_auth.clone());
		if let Some(authorization) = &self.config.authorization {
			request = request.with_header("Authorization", authorization.as_str());
		}

		deliver(self.deps.sender.as_ref(), request).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use serde_json::json;

	use super::*;
	use crate::{http_client::fake::RecordingSender, receivers::testing::*};

	const SILENCE_VAL1: &str = "http://localhost/alerting/silence/new?alertmanager=grafana&matcher=alertname%3Dalert1&matcher=lbl1%3Dval1";
	const SILENCE_VAL2: &str = "http://localhost/alerting/silence/new?alertmanager=grafana&matcher=alertname%3Dalert1&matcher=lbl1%3Dval2";

	fn webhook(settings: Value) -> (WebhookNotifier, Arc<RecordingSender>) {
		let sender = Arc::new(RecordingSender::default());
		let notifier = WebhookNotifier::new(&config("webhook", settings), deps(sender.clone())).unwrap();
		(notifier, sender)
	}

	fn dashboard_alert() -> Alert {
		alert(
			&[("alertname", "alert1"), ("lbl1", "val1")],
			&[("ann1", "annv1"), ("__dashboardUid__", "abcd"), ("__panelId__", "efgh")],
		)
	}

	fn three_alerts() -> Vec<Alert> {
		vec![
			alert(&[("alertname", "alert1"), ("lbl1", "val1")], &[("ann1", "annv1")]),
			alert(&[("alertname", "alert1"), ("lbl1", "val2")], &[("ann1", "annv2")]),
			alert(&[("alertname", "alert1"), ("lbl1", "val3")], &[("ann1", "annv3")]),
		]
	}

	#[tokio::test]
	async fn default_config_with_custom_message() {
		let (notifier, sender) = webhook(json!({"url": "http://localhost/test", "message": "Custom message"}));

		notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap();

		assert_eq!(
			sender.single_json(),
			json!({
				"receiver": "my_receiver",
				"status": "firing",
				"alerts": [{
					"status": "firing",
					"labels": {"alertname": "alert1", "lbl1": "val1"},
					"annotations": {"ann1": "annv1"},
					"fingerprint": "fac0861a85de433a",
					"silenceURL": SILENCE_VAL1,
					"dashboardURL": "http://localhost/d/abcd",
					"panelURL": "http://localhost/d/abcd?viewPanel=efgh"
				}],
				"groupLabels": {"alertname": ""},
				"commonLabels": {"alertname": "alert1", "lbl1": "val1"},
				"commonAnnotations": {"ann1": "annv1"},
				"externalURL": "http://localhost",
				"version": "1",
				"groupKey": "alertname",
				"truncatedAlerts": 0,
				"orgId": 1,
				"title": "[FIRING:1]  (val1)",
				"state": "alerting",
				"message": "Custom message"
			})
		);

		let request = &sender.requests()[0];
		assert_eq!(request.url, "http://localhost/test");
		assert_eq!(request.method, Method::POST);
		assert_eq!(request.basic_auth, None);
		assert!(request.headers.get("Authorization").is_none());
	}

	#[tokio::test]
	async fn custom_title_with_truncation() {
		let (notifier, sender) = webhook(json!({
			"url": "http://localhost/test1",
			"title": "Alerts firing: {{ alerts | firing | length }}",
			"username": "user1",
			"password": "mysecret",
			"httpMethod": "PUT",
			"maxAlerts": "2"
		}));

		notifier.notify(&ctx(), &three_alerts()).await.unwrap();

		let body = sender.single_json();
		assert_eq!(body["alerts"].as_array().unwrap().len(), 2);
		assert_eq!(body["alerts"][1]["fingerprint"], "fab6861a85d5eeb5");
		assert_eq!(body["truncatedAlerts"], 1);
		assert_eq!(body["commonLabels"], json!({"alertname": "alert1"}));
		assert_eq!(body["commonAnnotations"], json!({}));
		assert_eq!(body["title"], "Alerts firing: 2");
		assert_eq!(
			body["message"],
			format!(
				"**Firing**\n\nValue: [no value]\nLabels:\n - alertname = alert1\n - lbl1 = val1\nAnnotations:\n - ann1 = annv1\nSilence: {SILENCE_VAL1}\n\
				 \nValue: [no value]\nLabels:\n - alertname = alert1\n - lbl1 = val2\nAnnotations:\n - ann1 = annv2\nSilence: {SILENCE_VAL2}\n"
			)
		);

		let request = &sender.requests()[0];
		assert_eq!(request.method, Method::PUT);
		assert_eq!(request.basic_auth, Some(BasicAuth { user: "user1".into(), password: "mysecret".into() }));
	}

	#[tokio::test]
	async fn templated_url() {
		let (notifier, sender) =
			webhook(json!({"url": "http://localhost/test?numAlerts={{ alerts | length }}&status={{ status }}"}));

		notifier.notify(&ctx(), &three_alerts()[..2]).await.unwrap();

		assert_eq!(sender.requests()[0].url, "http://localhost/test?numAlerts=2&status=firing");
		assert_eq!(sender.single_json()["title"], "[FIRING:2]  ");
	}

	#[tokio::test]
	async fn authorization_header() {
		let (notifier, sender) = webhook(json!({
			"url": "http://localhost/test1",
			"authorization_credentials": "mysecret",
			"maxAlerts": 2
		}));
		notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap();

		let request = &sender.requests()[0];
		assert_eq!(request.headers["Authorization"], "Bearer mysecret");
		assert_eq!(
			sender.single_json()["message"],
			format!(
				"**Firing**\n\nValue: [no value]\nLabels:\n - alertname = alert1\n - lbl1 = val1\nAnnotations:\n - ann1 = annv1\nSilence: {SILENCE_VAL1}\nDashboard: http://localhost/d/abcd\nPanel: http://localhost/d/abcd?viewPanel=efgh\n"
			)
		);

		let (notifier, sender) = webhook(json!({
			"url": "http://localhost/test1",
			"authorization_scheme": "test-auth-scheme",
			"authorization_credentials": "mysecret"
		}));
		notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap();
		assert_eq!(sender.requests()[0].headers["Authorization"], "test-auth-scheme mysecret");
	}

	#[tokio::test]
	async fn bad_template_aborts_before_sending() {
		let (notifier, sender) = webhook(json!({"url": "http://localhost/test1?numAlerts={{ alerts | nosuchfilter }}"}));

		let err = notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap_err();
		assert!(matches!(err, NotifyError::Render(_)));
		assert!(err.to_string().contains("nosuchfilter"), "{err}");
		assert!(sender.requests().is_empty());
	}

	#[tokio::test]
	async fn undefined_function_aborts_before_sending() {
		let (notifier, sender) = webhook(json!({"url": "http://localhost/test", "message": "{{ nosuchfn() }}"}));

		let err = notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap_err();
		assert!(matches!(err, NotifyError::Render(_)));
		assert!(err.to_string().contains("Function 'nosuchfn' not found"), "{err}");
		assert!(sender.requests().is_empty());
	}

	#[tokio::test]
	async fn empty_batch_is_delivered_without_sending() {
		let (notifier, sender) = webhook(json!({"url": "http://localhost/test"}));
		notifier.notify(&ctx(), &[]).await.unwrap();
		assert!(sender.requests().is_empty());
	}

	#[tokio::test]
	async fn failed_delivery_is_an_error() {
		let sender = Arc::new(RecordingSender::failing(["http://localhost/test"]));
		let notifier =
			WebhookNotifier::new(&config("webhook", json!({"url": "http://localhost/test"})), deps(sender)).unwrap();

		let err = notifier.notify(&ctx(), &[dashboard_alert()]).await.unwrap_err();
		assert!(matches!(err, NotifyError::Delivery(_)));
	}

	#[tokio::test]
	async fn resolved_batch_state() {
		let (notifier, sender) = webhook(json!({"url": "http://localhost/test"}));
		notifier.notify(&ctx(), &[dashboard_alert().resolved()]).await.unwrap();

		let body = sender.single_json();
		assert_eq!(body["state"], "ok");
		assert_eq!(body["status"], "resolved");
		assert_eq!(body["title"], "[RESOLVED:1]  (val1)");
	}

	#[test]
	fn conflicting_auth() {
		let settings = json!({
			"url": "http://localhost/test1",
			"username": "user1",
			"password": "mysecret",
			"authorization_credentials": "mysecret",
			"httpMethod": "POST",
			"maxAlerts": "2"
		});
		let err = Config::new(&config("webhook", settings)).unwrap_err();
		assert_eq!(
			err.to_string(),
			"both HTTP Basic Authentication and Authorization Header are set, only 1 is permitted"
		);
	}

	#[test]
	fn settings_validation() {
		let err = Config::new(&config("webhook", json!({}))).unwrap_err();
		assert_eq!(err.to_string(), "required field 'url' is not specified");

		let err = Config::new(&config("webhook", json!({"url": "http://a", "httpMethod": "GET"}))).unwrap_err();
		assert!(matches!(err, ConfigError::UnsupportedHttpMethod(method) if method == "GET"));

		let err = Config::new(&config("webhook", json!({"url": "http://a", "maxAlerts": 1.5}))).unwrap_err();
		assert!(matches!(err, ConfigError::NotNumeric { field: "maxAlerts" }));

		let config = Config::new(&config("webhook", json!({"url": "http://a", "httpMethod": "put"}))).unwrap();
		assert_eq!(config.http_method, Method::PUT);
		assert_eq!(config.title, DEFAULT_TITLE_EMBED);
		assert_eq!(config.message, DEFAULT_MESSAGE_EMBED);
		assert_eq!(config.max_alerts, 0);
	}

	#[test]
	fn secrets_override_settings() {
		let receiver = with_secrets(
			config("webhook", json!({"url": "http://a", "authorization_credentials": "plain"})),
			&[("authorization_credentials", "secret")],
		);
		let config = Config::new(&receiver).unwrap();
		assert_eq!(config.authorization.as_deref(), Some("Bearer secret"));
	}
}
