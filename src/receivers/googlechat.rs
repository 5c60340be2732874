//! google chat receiver, posts a card to an incoming webhook
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
	settings::{decode, non_empty, or_default},
	Base, Notifier, NotifierDeps, NotifyContext, ReceiverConfig,
};
use crate::{
	alert::Alert,
	alert_renderer::{DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED},
	delivery::deliver,
	error::{ConfigError, NotifyError},
	http_client::HttpRequest,
};

#[derive(Debug, Deserialize)]
struct RawSettings {
	url: Option<String>,
	title: Option<String>,
	message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// validated google chat settings
pub struct Config {
	/// url template of the incoming webhook
	pub url: String,
	pub title: String,
	pub message: String,
}

impl Config {
	pub fn new(config: &ReceiverConfig) -> Result<Self, ConfigError> {
		let raw: RawSettings = decode(&config.settings)?;

		Ok(Self {
			url: non_empty(raw.url).ok_or(ConfigError::UrlNotFound)?,
			title: or_default(raw.title, DEFAULT_TITLE_EMBED),
			message: or_default(raw.message, DEFAULT_MESSAGE_EMBED),
		})
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Message {
	preview_text: String,
	fallback_text: String,
	cards: Vec<Card>,
}

#[derive(Debug, Serialize)]
struct Card {
	header: Header,
	sections: Vec<Section>,
}

#[derive(Debug, Serialize)]
struct Header {
	title: String,
}

#[derive(Debug, Serialize)]
struct Section {
	widgets: Vec<Widget>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Widget {
	TextParagraph { text: String },
	Buttons(Vec<Button>),
	Image {
		#[serde(rename = "imageUrl")]
		image_url: String,
	},
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Button {
	text_button: TextButton,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextButton {
	text: &'static str,
	on_click: OnClick,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OnClick {
	open_link: OpenLink,
}

#[derive(Debug, Serialize)]
struct OpenLink {
	url: String,
}

/// posts one card per alert group
pub struct GoogleChatNotifier {
	base: Base,
	config: Config,
	deps: NotifierDeps,
}

impl GoogleChatNotifier {
	pub fn new(config: &ReceiverConfig, deps: NotifierDeps) -> Result<Self, ConfigError> {
		Ok(Self { base: Base::new(config), config: Config::new(config)?, deps })
	}
}

#[async_trait]
impl Notifier for GoogleChatNotifier {
	fn name(&self) -> &str {
		&self.base.name
	}

	async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), NotifyError> {
		tracing::debug!("sending google chat card to {}", self.base.name);
		if alerts.is_empty() {
			return Ok(());
		}

		let (data, _) = self.deps.view(ctx, alerts, 0).await;
		let mut session = self.deps.renderer.session(&data)?;
		let url = session.render(&self.config.url)?;
		let title = session.render(&self.config.title)?;
		let message = session.render(&self.config.message)?;

		let mut widgets = Vec::new();
		if !message.is_empty() {
			widgets.push(Widget::TextParagraph { text: message });
		}
		if !data.external_url.is_empty() {
			widgets.push(Widget::Buttons(vec![Button {
				text_button: TextButton {
					text: "OPEN IN GRAFANA",
					on_click: OnClick { open_link: OpenLink { url: data.external_url.clone() } },
				},
			}]));
		}
		if let Some(image_url) = data.alerts.iter().find_map(|alert| alert.image_url.clone()) {
			widgets.push(Widget::Image { image_url });
		}
		widgets.push(Widget::TextParagraph {
			text: format!(
				"{} v{} | {}",
				env!("CARGO_PKG_NAME"),
				env!("CARGO_PKG_VERSION"),
				Utc::now().format("%d %b %y %H:%M UTC")
			),
		});

		let card = Message {
			preview_text: title.clone(),
			fallback_text: title.clone(),
			cards: vec![Card { header: Header { title }, sections: vec![Section { widgets }] }],
		};

		deliver(self.deps.sender.as_ref(), HttpRequest::json(url, serde_json::to_vec(&card)?)).await?;

		Ok(())
	}

	fn send_resolved(&self) -> bool {
		self.base.send_resolved()
	}
}
