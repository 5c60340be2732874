//! lookup of public images of the panel an alert belongs to
use async_trait::async_trait;

use crate::alert::{Alert, IMAGE_ANNOTATION};

#[async_trait]
/// Store of uploaded panel screenshots.
pub trait ImageStore: Send + Sync {
	/// public url of the image of `alert`, if there is one
	async fn image_url(&self, alert: &Alert) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// store without any images
pub struct UnavailableImageStore;

#[async_trait]
impl ImageStore for UnavailableImageStore {
	async fn image_url(&self, _: &Alert) -> Option<String> {
		None
	}
}

/// Copy of `alerts` with the public image urls attached as
/// [IMAGE_ANNOTATION]. Alerts without an image are left unchanged.
pub async fn with_images(store: &dyn ImageStore, alerts: &[Alert]) -> Vec<Alert> {
	let mut enriched = Vec::with_capacity(alerts.len());

	for alert in alerts {
		let mut alert = alert.clone();
		match store.image_url(&alert).await {
			Some(url) if !url.is_empty() => {
				alert.annotations.insert(IMAGE_ANNOTATION.to_owned(), url);
			}
			_ => {}
		}
		enriched.push(alert);
	}

	enriched
}
