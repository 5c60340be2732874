//! delivery of rendered payloads to one or several endpoints
use futures::future::join_all;

use crate::{
	error::{error_chain, DeliveryError},
	http_client::{HttpRequest, HttpResponse, HttpSender},
};

/// Send `request` to its single endpoint. Its failure is the overall failure.
pub async fn deliver(
	sender: &dyn HttpSender,
	request: HttpRequest,
) -> Result<HttpResponse, DeliveryError> {
	let url = request.url.clone();

	match sender.send(request).await {
		Ok(response) => {
			tracing::debug!("delivered notification to {url}");
			Ok(response)
		}
		Err(err) => {
			tracing::warn!("failed to deliver notification to {url}: {}", error_chain(&err));
			Err(err)
		}
	}
}

/// Send every request concurrently. Fails only if every endpoint failed, the
/// error then carries the number of attempted endpoints and the last failure.
/// Failures of single endpoints are logged and otherwise ignored.
pub async fn deliver_all(
	sender: &dyn HttpSender,
	requests: Vec<HttpRequest>,
) -> Result<(), DeliveryError> {
	if requests.is_empty() {
		return Err(DeliveryError::NoEndpoints);
	}

	let attempted = requests.len();
	let results = join_all(requests.into_iter().map(|request| deliver(sender, request))).await;

	let mut delivered = 0;
	let mut last = None;
	for result in results {
		match result {
			Ok(_) => delivered += 1,
			Err(err) => last = Some(err),
		}
	}

	match last {
		Some(last) if delivered == 0 => {
			Err(DeliveryError::AllFailed { attempted, last: Box::new(last) })
		}
		Some(last) => {
			tracing::info!(
				"delivered notification to {delivered} of {attempted} endpoints, last error: {}",
				error_chain(&last)
			);
			Ok(())
		}
		None => Ok(()),
	}
}
