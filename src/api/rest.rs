use crate::error::{FirebaseError, IsRetryable};
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub(crate) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Append percent-encoded path segments to a base URL.
pub(crate) fn endpoint_url<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, FirebaseError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FirebaseError::UrlParse(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Run one REST call, retrying transient failures.
pub(crate) async fn send_with_retry<T, F, Fut>(operation: &str, call: F) -> Result<T, FirebaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FirebaseError>>,
{
    call.retry(default_retry_policy())
        .when(|e: &FirebaseError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("{} retrying after error {}, sleeping {:?}", operation, err, dur);
        })
        .await
}

/// Decode a success body, or map the Google error envelope.
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, FirebaseError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.bytes().await?;
        return Err(FirebaseError::from_api_body(status, &body));
    }
    Ok(resp.json::<T>().await?)
}

pub(crate) async fn read_empty(resp: reqwest::Response) -> Result<(), FirebaseError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.bytes().await?;
        return Err(FirebaseError::from_api_body(status, &body));
    }
    Ok(())
}
