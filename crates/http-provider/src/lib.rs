//! HTTP plumbing shared by the bundled model providers: the error type,
//! optional retries with exponential backoff, and the mapping of failed
//! responses to error kinds.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

use backoff::ExponentialBackoff;
use reqwest::{RequestBuilder, Response, StatusCode};
use xylos_model::{ErrorKind, ModelProviderError};

/// Extracts a readable message from the body of a failed response.
pub type DescribeErrorBody = fn(&str) -> Option<String>;

/// Error type for the HTTP-based providers.
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<StatusCode>,
}

impl Error {
    /// Creates an error that did not come from an HTTP status.
    #[inline]
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status the server answered with, if any.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn from_status(
        status: StatusCode,
        body: String,
        describe: DescribeErrorBody,
    ) -> Self {
        let detail = describe(&body).unwrap_or(body);
        let kind = match status {
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
            _ => ErrorKind::Provider,
        };
        Self {
            message: format!("{status}: {detail}"),
            kind,
            status: Some(status),
        }
    }

    fn is_transient(&self) -> bool {
        self.kind.is_transient()
            || self.status.is_some_and(|status| status.is_server_error())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Sends a request and checks its status, retrying transient failures
/// until `retry_timeout` has elapsed. `None` sends it exactly once.
///
/// Bodies of failed responses are turned into messages by `describe`.
pub async fn send(
    request: RequestBuilder,
    retry_timeout: Option<Duration>,
    describe: DescribeErrorBody,
) -> Result<Response, Error> {
    send_with_retry(retry_timeout, move || {
        let attempt = request.try_clone();
        async move {
            let Some(attempt) = attempt else {
                return Err(Error::new(
                    "request body cannot be replayed",
                    ErrorKind::Provider,
                ));
            };
            check_response(attempt.send().await, describe).await
        }
    })
    .await
}

/// Runs `attempt` until it succeeds, fails permanently, or `retry_timeout`
/// has elapsed. Network errors, rate limits and server errors are
/// transient.
pub async fn send_with_retry<T, F, Fut>(
    retry_timeout: Option<Duration>,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let Some(retry_timeout) = retry_timeout else {
        return attempt().await;
    };
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(retry_timeout),
        ..Default::default()
    };
    backoff::future::retry(policy, || {
        let fut = attempt();
        async move {
            fut.await.map_err(|err| {
                if err.is_transient() {
                    debug!("transient failure, will retry: {err}");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

async fn check_response(
    resp_or_err: reqwest::Result<Response>,
    describe: DescribeErrorBody,
) -> Result<Response, Error> {
    let resp = resp_or_err
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Network))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let err = Error::from_status(status, body, describe);
    warn!("server answered {}", err.message);
    Err(err)
}
