//! A model provider for the Gemini `generateContent` API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, header};
use xylos_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{GeminiConfig, GeminiConfigBuilder};
use proto::GenerateContentResponse;
pub use response::GeminiResponse;
pub use xylos_http_provider::Error;

/// Gemini model provider.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: Client,
    config: Arc<GeminiConfig>,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with the given configuration.
    #[inline]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn build_http_request(&self, req: &ModelRequest) -> RequestBuilder {
        let gemini_req = proto::create_request(req);
        let builder = self
            .client
            .post(self.config.generate_url())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&gemini_req);
        match &self.config.api_key {
            Some(api_key) => builder.header("x-goog-api-key", api_key),
            None => builder,
        }
    }
}

impl ModelProvider for GeminiProvider {
    type Error = Error;
    type Response = GeminiResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let http_req = self.build_http_request(req);
        let retry_timeout = self.config.retry_timeout;

        async move {
            let resp = xylos_http_provider::send(
                http_req,
                retry_timeout,
                proto::describe_error_body,
            )
            .await?;

            let body = resp
                .bytes()
                .await
                .map_err(|err| {
                    Error::new(format!("{err}"), ErrorKind::Network)
                })?;
            let body: GenerateContentResponse = serde_json::from_slice(&body)
                .map_err(|err| {
                    Error::new(
                        format!("malformed reply: {err}"),
                        ErrorKind::Provider,
                    )
                })?;
            let resp = GeminiResponse::from_body(body);
            if let Err(err) = &resp {
                warn!("reply rejected ({:?}): {err}", err.kind());
            }
            resp
        }
    }
}
