//! A reqwest-backed implementation of the chat backend protocol.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use brook_api::{
    BackendError, ChatBackend, ChatRequest, ErrorKind, HistorySummary,
    HistoryStore, StoredMessage,
};
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};

pub use config::{BackendConfig, BackendConfigBuilder};
use io::{Chunks, NdjsonLines};
pub use response::HttpChatStream;

/// Error type for [`HttpBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The remote chat backend, reached over HTTP.
///
/// One instance serves both the streaming chat endpoint and the history
/// directory endpoints; every request carries the configured bearer
/// credential.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<BackendConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    #[inline]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn get(
        &self,
        url: String,
    ) -> impl Future<Output = reqwest::Result<Response>> + Send + 'static {
        self.client
            .get(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.token),
            )
            .send()
    }
}

impl ChatBackend for HttpBackend {
    type Error = Error;
    type Stream = HttpChatStream;

    fn send_chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url, "/api/stream-chat"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.token),
            )
            .header(header::ACCEPT, "application/x-ndjson")
            .json(req)
            .send();

        async move {
            let resp = check_status(resp_fut.await)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    matches!(m.subtype().as_str(), "x-ndjson" | "json")
                })
                .unwrap_or(true);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Decode,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let lines = NdjsonLines::new(chunks);
            Ok(HttpChatStream::from_lines(lines))
        }
    }
}

impl HistoryStore for HttpBackend {
    type Error = Error;

    fn list(
        &self,
    ) -> impl Future<Output = Result<Vec<HistorySummary>, Self::Error>> + Send + 'static
    {
        let resp_fut =
            self.get(format!("{}{}", self.config.base_url, "/api/chat-histories"));
        async move {
            let resp = check_status(resp_fut.await)?;
            let payload = decode::<proto::HistoryListPayload>(resp).await?;
            Ok(payload.histories)
        }
    }

    fn detail(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, Self::Error>> + Send + 'static
    {
        let resp_fut = self.get(format!(
            "{}/api/chat-history/{history_id}",
            self.config.base_url
        ));
        async move {
            let resp = check_status(resp_fut.await)?;
            let payload = decode::<proto::HistoryDetailPayload>(resp).await?;
            Ok(payload.messages)
        }
    }

    fn delete(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let resp_fut = self
            .client
            .delete(format!(
                "{}/api/chat-history/{history_id}",
                self.config.base_url
            ))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.token),
            )
            .send();
        async move {
            check_status(resp_fut.await)?;
            Ok(())
        }
    }

    fn models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        let resp_fut =
            self.get(format!("{}{}", self.config.base_url, "/api/models"));
        async move {
            let resp = check_status(resp_fut.await)?;
            let payload = decode::<proto::ModelsPayload>(resp).await?;
            Ok(payload.models)
        }
    }
}

fn check_status(
    resp_res: reqwest::Result<Response>,
) -> Result<Response, Error> {
    resp_res
        .and_then(Response::error_for_status)
        .map_err(|err| {
            let kind = if err.status() == Some(StatusCode::UNAUTHORIZED) {
                ErrorKind::Unauthorized
            } else {
                ErrorKind::Http
            };
            Error::new(format!("{err}"), kind)
        })
}

async fn decode<T: serde::de::DeserializeOwned>(
    resp: Response,
) -> Result<T, Error> {
    resp.json::<T>()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Decode))
}
