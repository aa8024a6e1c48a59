use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, field, instrument, warn, Span};

use crate::batch::encode_batch;
use crate::config::ConnectionConfig;
use crate::endpoint;
use crate::message::Message;
use crate::token::{an_hour_from_now, SasToken, TokenError};
use crate::util::http::{
    into_header_map, Client, ClientError, HeaderMap, Headers, InvalidUriError, Method, StatusCode,
    Uri,
};

#[derive(Debug, Error)]
pub enum RequestError {
    /// A feedback call was made with an empty lock token. Detected before
    /// any request is issued.
    #[error("invalid lock token")]
    InvalidLockToken,

    #[error("invalid request endpoint: {0}")]
    Endpoint(#[from] InvalidUriError),

    #[error("request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// The request failed before any response was received.
    #[error(transparent)]
    Transport(#[from] ClientError),

    /// The remote replied with a status of 300 or above. The response
    /// status and headers are kept for caller inspection.
    #[error("remote returned error: ({}) {reason}", .parts.status)]
    Status { parts: ResponseParts, reason: String },
}

/// Status and headers of a response, returned for every completed exchange.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// A successful exchange on the generic request path: the response parts
/// plus the response body wrapped as a [Message] and enriched from the hub
/// headers. Feedback operations return [ResponseParts] alone instead; they
/// never hand back a parsed message.
#[derive(Debug)]
pub struct Reply {
    pub parts: ResponseParts,
    pub message: Message,
}

/// Acknowledgement applied to a received message, addressed by lock token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAction {
    /// Re-enqueue the message so it may be received again later.
    Abandon,
    /// Delete the message from the queue and record that it was rejected.
    Reject,
    /// Delete the message from the queue and record that it was accepted.
    Complete,
}

#[derive(Debug, Error)]
#[error("unrecognized feedback action: {0}")]
pub struct ParseFeedbackActionError(String);

impl FromStr for FeedbackAction {
    type Err = ParseFeedbackActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abandon" => Ok(Self::Abandon),
            "reject" => Ok(Self::Reject),
            "complete" => Ok(Self::Complete),
            other => Err(ParseFeedbackActionError(other.to_owned())),
        }
    }
}

/// REST client for the hub.
///
/// Every operation takes the [ConnectionConfig] explicitly, issues exactly
/// one request carrying a freshly minted `Authorization` token, and is
/// independent of all others: no state survives between calls, so concurrent
/// calls are safe. There are no retries and no timeouts beyond what the
/// transport enforces (or the one configured via [HubClient::with_timeout]).
#[derive(Debug, Clone, Default)]
pub struct HubClient {
    client: Client,
}

impl HubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client enforcing `timeout` on every request.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::new(Some(timeout)),
        }
    }

    /// Send a single device-to-cloud event as the device named by
    /// `config.key_name`. Message properties travel as request headers.
    pub async fn send_event(
        &self,
        message: &Message,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let path = endpoint::event_path(&config.key_name);
        let token = SasToken::device(config, an_hour_from_now())?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), token.to_string());
        headers.insert("iothub-to".to_string(), path.clone());
        for (key, value) in message.properties() {
            headers.insert(key.clone(), value.clone());
        }

        self.round_trip(
            Method::POST,
            &path,
            headers,
            Some(message.body().to_vec()),
            config,
        )
        .await
    }

    /// Send several events in one request, serialized with [encode_batch].
    pub async fn send_event_batch(
        &self,
        messages: &[Message],
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let path = endpoint::event_path(&config.key_name);
        let token = SasToken::device(config, an_hour_from_now())?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), token.to_string());
        headers.insert("iothub-to".to_string(), path.clone());
        headers.insert(
            "Content-Type".to_string(),
            "application/vnd.microsoft.iothub.json".to_string(),
        );

        let body = encode_batch(messages).into_bytes();
        self.round_trip(Method::POST, &path, headers, Some(body), config)
            .await
    }

    /// Ask the hub for the next queued cloud-to-device message. An empty
    /// reply body means the queue had nothing for us; the lock token needed
    /// to acknowledge the message arrives on the reply's `etag` header.
    pub async fn receive(&self, config: &ConnectionConfig) -> Result<Reply, RequestError> {
        let path = endpoint::message_path(&config.key_name);
        let token = SasToken::device(config, an_hour_from_now())?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), token.to_string());
        headers.insert("iothub-to".to_string(), path.clone());

        self.round_trip(Method::GET, &path, headers, None, config)
            .await
    }

    /// Apply a feedback action to the message identified by `lock_token`.
    ///
    /// An empty lock token fails with [RequestError::InvalidLockToken]
    /// before any request is issued, whatever the action.
    pub async fn send_feedback(
        &self,
        action: FeedbackAction,
        lock_token: &str,
        config: &ConnectionConfig,
    ) -> Result<ResponseParts, RequestError> {
        if lock_token.is_empty() {
            return Err(RequestError::InvalidLockToken);
        }

        let base = endpoint::feedback_path(&config.key_name, lock_token);
        let (method, path) = match action {
            FeedbackAction::Abandon => (
                Method::POST,
                format!("{base}/abandon?{}", endpoint::VERSION_QUERY),
            ),
            FeedbackAction::Reject => (
                Method::DELETE,
                format!("{base}?{}&reject", endpoint::VERSION_QUERY),
            ),
            FeedbackAction::Complete => {
                (Method::DELETE, format!("{base}?{}", endpoint::VERSION_QUERY))
            }
        };

        self.feedback_round_trip(method, &path, lock_token, config)
            .await
    }

    /// Create a device registry entry at the caller-supplied path.
    pub async fn create_device<T: Serialize>(
        &self,
        path: &str,
        device_info: &T,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let body = serde_json::to_vec(device_info)?;
        let headers = self.device_headers(config, None)?;
        self.round_trip(Method::PUT, path, headers, Some(body), config)
            .await
    }

    /// Replace an existing device registry entry, whatever its revision.
    pub async fn update_device<T: Serialize>(
        &self,
        path: &str,
        device_info: &T,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let body = serde_json::to_vec(device_info)?;
        let headers = self.device_headers(config, Some("*"))?;
        self.round_trip(Method::PUT, path, headers, Some(body), config)
            .await
    }

    /// Read a single device registry entry.
    pub async fn get_device(
        &self,
        path: &str,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let headers = self.device_headers(config, None)?;
        self.round_trip(Method::GET, path, headers, None, config)
            .await
    }

    /// List device registry entries under the caller-supplied path.
    pub async fn list_devices(
        &self,
        path: &str,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let headers = self.device_headers(config, None)?;
        self.round_trip(Method::GET, path, headers, None, config)
            .await
    }

    /// Delete a device registry entry, whatever its revision.
    pub async fn delete_device(
        &self,
        path: &str,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let headers = self.device_headers(config, Some("*"))?;
        self.round_trip(Method::DELETE, path, headers, None, config)
            .await
    }

    /// Common headers for the device management operations. These are
    /// signed with the service-scoped token; `if_match` is set for the
    /// mutating calls.
    fn device_headers(
        &self,
        config: &ConnectionConfig,
        if_match: Option<&str>,
    ) -> Result<Headers, RequestError> {
        let token = SasToken::service(config, an_hour_from_now())?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), token.to_string());
        headers.insert("iothub-name".to_string(), config.hub_name.clone());
        if let Some(etag) = if_match {
            headers.insert("If-Match".to_string(), etag.to_string());
        }
        Ok(headers)
    }

    /// Generic request path: the version query is appended here, and a
    /// successful response body always comes back wrapped as a [Message]
    /// enriched from the hub headers.
    #[instrument(
        level = "debug",
        skip_all,
        fields(method = %method, path = %path, response = field::Empty)
    )]
    async fn round_trip(
        &self,
        method: Method,
        path: &str,
        headers: Headers,
        body: Option<Vec<u8>>,
        config: &ConnectionConfig,
    ) -> Result<Reply, RequestError> {
        let uri = Uri::from_parts(config.base_uri()?, path, Some(endpoint::VERSION_QUERY))?;

        debug!("calling remote");
        let response = self
            .client
            .request(method, &uri, move |request| {
                let mut request = request.headers(into_header_map(&headers)?);
                if let Some(body) = body {
                    request = request.body(body);
                }
                Ok(request)
            })
            .await?;

        let parts = ResponseParts {
            status: response.status(),
            headers: response.headers().clone(),
        };
        Span::current().record("response", field::display(parts.status));

        if parts.status.as_u16() >= 300 {
            warn!(
                response = field::display(parts.status),
                "received error response"
            );
            return Err(RequestError::Status {
                reason: reason_phrase(parts.status),
                parts,
            });
        }

        let mut message = Message::new(response.bytes().await?);
        message.apply_headers(&parts.headers);

        Ok(Reply { parts, message })
    }

    /// Feedback request path. The path arrives fully formed (nothing is
    /// appended) and success returns the response parts alone: feedback
    /// never produces a message.
    #[instrument(
        level = "debug",
        skip_all,
        fields(method = %method, path = %path, response = field::Empty)
    )]
    async fn feedback_round_trip(
        &self,
        method: Method,
        path: &str,
        lock_token: &str,
        config: &ConnectionConfig,
    ) -> Result<ResponseParts, RequestError> {
        let token = SasToken::device(config, an_hour_from_now())?;

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), token.to_string());
        headers.insert("If-Match".to_string(), lock_token.to_string());

        let uri = Uri::from_parts(config.base_uri()?, path, None)?;

        debug!("calling remote");
        let response = self
            .client
            .request(method, &uri, move |request| {
                Ok(request.headers(into_header_map(&headers)?))
            })
            .await?;

        let parts = ResponseParts {
            status: response.status(),
            headers: response.headers().clone(),
        };
        Span::current().record("response", field::display(parts.status));

        if parts.status.as_u16() >= 300 {
            warn!(
                response = field::display(parts.status),
                "received error response"
            );
            return Err(RequestError::Status {
                reason: reason_phrase(parts.status),
                parts,
            });
        }

        Ok(parts)
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}
