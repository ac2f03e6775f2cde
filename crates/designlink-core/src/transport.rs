//! SSE JSON-RPC transport
//!
//! Each call opens its own session: a `GET` on the event stream yields an
//! `endpoint` frame naming where requests are POSTed, the request is POSTed
//! there (expecting `202 Accepted`), and the answer arrives later as a
//! `message` frame on the stream opened in the first step.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::protocol::{RpcRequest, RpcResponse, TOOLS_LIST};
use crate::retry::retry_with_backoff;
use crate::sse::{SseDecoder, SseEvent, DEFAULT_EVENT, ENDPOINT_EVENT};

/// Accept header value for the event stream
const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";

/// A response plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReply {
    pub response: RpcResponse,
    /// Attempts beyond the first
    pub retries: u32,
    /// Served from the result cache without touching the network
    pub cached: bool,
}

/// Something that can perform JSON-RPC calls against the design service
///
/// Implemented by the real SSE client, by the caching decorator, and by test
/// doubles.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Perform one call (with retries). A JSON-RPC `error` field is a valid
    /// response, not an `Err`.
    async fn call(
        &self,
        method: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<RpcReply, TransportError>;

    /// Cheap reachability probe: negotiate a session and list tools
    async fn test_connection(&self) -> bool;
}

/// JSON-RPC client speaking the SSE session protocol
pub struct SseRpcClient {
    config: ClientConfig,
    client: Client,
}

impl SseRpcClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// One negotiate + dispatch + correlate exchange, bounded by the per-call
    /// timeout and the cancellation token. Dropping the exchange future closes
    /// both the stream and any in-flight POST.
    async fn call_once(
        &self,
        request: &RpcRequest,
        cancel: &CancellationToken,
    ) -> Result<RpcResponse, TransportError> {
        let timeout = self.config.request_timeout();

        let exchange = async {
            let mut session = self.open_session().await?;
            debug!(
                "Dispatching {} (id {}) to {}",
                request.method, request.id, session.endpoint
            );

            if let Some(response) = self.dispatch(&session.endpoint, request).await? {
                return Ok(response);
            }
            session
                .await_response(request.id, self.config.strict_id_matching)
                .await
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = tokio::time::timeout(timeout, exchange) => {
                result.unwrap_or(Err(TransportError::Timeout(timeout)))
            }
        }
    }

    /// Open the event stream and wait for its `endpoint` frame
    async fn open_session(&self) -> Result<Session, TransportError> {
        let url = self.config.sse_url();
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, EVENT_STREAM_MIME_TYPE)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.config.connect_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Event stream at {} returned {}", url, status);
            return Err(TransportError::from_status(status.as_u16(), &body));
        }

        let mut session = Session::new(response.bytes_stream().boxed());
        while let Some(event) = session.next_event().await? {
            if event.event != ENDPOINT_EVENT {
                continue;
            }
            let endpoint = event.data.trim();
            if endpoint.is_empty() {
                continue;
            }
            debug!("Negotiated session endpoint {}", endpoint);
            session.endpoint = endpoint.to_string();
            return Ok(session);
        }

        Err(TransportError::Protocol(
            "event stream ended before an endpoint event".to_string(),
        ))
    }

    /// POST the request to the session endpoint.
    ///
    /// `Ok(None)` means accepted, with the answer still to come over the
    /// stream. Some servers answer inline with a JSON-RPC body instead; that
    /// answer is returned directly.
    async fn dispatch(
        &self,
        endpoint: &str,
        request: &RpcRequest,
    ) -> Result<Option<RpcResponse>, TransportError> {
        let url = self.config.endpoint_url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.config.connect_timeout()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("POST {} returned {}", url, status);
            return Err(TransportError::from_status(status.as_u16(), &body));
        }
        if status == StatusCode::ACCEPTED {
            return Ok(None);
        }

        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("accepted") {
            return Ok(None);
        }

        let inline = serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(RpcResponse::from_frame);
        Ok(inline.map(|mut response| {
            debug!("Request {} answered inline", request.id);
            response.id = json!(request.id);
            response
        }))
    }
}

#[async_trait]
impl RpcTransport for SseRpcClient {
    async fn call(
        &self,
        method: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<RpcReply, TransportError> {
        let request = RpcRequest::new(method, params);
        let (request_ref, cancel_ref) = (&request, &cancel);

        let retried = retry_with_backoff(&self.config.retry, &cancel, move |_| {
            self.call_once(request_ref, cancel_ref)
        })
        .await?;

        Ok(RpcReply {
            response: retried.value,
            retries: retried.retries,
            cached: false,
        })
    }

    async fn test_connection(&self) -> bool {
        let request = RpcRequest::new(TOOLS_LIST, json!({}));
        match self.call_once(&request, &CancellationToken::new()).await {
            Ok(_) => {
                info!("Design service at {} is reachable", self.config.base_url);
                true
            }
            Err(e) => {
                warn!(
                    "Design service at {} is unreachable: {}",
                    self.config.base_url, e
                );
                false
            }
        }
    }
}

/// One open event stream and the endpoint it negotiated
struct Session {
    endpoint: String,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    ended: bool,
}

impl Session {
    fn new(stream: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            endpoint: String::new(),
            stream,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            ended: false,
        }
    }

    /// Next decoded event, reading more of the stream as needed.
    /// `Ok(None)` once the stream has ended and everything was drained.
    async fn next_event(&mut self) -> Result<Option<SseEvent>, TransportError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.ended {
                return Ok(None);
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    let events = self.decoder.push(&chunk);
                    self.pending.extend(events);
                }
                Some(Err(e)) => {
                    return Err(TransportError::Connection(format!(
                        "event stream read failed: {e}"
                    )))
                }
                None => {
                    self.ended = true;
                    if let Some(event) = self.decoder.finish() {
                        self.pending.push_back(event);
                    }
                }
            }
        }
    }

    /// Wait for the first `message` frame that is a response.
    ///
    /// Ids are not compared unless `strict` is set: the answer to the single
    /// outstanding request on this session is whatever response arrives.
    async fn await_response(
        &mut self,
        request_id: u64,
        strict: bool,
    ) -> Result<RpcResponse, TransportError> {
        while let Some(event) = self.next_event().await? {
            if event.event != DEFAULT_EVENT {
                continue;
            }

            let value = match serde_json::from_str::<Value>(event.data.trim()) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Skipping non-JSON message frame: {}", e);
                    continue;
                }
            };

            let Some(mut response) = RpcResponse::from_frame(value) else {
                continue;
            };

            if strict && response.id != json!(request_id) {
                debug!(
                    "Ignoring response for id {} while waiting for {}",
                    response.id, request_id
                );
                continue;
            }

            response.id = json!(request_id);
            return Ok(response);
        }

        Err(TransportError::Protocol(
            "event stream closed before a response arrived".to_string(),
        ))
    }
}
