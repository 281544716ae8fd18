//! Transport retry policy and a reconnecting WebSocket connector.
use std::time::Duration;

use alloy::{
    providers::WsConnect,
    pubsub::{ConnectionHandle, PubSubConnect},
    transports::{
        RpcError, TransportError, TransportResult,
        layers::{RetryBackoffLayer, RetryPolicy},
    },
};
use alloy_json_rpc::ErrorPayload;
use tokio_retry::{
    Retry, RetryIf,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::warn;
use url::Url;

/// Maximum number of transport-level retries per request.
const DEFAULT_MAX_RETRIES: u32 = 9;

/// Initial backoff of the transport layer in milliseconds.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1;

/// Compute units per second budget handed to the transport layer.
const DEFAULT_COMPUTE_UNITS_PER_SEC: u64 = 100;

/// The default [`RetryBackoffLayer`] for the chain client transport.
pub const DEFAULT_RETRY_LAYER: RetryBackoffLayer<ConnRefusedRetryPolicy> =
    RetryBackoffLayer::new_with_policy(
        DEFAULT_MAX_RETRIES,
        DEFAULT_INITIAL_BACKOFF_MS,
        DEFAULT_COMPUTE_UNITS_PER_SEC,
        ConnRefusedRetryPolicy,
    );

/// A retry strategy trait.
pub trait Strategy: Iterator<Item = Duration> + Clone + Send + Sync + 'static {}

impl<T> Strategy for T where T: Iterator<Item = Duration> + Clone + Send + Sync + 'static {}

/// A [`WsConnect`] wrapper that reconnects with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryWsConnect<S: Strategy> {
    inner: WsConnect,
    strategy: S,
}

impl RetryWsConnect<ExponentialBackoff> {
    /// Connector for `ws_url` using the default reconnect backoff.
    pub fn from_url(ws_url: Url) -> Self {
        Self {
            inner: WsConnect::new(ws_url.to_string()),
            strategy: reconnect_backoff(),
        }
    }
}

impl<S: Strategy> PubSubConnect for RetryWsConnect<S> {
    fn is_local(&self) -> bool {
        self.inner.is_local()
    }

    async fn connect(&self) -> TransportResult<ConnectionHandle> {
        self.inner.connect().await
    }

    fn try_reconnect(
        &self,
    ) -> alloy::transports::impl_future!(<Output = TransportResult<ConnectionHandle>>) {
        warn!(url = ?self.inner.url(), "Retrying connection to websocket provider");
        Retry::spawn(self.strategy.clone(), || self.inner.try_reconnect())
    }
}

/// 100ms, 200ms, 400ms, ... capped at 5s
fn reconnect_backoff() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2).factor(50).max_delay(Duration::from_secs(5))
}

/// Whether the node reported a transient failure worth repeating the request for.
fn is_retryable(error: &TransportError) -> bool {
    match error {
        RpcError::Transport(kind) => kind.is_retry_err(),
        RpcError::ErrorResp(payload) => payload.is_retry_err(),
        RpcError::NullResp => true,
        // some providers send error payloads that do not parse as a JSON-RPC response
        RpcError::DeserError { text, .. } => {
            serde_json::from_str::<ErrorPayload>(text).is_ok_and(|p| p.is_retry_err())
        }
        _ => false,
    }
}

/// A retry policy that also retries on "connection refused" errors.
#[derive(Debug, Clone, Copy)]
pub struct ConnRefusedRetryPolicy;

impl RetryPolicy for ConnRefusedRetryPolicy {
    fn should_retry(&self, error: &TransportError) -> bool {
        is_retryable(error) || is_connection_refused(error)
    }

    fn backoff_hint(&self, _error: &TransportError) -> Option<Duration> {
        None
    }
}

/// Checks whether the error message contains "connection refused".
#[inline]
pub fn is_connection_refused<S: ToString>(e: S) -> bool {
    e.to_string().to_lowercase().contains("connection refused")
}

/// Retry `op` with jittered exponential backoff, at most `max_retries` extra times, while
/// `condition` holds for the error.
pub async fn retry_with_backoff_if<F, Fut, T, E, C>(
    op: F,
    condition: C,
    max_retries: usize,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    let strategy = reconnect_backoff().map(jitter).take(max_retries);
    RetryIf::spawn(strategy, op, condition).await
}
