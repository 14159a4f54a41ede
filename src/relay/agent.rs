//! Relay agent.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::surfaces::{Subscription, SurfaceTable};
use crate::error::{ConnectionError, ProtocolError};
use crate::protocol::{ServerMessage, SurfaceMessage, SurfaceRequest, SurfaceResponse};
use crate::registry::Registry;
use crate::server::observability::spans;
use crate::Config;

struct RelayInner {
    url: String,
    reconnect_delay: Duration,
    cache: ArcSwap<Registry>,
    surfaces: Arc<SurfaceTable>,
}

/// Caching intermediary between the broadcast server and display agents.
///
/// The cache is an immutable snapshot behind a single swappable pointer:
/// each received registry replaces it wholesale, and `query` is one
/// atomic load, so it never blocks and never observes a partial update.
#[derive(Clone)]
pub struct RelayAgent {
    inner: Arc<RelayInner>,
}

impl RelayAgent {
    /// Create a relay for the broadcast endpoint at `url`.
    ///
    /// The cache starts as the empty placeholder registry.
    #[must_use]
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                url: url.into(),
                reconnect_delay,
                cache: ArcSwap::from_pointee(Registry::empty()),
                surfaces: SurfaceTable::new(),
            }),
        }
    }

    /// Create a relay from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_url(), config.reconnect_delay())
    }

    /// Broadcast endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// The cached registry, or the placeholder if nothing has arrived yet.
    #[must_use]
    pub fn query(&self) -> Arc<Registry> {
        self.inner.cache.load_full()
    }

    /// Answer a pull request from a display agent.
    #[must_use]
    pub fn request(&self, request: SurfaceRequest) -> SurfaceResponse {
        match request {
            SurfaceRequest::Query => SurfaceResponse::Success { data: self.query() },
        }
    }

    /// Answer a raw JSON request; unknown actions get no response.
    #[must_use]
    pub fn handle_message(&self, message: &serde_json::Value) -> Option<SurfaceResponse> {
        SurfaceRequest::from_value(message).map(|request| self.request(request))
    }

    /// Register a display surface for pushes.
    #[must_use]
    pub fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<SurfaceMessage>) {
        self.inner.surfaces.register()
    }

    /// Number of registered surfaces.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.inner.surfaces.len()
    }

    /// Apply one broadcast frame: replace the cache and push to surfaces.
    ///
    /// Returns the number of surfaces reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a well-formed registry update;
    /// the cache is left untouched.
    pub fn apply_frame(&self, text: &str) -> Result<usize, ProtocolError> {
        let registry = ServerMessage::decode(text)?.into_registry();
        tracing::debug!(
            classes = registry.classes.len(),
            files = registry.files.len(),
            "Received registry"
        );

        self.inner.cache.store(Arc::clone(&registry));
        Ok(self
            .inner
            .surfaces
            .push(&SurfaceMessage::RegistryUpdated { data: registry }))
    }

    /// Hold a connection to the broadcast server until `shutdown` is
    /// cancelled, reconnecting after a fixed delay whenever it drops.
    pub async fn run(&self, shutdown: CancellationToken) {
        let delay = self.inner.reconnect_delay;

        async {
            loop {
                match self.session(&shutdown).await {
                    Ok(()) => break,
                    Err(e) => {
                        #[allow(clippy::cast_possible_truncation)]
                        let delay_ms = delay.as_millis() as u64;
                        tracing::info!(error = %e, delay_ms, "Relay disconnected, reconnecting");
                    }
                }

                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            tracing::info!("Relay stopped");
        }
        .instrument(spans::relay_span(&self.inner.url))
        .await;
    }

    /// One connection lifetime. `Ok` means shutdown was requested.
    async fn session(&self, shutdown: &CancellationToken) -> Result<(), ConnectionError> {
        let url = &self.inner.url;

        let connected = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            connected = connect_async(url.as_str()) => connected,
        };
        let (mut ws, _) = connected.map_err(|e| ConnectionError::Connect {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        tracing::info!("Connected to broadcast server");

        let closed = |reason: String| ConnectionError::Closed {
            url: url.clone(),
            reason,
        };

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                incoming = ws.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = self.apply_frame(text.as_str()) {
                            tracing::warn!(error = %e, "Dropping malformed message");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map_or_else(
                            || "closed by server".to_string(),
                            |f| f.reason.as_str().to_string(),
                        );
                        return Err(closed(reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(closed(e.to_string())),
                    None => return Err(closed("stream ended".to_string())),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::REGISTRY_UPDATE;
    use chrono::Utc;

    fn relay() -> RelayAgent {
        RelayAgent::new("ws://127.0.0.1:1/", Duration::from_millis(20))
    }

    fn frame(classes: &[&str]) -> String {
        ServerMessage::update(Arc::new(Registry {
            last_updated: Some(Utc::now()),
            classes: classes.iter().map(|c| (*c).to_string()).collect(),
            files: Vec::new(),
        }))
        .encode()
        .unwrap()
    }

    #[test]
    fn test_query_before_connect_returns_placeholder() {
        let relay = relay();
        let registry = relay.query();
        assert!(registry.is_placeholder());
        assert!(registry.classes.is_empty());
    }

    #[test]
    fn test_apply_frame_replaces_cache() {
        let relay = relay();
        relay.apply_frame(&frame(&["a", "b"])).unwrap();
        assert_eq!(relay.query().classes, vec!["a", "b"]);

        relay.apply_frame(&frame(&["c"])).unwrap();
        assert_eq!(relay.query().classes, vec!["c"]);
    }

    #[test]
    fn test_malformed_frame_keeps_cache() {
        let relay = relay();
        relay.apply_frame(&frame(&["a"])).unwrap();

        assert!(relay.apply_frame("not json").is_err());
        assert!(relay.apply_frame(r#"{"type":"SOMETHING_ELSE"}"#).is_err());
        assert_eq!(relay.query().classes, vec!["a"]);
    }

    #[test]
    fn test_apply_frame_pushes_to_surfaces() {
        let relay = relay();
        let (_subscription, mut rx) = relay.subscribe();

        assert_eq!(relay.apply_frame(&frame(&["x"])).unwrap(), 1);
        let pushed = rx.try_recv().unwrap();
        assert_eq!(pushed.registry().classes, vec!["x"]);
    }

    #[test]
    fn test_apply_frame_without_surfaces() {
        let relay = relay();
        assert_eq!(relay.apply_frame(&frame(&["x"])).unwrap(), 0);
    }

    #[test]
    fn test_request_returns_cache() {
        let relay = relay();
        relay.apply_frame(&frame(&["a"])).unwrap();

        let data = relay.request(SurfaceRequest::Query).into_registry();
        assert_eq!(data.classes, vec!["a"]);
    }

    #[test]
    fn test_handle_message() {
        let relay = relay();
        let response = relay
            .handle_message(&serde_json::json!({ "action": "query-class-validator" }))
            .unwrap();
        assert!(response.into_registry().is_placeholder());

        assert!(relay
            .handle_message(&serde_json::json!({ "type": REGISTRY_UPDATE }))
            .is_none());
    }

    #[tokio::test]
    async fn test_run_retries_until_cancelled() {
        // Nothing listens on port 1, so every attempt fails.
        let relay = relay();
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let relay = relay.clone();
            let token = token.clone();
            async move { relay.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert!(relay.query().is_placeholder());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("relay should stop on cancel")
            .unwrap();
    }
}
