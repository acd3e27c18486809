//! Webhook HTTP server: single route, dispatch by method.

use crate::config::{self, Config};
use crate::event::IncomingEvent;
use crate::webhook::handler::EventHandler;
use crate::webhook::verify::{verify, Verification, VerifyQuery};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Request failures that end in 400. The cause is logged, never returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("error reading incoming request body: {0}")]
    BodyRead(axum::Error),
    #[error("error decoding incoming event json: {0}")]
    Decode(#[from] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        log::warn!("webhook: {}", self);
        StatusCode::BAD_REQUEST.into_response()
    }
}

/// Decode a POST body into the event envelope.
pub fn decode_event(body: &[u8]) -> Result<IncomingEvent, WebhookError> {
    Ok(serde_json::from_slice(body)?)
}

/// Shared, read-only webhook state: verification secret and event handler.
#[derive(Clone)]
pub struct WebhookServer {
    verify_token: Arc<str>,
    handler: Arc<dyn EventHandler>,
    path: Arc<str>,
    port: u16,
    log_payloads: bool,
    max_body_bytes: usize,
}

impl WebhookServer {
    pub fn new(verify_token: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        let defaults = config::WebhookConfig::default();
        Self {
            verify_token: Arc::from(verify_token.into()),
            handler: Arc::new(handler),
            path: Arc::from(defaults.path),
            port: config::ServerConfig::default().port,
            log_payloads: defaults.log_payloads,
            max_body_bytes: defaults.max_body_bytes,
        }
    }

    /// Build from config. Fails when no verification secret is configured.
    pub fn from_config(config: &Config, handler: impl EventHandler + 'static) -> Result<Self> {
        let Some(token) = config::resolve_verify_token(config) else {
            anyhow::bail!(
                "no verification token configured (set webhook.verifyToken or MESSENGER_VERIFY_TOKEN)"
            );
        };
        Ok(Self::new(token, handler)
            .with_path(config::webhook_path(config))
            .with_port(config.server.port)
            .with_log_payloads(config.webhook.log_payloads)
            .with_max_body_bytes(config.webhook.max_body_bytes))
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Arc::from(path.into());
        self
    }

    /// Port reported by `/health`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_log_payloads(mut self, on: bool) -> Self {
        self.log_payloads = on;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Router with the webhook route and `GET /health`.
    pub fn router(self) -> Router {
        let path = self.path.to_string();
        let mut app = Router::new().route(&path, any(handle_request));
        if path != "/health" {
            app = app.route("/health", get(health_http));
        }
        app.with_state(self)
    }

    /// GET: answer the subscription handshake.
    fn handle_verification(&self, request: &Request) -> Response {
        let query = match Query::<Vec<(String, String)>>::try_from_uri(request.uri()) {
            Ok(Query(pairs)) => VerifyQuery::from_pairs(pairs),
            Err(e) => {
                log::debug!("webhook: unreadable verification query: {}", e);
                VerifyQuery::default()
            }
        };
        match verify(&self.verify_token, &query) {
            Verification::Accepted(challenge) => {
                log::info!("webhook: subscription verified");
                (StatusCode::OK, challenge).into_response()
            }
            Verification::Rejected => {
                log::warn!("webhook: verification failed (mode or token mismatch)");
                StatusCode::FORBIDDEN.into_response()
            }
            Verification::Ignored => {
                log::debug!("webhook: verification request without mode or token, ignoring");
                StatusCode::OK.into_response()
            }
        }
    }

    /// POST: read, decode, classify, dispatch. The status only reflects decoding.
    async fn handle_incoming(&self, body: Body) -> Result<StatusCode, WebhookError> {
        let bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(WebhookError::BodyRead)?;
        if self.log_payloads {
            log::info!("webhook request: {}", String::from_utf8_lossy(&bytes));
        }
        let event = decode_event(&bytes)?;
        let dispatched = self.dispatch(event);
        log::debug!("webhook: dispatched {} event(s)", dispatched);
        Ok(StatusCode::OK)
    }

    /// Classify the first messaging event of each entry and hand it to the handler.
    /// Returns how many events were dispatched.
    pub fn dispatch(&self, event: IncomingEvent) -> usize {
        let mut count = 0;
        for entry in event.entry {
            let entry_id = entry.id;
            let Some(mut messaging) = entry.messaging.into_iter().next() else {
                log::warn!("webhook: entry {} has no messaging events, skipping", entry_id);
                continue;
            };
            let category = messaging.assign_category();
            log::debug!("webhook: entry {} classified as {}", entry_id, category);
            self.handler.handle(messaging);
            count += 1;
        }
        count
    }
}

async fn handle_request(State(server): State<WebhookServer>, request: Request) -> Response {
    let method = request.method().clone();
    match method {
        Method::GET => server.handle_verification(&request),
        Method::POST => match server.handle_incoming(request.into_body()).await {
            Ok(status) => status.into_response(),
            Err(e) => e.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// GET /health returns a simple status JSON (for probes).
async fn health_http(State(server): State<WebhookServer>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "path": server.path(),
        "port": server.port,
    }))
}

/// Run the webhook server; binds to config.server.bind:config.server.port.
/// Fails at startup when no verification token is configured.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_server(config: Config, handler: impl EventHandler + 'static) -> Result<()> {
    let server = WebhookServer::from_config(&config, handler)?;
    let path = server.path().to_string();
    let app = server.router();

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("webhook listening on {}{}", bind_addr, path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    log::info!("webhook server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventCategory, MessagingEvent};
    use std::sync::Mutex;

    fn recording_server() -> (WebhookServer, Arc<Mutex<Vec<MessagingEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let server = WebhookServer::new("secret", move |e: MessagingEvent| {
            sink.lock().unwrap().push(e)
        });
        (server, seen)
    }

    #[test]
    fn dispatch_takes_first_event_per_entry() {
        let (server, seen) = recording_server();
        let event = decode_event(
            br#"{"object":"page","entry":[
                {"id":"1","time":0,"messaging":[{"message":{"mid":"m1"}},{"postback":{"title":"ignored"}}]},
                {"id":"2","time":0,"messaging":[]},
                {"id":"3","time":0,"messaging":[{"read":{"watermark":5}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(server.dispatch(event), 2);
        let seen = seen.lock().unwrap();
        let categories: Vec<_> = seen.iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![EventCategory::Messages, EventCategory::MessageReads]
        );
    }

    #[test]
    fn decode_errors_are_typed() {
        assert!(matches!(
            decode_event(b"{\"object\":"),
            Err(WebhookError::Decode(_))
        ));
        assert!(matches!(
            decode_event(b"{\"entry\":\"nope\"}"),
            Err(WebhookError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn oversized_body_fails_the_read() {
        let (server, seen) = recording_server();
        let server = server.with_max_body_bytes(16);
        let body = Body::from(r#"{"object":"page","entry":[]}"#);
        let err = server.handle_incoming(body).await.unwrap_err();
        assert!(matches!(err, WebhookError::BodyRead(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn incoming_post_dispatches_after_decode() {
        let (server, seen) = recording_server();
        let body = Body::from(
            r#"{"object":"page","entry":[{"id":"1","time":0,"messaging":[{"postback":{"payload":"p","title":"Push Me"}}]}]}"#,
        );
        assert_eq!(server.handle_incoming(body).await.unwrap(), StatusCode::OK);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].category, EventCategory::MessagingPostbacks);
    }

    #[test]
    fn from_config_requires_token() {
        std::env::remove_var("MESSENGER_VERIFY_TOKEN");
        let mut config = Config::default();
        assert!(WebhookServer::from_config(&config, |_e: MessagingEvent| {}).is_err());

        config.webhook.verify_token = Some(" s3cret ".to_string());
        config.webhook.path = "hooks/fb".to_string();
        config.server.port = 9321;
        let server = WebhookServer::from_config(&config, |_e: MessagingEvent| {}).unwrap();
        assert_eq!(server.path(), "/hooks/fb");
        assert_eq!(server.port, 9321);
        assert_eq!(&*server.verify_token, " s3cret ");
    }
}
