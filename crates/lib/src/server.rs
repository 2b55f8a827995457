//! Webhook HTTP server: receives LINE event batches and replies with OpenAI
//! completions.
//!
//! One handler future per event, fanned out and joined; only a failure of the
//! reply send itself fails the batch. Completion failures are absorbed into a
//! fixed error reply so the user always hears back.

use crate::channels::{verify_signature, LineClient, WebhookEvent, WebhookRequest};
use crate::config::{self, Config};
use crate::llm::{ChatMessage, OpenAiClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Reply sent when the completion has no usable text.
const EMPTY_COMPLETION_REPLY: &str = "抱歉，我沒有話可說了。";

/// Reply sent when the completion call itself fails.
const COMPLETION_ERROR_REPLY: &str = "Sorry, there was an error processing your request.";

/// Shared state for the webhook server (config and the two API clients).
/// Built once before the listener starts; read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// When Some, POST /callback must carry a valid x-line-signature.
    pub channel_secret: Option<String>,
    pub line: LineClient,
    pub openai: OpenAiClient,
}

/// Per-event entry in the callback response array. Skipped events appear as null.
#[derive(Debug, Serialize)]
pub struct EventAck {
    pub replied: bool,
}

/// Text of a processable event: message events carrying a text message.
/// Everything else (follow, sticker, image, ...) is skipped.
fn text_message(event: &WebhookEvent) -> Option<&str> {
    if event.typ != "message" {
        return None;
    }
    let message = event.message.as_ref()?;
    if message.typ != "text" {
        return None;
    }
    message.text.as_deref()
}

/// Map the completion content to the reply text: trimmed when present,
/// the fixed fallback when absent or whitespace-only.
fn reply_text(content: Option<&str>) -> String {
    match content.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => EMPTY_COMPLETION_REPLY.to_string(),
    }
}

/// Handle one webhook event: skip non-text events, otherwise request a
/// completion and send exactly one reply. Completion failures are logged and
/// replaced with the fixed error reply; only the reply send propagates an error.
async fn handle_event(state: &AppState, event: WebhookEvent) -> Result<Option<EventAck>, String> {
    let Some(text) = text_message(&event) else {
        return Ok(None);
    };
    let Some(reply_token) = event.reply_token.as_deref().filter(|t| !t.trim().is_empty()) else {
        // A reply without a token cannot succeed; drop the event instead of
        // failing the whole batch.
        log::warn!("text message event without reply token, skipping reply");
        return Ok(None);
    };

    let messages = vec![
        ChatMessage::system(state.config.openai.system_prompt.clone()),
        ChatMessage::user(text),
    ];
    let reply = match state
        .openai
        .chat_completion(
            &state.config.openai.model,
            messages,
            state.config.openai.max_tokens,
        )
        .await
    {
        Ok(content) => reply_text(content.as_deref()),
        Err(e) => {
            log::error!("openai completion failed: {}", e);
            COMPLETION_ERROR_REPLY.to_string()
        }
    };

    state.line.reply_message(reply_token, &reply).await?;
    Ok(Some(EventAck { replied: true }))
}

/// POST /callback — verifies the signature when a channel secret is configured,
/// then fans out one handler per event and waits for all of them.
async fn callback(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(ref secret) = state.channel_secret {
        let signature = headers
            .get("x-line-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, signature) {
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("rejecting malformed webhook body: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let results = join_all(
        request
            .events
            .into_iter()
            .map(|event| handle_event(&state, event)),
    )
    .await;

    let mut acks = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(ack) => acks.push(ack),
            Err(e) => {
                log::error!("reply send failed: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    Json(acks).into_response()
}

/// GET / returns a simple health JSON (for probes).
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
    }))
}

/// Run the webhook server; binds to config.server.bind:config.server.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_server(config: Config) -> Result<()> {
    let channel_access_token = config::resolve_channel_access_token(&config);
    if channel_access_token.is_none() {
        log::warn!("no LINE channel access token configured; replies will fail");
    }
    let channel_secret = config::resolve_channel_secret(&config);
    if channel_secret.is_none() {
        log::warn!("no LINE channel secret configured; webhook signatures are not verified");
    }
    let api_key = config::resolve_openai_api_key(&config);
    if api_key.is_none() {
        log::warn!("no OpenAI API key configured; completions will fail");
    }

    let line = LineClient::new(config.line.api_base_url.clone(), channel_access_token);
    let openai = OpenAiClient::new(config.openai.api_base_url.clone(), api_key);
    let state = AppState {
        config: Arc::new(config),
        channel_secret,
        line,
        openai,
    };

    let bind_addr = format!("{}:{}", state.config.server.bind, state.config.server.port);
    let app = Router::new()
        .route("/", get(health))
        .route("/callback", post(callback))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    log::info!("server stopped");
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
    use crate::channels::EventMessage;

    fn event(typ: &str, message: Option<EventMessage>, reply_token: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            typ: typ.to_string(),
            message,
            reply_token: reply_token.map(str::to_string),
        }
    }

    #[test]
    fn text_message_accepts_only_text_message_events() {
        let text = EventMessage {
            typ: "text".to_string(),
            text: Some("hello".to_string()),
        };
        let sticker = EventMessage {
            typ: "sticker".to_string(),
            text: None,
        };
        assert_eq!(
            text_message(&event("message", Some(text), Some("tok"))),
            Some("hello")
        );
        assert_eq!(text_message(&event("message", Some(sticker), Some("tok"))), None);
        assert_eq!(text_message(&event("follow", None, Some("tok"))), None);
        let no_text = EventMessage {
            typ: "text".to_string(),
            text: None,
        };
        assert_eq!(text_message(&event("message", Some(no_text), Some("tok"))), None);
    }

    #[test]
    fn reply_text_trims_content() {
        assert_eq!(reply_text(Some("  Hi there\n")), "Hi there");
        assert_eq!(reply_text(Some("Hi there")), "Hi there");
    }

    #[test]
    fn reply_text_falls_back_when_empty() {
        assert_eq!(reply_text(None), EMPTY_COMPLETION_REPLY);
        assert_eq!(reply_text(Some("")), EMPTY_COMPLETION_REPLY);
        assert_eq!(reply_text(Some("   \n\t")), EMPTY_COMPLETION_REPLY);
    }
}
