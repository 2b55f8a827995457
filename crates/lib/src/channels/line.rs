//! LINE channel: webhook payload types, signature verification, and reply via
//! the Messaging API.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

const LINE_API_BASE: &str = "https://api.line.me";

type HmacSha256 = Hmac<Sha256>;

/// Webhook request body: an ordered batch of events.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only message events carrying a text message are
/// processed; every field below the event kind is optional on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    /// Single-use token authorizing one reply to the originating conversation.
    #[serde(default)]
    pub reply_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Compute the webhook signature for a raw body: base64(HMAC-SHA256(secret, body)).
pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        mac.finalize().into_bytes(),
    )
}

/// Verify an `x-line-signature` header value against the raw request body.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = sign_body(channel_secret, body);
    // Constant-time comparison
    expected.len() == signature.len()
        && expected
            .as_bytes()
            .iter()
            .zip(signature.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Client for the LINE Messaging API reply endpoint.
#[derive(Clone)]
pub struct LineClient {
    base_url: String,
    channel_access_token: Option<String>,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(base_url: Option<String>, channel_access_token: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            base_url,
            channel_access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Send one text reply for a reply token via POST /v2/bot/message/reply.
    /// The token is single-use; a second call with the same token fails upstream.
    pub async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), String> {
        let token = self
            .channel_access_token
            .as_ref()
            .ok_or("line channel access token not configured")?;
        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("reply failed: {} {}", status, body));
        }
        Ok(())
    }
}
