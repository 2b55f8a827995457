//! Communication channel (LINE Messaging API).
//!
//! Webhook wire types, signature verification for inbound callbacks, and the
//! reply client used by the server to answer events.

mod line;

pub use line::{
    sign_body, verify_signature, EventMessage, LineClient, WebhookEvent, WebhookRequest,
};
