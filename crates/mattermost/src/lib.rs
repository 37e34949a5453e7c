//! Mattermost integration - REST session client and websocket event stream
//!
//! This crate provides the chat-server interface for pulsebot:
//! - **Session Client** (`client`) - authenticated REST calls (login, profile
//!   update, team/channel lookup, message post)
//! - **Events** (`events`) - inbound event envelope decoding
//! - **Event Stream** (`stream`) - long-lived websocket connection and the
//!   pump that drains it into an in-process queue
//!
//! # Architecture
//!
//! ```text
//! REST (reqwest) ── SessionClient ──► bootstrap / replies
//! WS (tungstenite) ─ EventStream ──► pump ──► mpsc ──► dispatcher
//! ```
//!
//! # Key Types
//!
//! - `RestClient` - concrete `SessionClient` over the HTTP API
//! - `WsEventStream` - concrete `EventStream` with server authentication
//! - `EventEnvelope` / `ChatEvent` - decoded inbound events

pub mod client;
pub mod events;
pub mod stream;
