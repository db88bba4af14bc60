//! # topic-broker
//!
//! `topic-broker` is an in-memory, best-effort topic publish/subscribe
//! server. Publishers make fire-and-forget `send` calls. Every `receive`
//! call gets its own long-lived stream of the messages published to its
//! topics until the client cancels or disconnects.
//!
//! ## Core Modules
//!
//! - `broker`: topic registry, subscriber workers, execution pool and the coordinator.
//! - `client`: async client for the WebSocket RPC surface.
//! - `config`: loads server and broker settings from defaults, file and environment.
//! - `transport`: WebSocket server and the JSON frames it speaks.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
