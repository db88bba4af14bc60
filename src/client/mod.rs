//! The `client` module provides an async client for the broker's WebSocket
//! RPC surface. The CLI uses it for its `publish` and `subscribe` commands and
//! the tests use it to drive a running server.

pub mod pubsub_client;
pub use pubsub_client::{BrokerClient, ClientError, Subscription};

#[cfg(test)]
mod tests;
