//! The broker module contains the in-memory pub/sub core: the topic registry,
//! the subscriber workers, the execution pool they run on and the `Broker`
//! coordinator that ties them together.
//!
//! Public types:
//! - `Broker`: publish messages, serve subscriptions, shut down.
//! - `TopicRegistry` / `Mailbox`: topic name to delivery list.
//! - `ResponseWriter` / `CallContext`: what a transport supplies per receive call.

pub mod coordinator;
pub mod message;
pub mod pool;
pub mod registry;
pub mod worker;

pub use coordinator::Broker;
pub use message::Message;
pub use worker::{CallContext, Completion, ResponseWriter, TerminationReason};
