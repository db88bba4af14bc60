//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It defines the JSON frames of the RPC surface (`send`, `receive`,
//! `cancel`, `health`), the serving status reported to health probes, and the
//! WebSocket server that forwards calls to the broker.

pub mod health;
pub mod message;
pub mod websocket;


pub use health::{HealthReporter, SERVICE_NAME};
pub use message::{ClientMessage, ServerMessage, ServingStatus, StatusCode};
pub use websocket::{WebSocketServer, WsResponseWriter};
