//! Client for the broker's RPC surface
//!
//! `BrokerClient` wraps one WebSocket connection. `send` and `health` are
//! request/response calls and may be repeated; `receive` consumes the client
//! and turns the connection into a `Subscription` stream.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Message;
use crate::transport::message::{ClientMessage, ServerMessage, ServingStatus, StatusCode};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected reply: {0}")]
    Protocol(String),
    #[error("connection closed by server")]
    Closed,
}

async fn write_frame(stream: &mut WsConnection, frame: &ClientMessage) -> Result<(), ClientError> {
    let text = serde_json::to_string(frame)?;
    stream.send(WsMessage::text(text)).await?;
    Ok(())
}

/// Next server frame, or `None` once the connection is closed.
async fn read_frame(stream: &mut WsConnection) -> Result<Option<ServerMessage>, ClientError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            WsMessage::Text(text) => return Ok(Some(serde_json::from_str(text.as_str())?)),
            WsMessage::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

pub struct BrokerClient {
    stream: WsConnection,
}

impl BrokerClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Publish `messages` and wait for the broker's acknowledgment.
    pub async fn send(&mut self, messages: Vec<Message>) -> Result<(), ClientError> {
        write_frame(&mut self.stream, &ClientMessage::Send { messages }).await?;
        match read_frame(&mut self.stream).await? {
            Some(ServerMessage::Ack {}) => Ok(()),
            Some(other) => Err(ClientError::Protocol(format!("{other:?}"))),
            None => Err(ClientError::Closed),
        }
    }

    pub async fn health(&mut self, service: Option<&str>) -> Result<ServingStatus, ClientError> {
        let request = ClientMessage::Health {
            service: service.map(str::to_string),
        };
        write_frame(&mut self.stream, &request).await?;
        match read_frame(&mut self.stream).await? {
            Some(ServerMessage::HealthStatus { status }) => Ok(status),
            Some(other) => Err(ClientError::Protocol(format!("{other:?}"))),
            None => Err(ClientError::Closed),
        }
    }

    /// Open a subscription to `topics`. The connection is dedicated to it from now on.
    pub async fn receive(mut self, topics: Vec<String>) -> Result<Subscription, ClientError> {
        write_frame(&mut self.stream, &ClientMessage::Receive { topics }).await?;
        Ok(Subscription {
            stream: self.stream,
            status: None,
        })
    }
}

pub struct Subscription {
    stream: WsConnection,
    status: Option<StatusCode>,
}

impl Subscription {
    /// Next message, or `None` once the server ended the call.
    pub async fn next_message(&mut self) -> Result<Option<Message>, ClientError> {
        if self.status.is_some() {
            return Ok(None);
        }
        match read_frame(&mut self.stream).await? {
            Some(ServerMessage::Message { topic, content }) => Ok(Some(Message { topic, content })),
            Some(ServerMessage::Status { code, .. }) => {
                self.status = Some(code);
                Ok(None)
            }
            Some(other) => Err(ClientError::Protocol(format!("{other:?}"))),
            None => Ok(None),
        }
    }

    /// Terminal status, once the server has sent it.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Cancel the call and wait for its terminal status. Messages still in
    /// flight are discarded.
    pub async fn cancel(mut self) -> Result<StatusCode, ClientError> {
        if let Some(code) = self.status {
            return Ok(code);
        }
        write_frame(&mut self.stream, &ClientMessage::Cancel).await?;
        loop {
            match read_frame(&mut self.stream).await? {
                Some(ServerMessage::Status { code, .. }) => return Ok(code),
                Some(_) => continue,
                None => return Err(ClientError::Closed),
            }
        }
    }

    /// Drop the connection without waiting for the server.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
