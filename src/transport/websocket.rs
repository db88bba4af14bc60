//! WebSocket transport
//!
//! This file implements the RPC surface of the broker on top of WebSocket
//! connections carrying JSON frames. Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Answer `send` calls with an `ack` after handing the messages to the broker
//! - Turn a `receive` call into a broker subscription whose responses are
//!   written straight to the socket, then finish it with a `status` frame
//! - Set the call's cancellation flag when the client cancels, closes or drops
//! - Report serving status to `health` calls
//! - On shutdown, let every connection finish its final frames before
//!   `serve_until` returns
//!
//! A connection carries any number of `send`/`health` calls and at most one
//! `receive`, which is always its last call.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Broker, CallContext, Message, ResponseWriter};
use crate::transport::health::HealthReporter;
use crate::transport::message::{ClientMessage, ServerMessage, StatusCode};
use crate::utils::error::WriteError;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;
type SharedSink = Arc<Mutex<WsSink>>;

/// How long shutdown waits for connections to finish after the broker stopped.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on the terminal status write and close handshake of one connection.
const FINAL_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

async fn send_frame(sink: &SharedSink, frame: &ServerMessage) -> Result<(), WriteError> {
    let text = serde_json::to_string(frame).map_err(|e| WriteError::new(e.to_string()))?;
    sink.lock()
        .await
        .send(WsMessage::text(text))
        .await
        .map_err(|e| WriteError::new(e.to_string()))
}

/// Writes subscription responses to the socket of a receive call.
#[derive(Clone)]
pub struct WsResponseWriter {
    sink: SharedSink,
}

impl ResponseWriter for WsResponseWriter {
    async fn write(&mut self, message: &Message) -> Result<(), WriteError> {
        send_frame(&self.sink, &ServerMessage::from(message)).await
    }
}

pub struct WebSocketServer {
    listener: TcpListener,
    broker: Arc<Broker>,
    health: Arc<HealthReporter>,
}

impl WebSocketServer {
    pub async fn bind(addr: &str, broker: Arc<Broker>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            broker,
            health: Arc::new(HealthReporter::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then stop accepting, wait
    /// for the broker to terminate every live subscription and give each
    /// connection a bounded window to send its final frames.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            broker,
            health,
        } = self;
        let (closing_tx, closing_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        health.set_serving(true);
        match listener.local_addr() {
            Ok(addr) => info!("WebSocket server listening on ws://{addr}"),
            Err(_) => info!("WebSocket server listening"),
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&broker),
                            Arc::clone(&health),
                            closing_rx.clone(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                Some(joined) = connections.join_next() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "connection task failed");
                    }
                }
            }
        }

        health.set_serving(false);
        drop(listener);
        info!("shutting down, waiting for subscriptions to end");
        broker.shutdown().await;

        closing_tx.send_replace(true);
        let drained = timeout(CONNECTION_DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "connections did not close in time, aborting them"
            );
            connections.shutdown().await;
        }
        info!("WebSocket server stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    health: Arc<HealthReporter>,
    mut closing: watch::Receiver<bool>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };
    let (sink, mut source) = ws_stream.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));
    debug!(%peer, "client connected");

    loop {
        let frame = tokio::select! {
            _ = server_closing(&mut closing) => {
                let _ = timeout(FINAL_WRITE_TIMEOUT, async { sink.lock().await.close().await }).await;
                break;
            }
            frame = source.next() => frame,
        };
        let text = match frame {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(%peer, error = %e, "connection error");
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Send { messages }) => {
                debug!(%peer, count = messages.len(), "send call");
                broker.publish(messages);
                ServerMessage::Ack {}
            }
            Ok(ClientMessage::Receive { topics }) => {
                serve_receive(&broker, topics, sink, source, peer).await;
                return;
            }
            Ok(ClientMessage::Health { service }) => ServerMessage::HealthStatus {
                status: health.status(service.as_deref()),
            },
            Ok(ClientMessage::Cancel) => {
                debug!(%peer, "cancel without an active receive call");
                continue;
            }
            Err(err) => {
                warn!(
                    %peer,
                    "Invalid client message: {err} | {}",
                    text.as_str().chars().take(100).collect::<String>()
                );
                ServerMessage::Error {
                    message: format!("invalid client message: {err}"),
                }
            }
        };

        if let Err(e) = send_frame(&sink, &reply).await {
            debug!(%peer, error = %e, "failed to reply");
            break;
        }
    }

    debug!(%peer, "client disconnected");
}

/// Resolves once the server has finished shutting the broker down.
async fn server_closing(closing: &mut watch::Receiver<bool>) {
    let _ = closing.wait_for(|closing| *closing).await;
}

async fn serve_receive(
    broker: &Broker,
    topics: Vec<String>,
    sink: SharedSink,
    source: WsSource,
    peer: SocketAddr,
) {
    debug!(%peer, ?topics, "receive call");
    let context = CallContext::new();
    let watcher = tokio::spawn(watch_for_cancel(source, context.clone()));
    let writer = WsResponseWriter {
        sink: Arc::clone(&sink),
    };

    let status = match broker.subscribe(topics, writer, context).await {
        Ok(completion) => {
            debug!(%peer, reason = ?completion.reason, delivered = completion.delivered, "receive call finished");
            ServerMessage::Status {
                code: StatusCode::Ok,
                message: None,
            }
        }
        Err(e) => {
            warn!(%peer, error = %e, "receive call failed");
            ServerMessage::Status {
                code: StatusCode::from(&e),
                message: Some(e.to_string()),
            }
        }
    };
    watcher.abort();

    // The client is usually gone by now; both of these may fail or stall.
    let _ = timeout(FINAL_WRITE_TIMEOUT, async {
        let _ = send_frame(&sink, &status).await;
        sink.lock().await.close().await
    })
    .await;
}

/// Read the rest of a receive call's input and flag the call once the client
/// cancels, closes or drops.
async fn watch_for_cancel(mut source: WsSource, context: CallContext) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Ok(ClientMessage::Cancel) = serde_json::from_str(text.as_str()) {
                    break;
                }
            }
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    context.cancel();
}
