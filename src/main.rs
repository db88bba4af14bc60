//! CLI for topic-broker
//!
//! Subcommands:
//! - `server`: run the broker
//! - `publish`: send messages to a running broker
//! - `subscribe`: print messages from a running broker until Ctrl-C

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use topic_broker::broker::{Broker, Message};
use topic_broker::client::BrokerClient;
use topic_broker::config::{load_config, load_config_from};
use topic_broker::transport::WebSocketServer;
use topic_broker::utils::logging;
use tracing::{error, info};

const DEFAULT_URL: &str = "ws://127.0.0.1:50051";

#[derive(Parser)]
#[command(name = "topic-broker", version)]
enum Command {
    /// Start the broker server
    Server {
        /// Configuration file (default: config/default.*, if present)
        #[arg(long)]
        config: Option<String>,
    },
    /// Publish messages; each --topic is paired with the --content at the same position
    Publish {
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        #[arg(long = "topic", required = true)]
        topics: Vec<String>,
        #[arg(long = "content", required = true)]
        contents: Vec<String>,
    },
    /// Subscribe to topics and print every message until Ctrl-C
    Subscribe {
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        #[arg(required = true)]
        topics: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let result = match cmd {
        Command::Server { config } => run_server(config).await,
        Command::Publish {
            url,
            topics,
            contents,
        } => {
            logging::init("info");
            run_publish(&url, topics, contents).await
        }
        Command::Subscribe { url, topics } => {
            logging::init("info");
            run_subscribe(&url, topics).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match config_path.as_deref() {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            return Err(format!("failed to load configuration: {e}").into());
        }
    };
    logging::init(&settings.server.log_level);

    info!(
        pool_size = settings.broker.pool_size,
        check_interval_ms = settings.broker.disconnect_check_interval_ms,
        "starting broker"
    );
    let broker = Arc::new(Broker::new(&settings.broker)?);
    let addr = settings.address();
    let server = WebSocketServer::bind(&addr, broker)
        .await
        .map_err(|e| format!("cannot listen on {addr}: {e}"))?;

    server.serve_until(shutdown_signal()).await;
    info!("Exiting successfully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received.");
}

async fn run_publish(
    url: &str,
    topics: Vec<String>,
    contents: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if topics.len() != contents.len() {
        return Err(format!(
            "got {} --topic but {} --content arguments",
            topics.len(),
            contents.len()
        )
        .into());
    }
    let messages: Vec<Message> = topics
        .into_iter()
        .zip(contents)
        .map(|(topic, content)| Message { topic, content })
        .collect();
    let count = messages.len();

    let mut client = BrokerClient::connect(url).await?;
    client.send(messages).await?;
    info!("published {count} message(s)");
    Ok(())
}

async fn run_subscribe(url: &str, topics: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let client = BrokerClient::connect(url).await?;
    let mut subscription = client.receive(topics).await?;

    loop {
        tokio::select! {
            next = subscription.next_message() => match next? {
                Some(message) => println!("[{}] {}", message.topic, message.content),
                None => {
                    info!("subscription ended with status {:?}", subscription.status());
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("cancelling subscription");
    let status = subscription.cancel().await?;
    info!("subscription ended with status {status:?}");
    Ok(())
}
