use super::pubsub_client::{BrokerClient, ClientError};

#[tokio::test]
async fn connect_to_closed_port_fails() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = BrokerClient::connect(&format!("ws://{addr}")).await;
    assert!(matches!(result, Err(ClientError::WebSocket(_))));
}

#[test]
fn client_error_messages() {
    assert_eq!(ClientError::Closed.to_string(), "connection closed by server");
    assert_eq!(
        ClientError::Protocol("Ack".to_string()).to_string(),
        "unexpected reply: Ack"
    );
}
