use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};
use wirerpc::{
    Encoding, NetworkId, NetworkType, RpcErrorDescriptor, RpcMessage, RpcNotification, RpcRequest,
    RpcResponse, WireCodec,
};
use wirerpc_resolver::{NodeDescriptor, Resolver, StaticDiscovery};
use wirerpc_tokio_client::{ConnectionState, ReconnectPolicy, RpcClient, RpcClientConfig, RpcClientError};

fn mainnet() -> NetworkId {
    NetworkId::new(NetworkType::Mainnet)
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn to_ws(frame: Vec<u8>, encoding: Encoding) -> WsMessage {
    match encoding {
        Encoding::Binary => WsMessage::Binary(frame.into()),
        Encoding::Text => WsMessage::Text(String::from_utf8(frame).unwrap().into()),
    }
}

fn frame_bytes(message: &WsMessage) -> Option<Vec<u8>> {
    match message {
        WsMessage::Binary(bytes) => Some(bytes.to_vec()),
        WsMessage::Text(text) => Some(text.as_bytes().to_vec()),
        _ => None,
    }
}

async fn next_request(
    ws: &mut WebSocketStream<TcpStream>,
    encoding: Encoding,
) -> Option<RpcRequest> {
    while let Some(Ok(message)) = ws.next().await {
        let Some(bytes) = frame_bytes(&message) else { continue };
        if let Ok(RpcMessage::Request(request)) = WireCodec::decode(&bytes, encoding) {
            return Some(request);
        }
    }
    None
}

async fn send_message(
    ws: &mut WebSocketStream<TcpStream>,
    message: &RpcMessage,
    encoding: Encoding,
) -> bool {
    let frame = WireCodec::encode(message, encoding).unwrap();
    ws.send(to_ws(frame, encoding)).await.is_ok()
}

/// Server that answers every request with its own payload, except the
/// method "explode" which gets an application error.
async fn spawn_echo_server(encoding: Encoding) -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                while let Some(request) = next_request(&mut ws, encoding).await {
                    let response = if request.method == "explode" {
                        RpcMessage::Response(RpcResponse::error(
                            request.id,
                            RpcErrorDescriptor {
                                code: -32000,
                                message: "boom".to_string(),
                                data: None,
                            },
                        ))
                    } else {
                        RpcMessage::Response(RpcResponse::ok(request.id, request.payload))
                    };
                    if !send_message(&mut ws, &response, encoding).await {
                        break;
                    }
                }
            });
        }
    });
    url
}

/// Server that accepts frames but never answers them.
async fn spawn_black_hole_server() -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });
    url
}

fn binary_config(url: &str) -> RpcClientConfig {
    RpcClientConfig::with_url(url, Encoding::Binary, mainnet())
}

#[tokio::test]
async fn binary_round_trip() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let client = RpcClient::new(binary_config(&url)).unwrap();

    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.url().as_deref(), Some(url.as_str()));

    let echoed = client.call_raw("echo", b"hello".to_vec(), None).await.unwrap();
    assert_eq!(echoed, b"hello");
    assert_eq!(client.pending_requests(), 0);

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.url(), None);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
    label: String,
}

#[tokio::test]
async fn typed_call_over_binary_encoding() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let sent = Ping { seq: 7, label: "ping".to_string() };
    let received: Ping = client.call("ping", &sent, None).await.unwrap();
    assert_eq!(received, sent);
}

#[tokio::test]
async fn typed_call_over_text_encoding() {
    let url = spawn_echo_server(Encoding::Text).await;
    let config = RpcClientConfig::with_url(&url, Encoding::Text, mainnet());
    let client = RpcClient::new(config).unwrap();
    client.connect().await.unwrap();

    let sent = serde_json::json!({ "height": 42, "hash": "abc123" });
    let received: serde_json::Value = client.call("ping", &sent, None).await.unwrap();
    assert_eq!(received, sent);
}

#[tokio::test]
async fn responses_are_correlated_regardless_of_arrival_order() {
    // Collects two requests and answers them in reverse arrival order.
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let first = next_request(&mut ws, Encoding::Binary).await.unwrap();
        let second = next_request(&mut ws, Encoding::Binary).await.unwrap();
        for request in [second, first] {
            let response = RpcMessage::Response(RpcResponse::ok(request.id, request.payload));
            send_message(&mut ws, &response, Encoding::Binary).await;
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let (a, b) = tokio::join!(
        client.call_raw("first", b"payload-a".to_vec(), None),
        client.call_raw("second", b"payload-b".to_vec(), None),
    );
    assert_eq!(a.unwrap(), b"payload-a");
    assert_eq!(b.unwrap(), b"payload-b");
}

#[tokio::test]
async fn responses_with_unknown_ids_are_dropped_without_disturbing_calls() {
    // Answers every request twice: first under a bogus id, then correctly.
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(request) = next_request(&mut ws, Encoding::Binary).await {
            let bogus = RpcMessage::Response(RpcResponse::ok(
                request.id.wrapping_add(999),
                b"misdirected".to_vec(),
            ));
            let real = RpcMessage::Response(RpcResponse::ok(request.id, request.payload));
            if !send_message(&mut ws, &bogus, Encoding::Binary).await
                || !send_message(&mut ws, &real, Encoding::Binary).await
            {
                break;
            }
        }
    });

    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let echoed = client.call_raw("echo", b"for-me".to_vec(), None).await.unwrap();
    assert_eq!(echoed, b"for-me");
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn server_error_surfaces_as_rpc_error() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let error = client.call_raw("explode", Vec::new(), None).await.unwrap_err();
    match error {
        RpcClientError::Rpc(descriptor) => {
            assert_eq!(descriptor.code, -32000);
            assert_eq!(descriptor.message, "boom");
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let url = spawn_black_hole_server().await;
    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let error = client
        .call_raw("silence", Vec::new(), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(error, RpcClientError::RequestTimeout { .. }));
    // The abandoned request no longer occupies the pending table.
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn call_before_connect_is_not_connected() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let client = RpcClient::new(binary_config(&url)).unwrap();

    let error = client.call_raw("early", Vec::new(), None).await.unwrap_err();
    assert!(matches!(error, RpcClientError::NotConnected));
}

#[tokio::test]
async fn refused_connection_fails_and_marks_failed() {
    // Bind then drop to get a port nothing listens on.
    let (listener, url) = bind().await;
    drop(listener);

    let client = RpcClient::new(binary_config(&url)).unwrap();
    let error = client.connect().await.unwrap_err();
    assert!(matches!(error, RpcClientError::ConnectFailed { .. }));
    assert_eq!(client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn invalid_configurations_are_rejected() {
    let no_source = RpcClientConfig {
        url: None,
        ..binary_config("ws://unused")
    };
    assert!(matches!(
        RpcClient::new(no_source).unwrap_err(),
        RpcClientError::InvalidConfiguration(_)
    ));

    let bad_scheme = binary_config("http://not-a-socket");
    assert!(matches!(
        RpcClient::new(bad_scheme).unwrap_err(),
        RpcClientError::InvalidConfiguration(_)
    ));
}

#[tokio::test]
async fn disconnect_fails_requests_in_flight() {
    let url = spawn_black_hole_server().await;
    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let caller = client.clone();
    let in_flight =
        tokio::spawn(async move { caller.call_raw("stuck", Vec::new(), None).await });
    // Let the request reach the pending table before disconnecting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    client.disconnect().await.unwrap();
    let error = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(error, RpcClientError::ConnectionClosed));
}

#[tokio::test]
async fn transport_loss_fails_requests_in_flight() {
    // Reads one request, then drops the connection without answering.
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        next_request(&mut ws, Encoding::Binary).await;
        drop(ws);
    });

    let client = RpcClient::new(binary_config(&url)).unwrap();
    client.connect().await.unwrap();

    let error = client.call_raw("doomed", Vec::new(), None).await.unwrap_err();
    assert!(matches!(error, RpcClientError::ConnectionClosed));

    // The reader task observed the loss and moved the state over.
    for _ in 0..100 {
        if client.state() == ConnectionState::Disconnected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client never reached the disconnected state");
}

#[tokio::test]
async fn notifications_reach_the_installed_handler() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let notification = RpcMessage::Notification(RpcNotification {
            method: "block-added".to_string(),
            payload: b"new-tip".to_vec(),
        });
        send_message(&mut ws, &notification, Encoding::Binary).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = RpcClient::new(binary_config(&url)).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client.set_notification_handler(move |notification| {
        let _ = tx.send(notification);
    });
    client.connect().await.unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.method, "block-added");
    assert_eq!(notification.payload, b"new-tip");
}

#[tokio::test]
async fn state_change_handler_observes_the_full_lifecycle() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let client = RpcClient::new(binary_config(&url)).unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    client.set_state_change_handler(move |state| {
        sink.lock().unwrap().push(state);
    });

    client.connect().await.unwrap();
    client.disconnect().await.unwrap();

    let states = observed.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ]
    );
}

#[tokio::test]
async fn resolver_supplied_endpoint_connects() {
    let url = spawn_echo_server(Encoding::Binary).await;
    let discovery = Arc::new(StaticDiscovery::new(vec![NodeDescriptor::new(
        url.clone(),
        vec![Encoding::Binary],
        mainnet(),
    )]));
    let resolver = Resolver::new(discovery);
    let config = RpcClientConfig::with_resolver(resolver, Encoding::Binary, mainnet());
    let client = RpcClient::new(config).unwrap();

    client.connect().await.unwrap();
    assert_eq!(client.url().as_deref(), Some(url.as_str()));
    let echoed = client.call_raw("echo", b"via-resolver".to_vec(), None).await.unwrap();
    assert_eq!(echoed, b"via-resolver");
}

#[tokio::test]
async fn reconnects_after_transport_loss() {
    // First connection is dropped right after the handshake; later
    // connections echo normally.
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                while let Some(request) = next_request(&mut ws, Encoding::Binary).await {
                    let response =
                        RpcMessage::Response(RpcResponse::ok(request.id, request.payload));
                    if !send_message(&mut ws, &response, Encoding::Binary).await {
                        break;
                    }
                }
            });
        }
    });

    let mut config = binary_config(&url);
    config.reconnect = Some(ReconnectPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
    });
    let client = RpcClient::new(config).unwrap();
    client.connect().await.unwrap();

    // Wait for the drop to be noticed and the reconnect loop to land.
    let mut reconnected = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if client.state() == ConnectionState::Connected
            && client.call_raw("probe", b"alive".to_vec(), None).await.is_ok()
        {
            reconnected = true;
            break;
        }
    }
    assert!(reconnected, "client never re-established the transport");
}
