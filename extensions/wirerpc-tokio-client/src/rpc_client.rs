use crate::config::RpcClientConfig;
use crate::error::RpcClientError;
use crate::state::ConnectionState;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use wirerpc::{CodecError, Encoding, NetworkId, RpcMessage, RpcNotification, RpcRequest, WireCodec};

type NotificationHandler = Arc<dyn Fn(RpcNotification) + Send + Sync>;
type StateChangeHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;
type PendingSender = oneshot::Sender<Result<Vec<u8>, RpcClientError>>;

/// A WebSocket RPC client with request correlation, server notification
/// dispatch, and optional automatic reconnection.
///
/// Cheap to clone; all clones share one transport and one pending-request
/// table. Requests issued concurrently from any number of clones are
/// multiplexed over the single connection and matched back to their
/// callers by correlation id, independent of response arrival order.
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<ClientShared>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct ClientShared {
    config: RpcClientConfig,
    lifecycle: Mutex<Lifecycle>,
    pending: Mutex<HashMap<u64, PendingSender>>,
    next_request_id: AtomicU64,
    notification_handler: Mutex<Option<NotificationHandler>>,
    state_change_handler: Mutex<Option<StateChangeHandler>>,
}

struct Lifecycle {
    state: ConnectionState,
    connection: Option<Connection>,
    url: Option<String>,
    /// Bumped on every transition into `Connecting` and on every explicit
    /// disconnect. A reader task or reconnect loop whose generation no
    /// longer matches is stale and must not touch the lifecycle.
    generation: u64,
}

struct Connection {
    outbound: UnboundedSender<WsMessage>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Connection {
    fn shutdown(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl Drop for ClientShared {
    fn drop(&mut self) {
        if let Ok(lifecycle) = self.lifecycle.get_mut() {
            if let Some(connection) = lifecycle.connection.take() {
                connection.shutdown();
            }
        }
    }
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self, RpcClientError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(ClientShared {
                config,
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Idle,
                    connection: None,
                    url: None,
                    generation: 0,
                }),
                pending: Mutex::new(HashMap::new()),
                next_request_id: AtomicU64::new(1),
                notification_handler: Mutex::new(None),
                state_change_handler: Mutex::new(None),
            }),
        })
    }

    /// Resolves an endpoint (when configured with a resolver) and opens
    /// the WebSocket transport. Idempotent while connected.
    pub async fn connect(&self) -> Result<(), RpcClientError> {
        let generation = {
            let mut lifecycle = self.shared.lifecycle.lock().unwrap();
            match lifecycle.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Disconnecting => {
                    return Err(RpcClientError::ConnectFailed {
                        url: None,
                        reason: format!("connect called while {}", lifecycle.state),
                        source: None,
                    });
                }
                ConnectionState::Idle
                | ConnectionState::Disconnected
                | ConnectionState::Failed => {
                    lifecycle.state = ConnectionState::Connecting;
                    lifecycle.generation += 1;
                    lifecycle.generation
                }
            }
        };
        fire_state_change(&self.shared, ConnectionState::Connecting);
        establish(&self.shared, generation).await
    }

    /// Tears the transport down and fails every in-flight request with
    /// [`RpcClientError::ConnectionClosed`]. Never triggers reconnection.
    /// Idempotent while not connected.
    pub async fn disconnect(&self) -> Result<(), RpcClientError> {
        let connection = {
            let mut lifecycle = self.shared.lifecycle.lock().unwrap();
            match lifecycle.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    lifecycle.state = ConnectionState::Disconnecting;
                    lifecycle.generation += 1;
                    lifecycle.url = None;
                    lifecycle.connection.take()
                }
                _ => return Ok(()),
            }
        };
        fire_state_change(&self.shared, ConnectionState::Disconnecting);
        fail_all_pending(&self.shared);

        if let Some(connection) = connection {
            // Best-effort close frame, then let the writer drain.
            let _ = connection.outbound.send(WsMessage::Close(None));
            connection.reader_task.abort();
            let Connection { outbound, mut writer_task, .. } = connection;
            drop(outbound);
            if tokio::time::timeout(Duration::from_millis(250), &mut writer_task)
                .await
                .is_err()
            {
                writer_task.abort();
            }
        }

        self.shared.lifecycle.lock().unwrap().state = ConnectionState::Disconnected;
        fire_state_change(&self.shared, ConnectionState::Disconnected);
        tracing::info!("disconnected");
        Ok(())
    }

    /// Issues a request with an already-serialized payload body and waits
    /// for the correlated response.
    ///
    /// `timeout` overrides the configured per-request default. On timeout
    /// the local wait is abandoned; the server may still execute the
    /// request, and a late response is dropped.
    pub async fn call_raw(
        &self,
        method: &str,
        payload: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, RpcClientError> {
        let outbound = {
            let lifecycle = self.shared.lifecycle.lock().unwrap();
            match (&lifecycle.state, &lifecycle.connection) {
                (ConnectionState::Connected, Some(connection)) => connection.outbound.clone(),
                _ => return Err(RpcClientError::NotConnected),
            }
        };
        let request_id = self.shared.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.shared.pending.lock().unwrap().insert(request_id, sender);

        let message = RpcMessage::Request(RpcRequest::new(request_id, method, payload));
        let frame = match WireCodec::encode(&message, self.shared.config.encoding) {
            Ok(frame) => frame,
            Err(error) => {
                self.remove_pending(request_id);
                return Err(error.into());
            }
        };
        let ws_message = match self.shared.config.encoding {
            Encoding::Binary => WsMessage::Binary(Bytes::from(frame)),
            Encoding::Text => match String::from_utf8(frame) {
                Ok(text) => WsMessage::Text(text.into()),
                Err(error) => {
                    self.remove_pending(request_id);
                    return Err(CodecError::MalformedMessage(format!(
                        "text frame is not valid utf-8: {error}"
                    ))
                    .into());
                }
            },
        };
        if outbound.send(ws_message).is_err() {
            self.remove_pending(request_id);
            return Err(RpcClientError::ConnectionClosed);
        }

        let deadline = timeout.unwrap_or(self.shared.config.request_timeout);
        match tokio::time::timeout(deadline, receiver).await {
            Ok(Ok(result)) => result,
            // The pending entry was dropped without an answer.
            Ok(Err(_)) => Err(RpcClientError::ConnectionClosed),
            Err(_) => {
                self.remove_pending(request_id);
                tracing::debug!(request_id, method, ?deadline, "request timed out");
                Err(RpcClientError::RequestTimeout {
                    method: method.to_string(),
                    request_id,
                    timeout: deadline,
                })
            }
        }
    }

    /// Typed wrapper over [`RpcClient::call_raw`]: serializes the params
    /// and deserializes the response body with the connection's encoding.
    pub async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<R, RpcClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let encoding = self.shared.config.encoding;
        let payload = encoding.encode_payload(params)?;
        let response = self.call_raw(method, payload, timeout).await?;
        Ok(encoding.decode_payload(&response)?)
    }

    /// The URL of the live transport, if any.
    pub fn url(&self) -> Option<String> {
        self.shared.lifecycle.lock().unwrap().url.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().unwrap().state
    }

    pub fn encoding(&self) -> Encoding {
        self.shared.config.encoding
    }

    pub fn network_id(&self) -> NetworkId {
        self.shared.config.network_id
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().unwrap().len()
    }

    /// Installs the handler invoked for every server notification.
    /// Replaces any previous handler. Notifications arriving with no
    /// handler installed are dropped.
    pub fn set_notification_handler<F>(&self, handler: F)
    where
        F: Fn(RpcNotification) + Send + Sync + 'static,
    {
        *self.shared.notification_handler.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Installs the handler invoked on every [`ConnectionState`]
    /// transition. Replaces any previous handler.
    pub fn set_state_change_handler<F>(&self, handler: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        *self.shared.state_change_handler.lock().unwrap() = Some(Arc::new(handler));
    }

    fn remove_pending(&self, request_id: u64) {
        self.shared.pending.lock().unwrap().remove(&request_id);
    }
}

/// Resolves the target URL, opens the WebSocket, and wires up the reader
/// and writer tasks. The caller has already moved the lifecycle into
/// `Connecting` under `generation`.
async fn establish(shared: &Arc<ClientShared>, generation: u64) -> Result<(), RpcClientError> {
    let url = match resolve_target(shared).await {
        Ok(url) => url,
        Err(error) => {
            mark_attempt_failed(shared, generation);
            return Err(error);
        }
    };

    let (ws_stream, _response) = match connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(error) => {
            tracing::warn!(%url, %error, "websocket connect failed");
            // The cached resolution pointed at a dead node; force the next
            // attempt to re-query discovery.
            if let Some(resolver) = &shared.config.resolver {
                resolver.evict(shared.config.encoding, shared.config.network_id);
            }
            mark_attempt_failed(shared, generation);
            return Err(RpcClientError::ConnectFailed {
                url: Some(url),
                reason: error.to_string(),
                source: Some(Box::new(error)),
            });
        }
    };

    let (mut sink, mut stream) = ws_stream.split();
    let (outbound, mut outbound_rx) = unbounded_channel::<WsMessage>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let weak = Arc::downgrade(shared);
    let reader_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(message) => {
                    let Some(shared) = weak.upgrade() else { return };
                    handle_inbound(&shared, message);
                }
                Err(error) => {
                    tracing::debug!(%error, "websocket read failed");
                    break;
                }
            }
        }
        handle_transport_closed(weak, generation).await;
    });

    let connection = Connection { outbound, reader_task, writer_task };
    {
        let mut lifecycle = shared.lifecycle.lock().unwrap();
        // A disconnect may have raced the handshake.
        if lifecycle.generation != generation || lifecycle.state != ConnectionState::Connecting {
            drop(lifecycle);
            connection.shutdown();
            return Err(RpcClientError::ConnectionClosed);
        }
        lifecycle.connection = Some(connection);
        lifecycle.url = Some(url.clone());
        lifecycle.state = ConnectionState::Connected;
    }
    fire_state_change(shared, ConnectionState::Connected);
    tracing::info!(%url, "connected");
    Ok(())
}

async fn resolve_target(shared: &Arc<ClientShared>) -> Result<String, RpcClientError> {
    if let Some(url) = &shared.config.url {
        return Ok(url.clone());
    }
    // validate() guarantees a resolver when no url is pinned.
    let resolver = shared.config.resolver.as_ref().ok_or_else(|| {
        RpcClientError::InvalidConfiguration("neither url nor resolver configured".into())
    })?;
    let endpoint = resolver
        .resolve_url(shared.config.encoding, shared.config.network_id)
        .await
        .map_err(|error| RpcClientError::ConnectFailed {
            url: None,
            reason: error.to_string(),
            source: Some(Box::new(error)),
        })?;
    Ok(endpoint.url)
}

fn mark_attempt_failed(shared: &Arc<ClientShared>, generation: u64) {
    {
        let mut lifecycle = shared.lifecycle.lock().unwrap();
        if lifecycle.generation != generation || lifecycle.state != ConnectionState::Connecting {
            return;
        }
        lifecycle.state = ConnectionState::Failed;
    }
    fire_state_change(shared, ConnectionState::Failed);
}

fn handle_inbound(shared: &Arc<ClientShared>, message: WsMessage) {
    let encoding = shared.config.encoding;
    let decoded = match &message {
        WsMessage::Binary(bytes) => WireCodec::decode(bytes, encoding),
        WsMessage::Text(text) => WireCodec::decode(text.as_bytes(), encoding),
        // Control frames are handled by the protocol layer.
        _ => return,
    };
    let message = match decoded {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!(%error, "dropping undecodable frame");
            return;
        }
    };
    match message {
        RpcMessage::Response(response) => {
            let sender = shared.pending.lock().unwrap().remove(&response.id);
            match sender {
                Some(sender) => {
                    let _ = sender.send(response.result.map_err(RpcClientError::Rpc));
                }
                None => {
                    tracing::warn!(id = response.id, "dropping response with no pending request");
                }
            }
        }
        RpcMessage::Notification(notification) => {
            let handler = shared.notification_handler.lock().unwrap().clone();
            match handler {
                Some(handler) => handler(notification),
                None => {
                    tracing::debug!(
                        method = %notification.method,
                        "dropping notification with no handler installed"
                    );
                }
            }
        }
        RpcMessage::Request(request) => {
            tracing::warn!(method = %request.method, "dropping request frame sent by server");
        }
    }
}

/// Invoked by the reader task when the transport drops without an
/// explicit disconnect. Stale generations are ignored; a disconnect or a
/// newer connection has already taken over.
async fn handle_transport_closed(weak: Weak<ClientShared>, generation: u64) {
    loop {
        let Some(shared) = weak.upgrade() else { return };
        // The guard lives only inside this block so the sleep below never
        // holds it across an await; otherwise the spawned future would not
        // be `Send`.
        {
            let mut lifecycle = shared.lifecycle.lock().unwrap();
            if lifecycle.generation != generation {
                return;
            }
            match lifecycle.state {
                // The connect call owning this generation has not committed
                // yet; wait for it to register the connection or fail.
                ConnectionState::Connecting => {}
                ConnectionState::Connected => {
                    if let Some(connection) = lifecycle.connection.take() {
                        connection.writer_task.abort();
                    }
                    lifecycle.url = None;
                    lifecycle.state = ConnectionState::Disconnected;
                    let reconnect = shared.config.reconnect.is_some();
                    drop(lifecycle);
                    tracing::warn!("transport lost");
                    fire_state_change(&shared, ConnectionState::Disconnected);
                    fail_all_pending(&shared);
                    if reconnect {
                        tokio::spawn(run_reconnect(weak.clone()));
                    }
                    return;
                }
                _ => return,
            }
        }
        drop(shared);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Reconnection loop spawned after an unexpected transport loss. Holds
/// only a weak reference so that dropping the last client stops it.
///
/// Returns a boxed future to break the `establish` -> reader task ->
/// `run_reconnect` -> `establish` opaque-type cycle that otherwise keeps
/// the compiler from proving the futures `Send`.
fn run_reconnect(weak: Weak<ClientShared>) -> futures_util::future::BoxFuture<'static, ()> {
    Box::pin(run_reconnect_inner(weak))
}

async fn run_reconnect_inner(weak: Weak<ClientShared>) {
    let policy = {
        let Some(shared) = weak.upgrade() else { return };
        match shared.config.reconnect {
            Some(policy) => policy,
            None => return,
        }
    };
    for attempt in 0..policy.max_attempts {
        tokio::time::sleep(policy.delay_for(attempt)).await;
        let Some(shared) = weak.upgrade() else { return };
        let generation = {
            let mut lifecycle = shared.lifecycle.lock().unwrap();
            // An explicit connect or disconnect supersedes the loop.
            if lifecycle.state != ConnectionState::Disconnected {
                return;
            }
            lifecycle.state = ConnectionState::Connecting;
            lifecycle.generation += 1;
            lifecycle.generation
        };
        fire_state_change(&shared, ConnectionState::Connecting);
        if let Some(resolver) = &shared.config.resolver {
            resolver.evict(shared.config.encoding, shared.config.network_id);
        }
        match establish(&shared, generation).await {
            Ok(()) => {
                tracing::info!(attempt, "reconnected");
                return;
            }
            Err(error) => {
                tracing::warn!(attempt, %error, "reconnect attempt failed");
                if attempt + 1 == policy.max_attempts {
                    // Retry budget exhausted; leave the Failed state set
                    // by the attempt.
                    return;
                }
                {
                    let mut lifecycle = shared.lifecycle.lock().unwrap();
                    if lifecycle.generation != generation
                        || lifecycle.state != ConnectionState::Failed
                    {
                        return;
                    }
                    lifecycle.state = ConnectionState::Disconnected;
                }
                fire_state_change(&shared, ConnectionState::Disconnected);
            }
        }
    }
}

fn fire_state_change(shared: &ClientShared, state: ConnectionState) {
    let handler = shared.state_change_handler.lock().unwrap().clone();
    if let Some(handler) = handler {
        handler(state);
    }
}

fn fail_all_pending(shared: &ClientShared) {
    let senders: Vec<(u64, PendingSender)> =
        shared.pending.lock().unwrap().drain().collect();
    for (_, sender) in senders {
        let _ = sender.send(Err(RpcClientError::ConnectionClosed));
    }
}
