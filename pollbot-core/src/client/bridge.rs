//! WebSocket bridge client
//!
//! The wire protocol of the messaging network is owned by an external gateway.
//! Each account opens one WebSocket to it and exchanges JSON frames:
//!
//! - request:  `{"id": 1, "method": "vote", "params": {...}}`
//! - response: `{"id": 1, "result": ...}` or `{"id": 1, "error": "MESSAGE_POLL_CLOSED"}`
//! - event:    `{"event": "new_message", "data": {"chat_id": .., "message_id": .., "poll": ..}}`
//!
//! Calls that wait on a human (QR scan, sign-in) carry no deadline of their own;
//! everything else is bounded by the configured request timeout.

use crate::client::{
    ClientError, ClientFactory, IncomingMessage, MessagingClient, QrLogin, SignInOutcome,
};
use crate::models::{ChatId, Dialog, MessageId};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type PendingMap = DashMap<u64, oneshot::Sender<Result<Value, ClientError>>>;

/// Buffered events per subscription before the reader applies backpressure
const SUBSCRIPTION_BUFFER: usize = 256;
/// Marker the network uses when a second factor is required
const PASSWORD_NEEDED: &str = "SESSION_PASSWORD_NEEDED";

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Response {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        data: Value,
    },
}

#[derive(Deserialize)]
struct QrTicket {
    token: String,
    url: String,
}

#[derive(Deserialize)]
struct SignInReply {
    status: SignInOutcome,
}

struct Subscription {
    chats: HashSet<ChatId>,
    tx: mpsc::Sender<IncomingMessage>,
}

struct Inner {
    url: Url,
    account: usize,
    session_path: PathBuf,
    request_timeout: Duration,
    writer: Mutex<Option<WsSink>>,
    pending: Arc<PendingMap>,
    subscriptions: Arc<parking_lot::Mutex<Vec<Subscription>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Inner {
    /// Open the WebSocket and start the frame reader, once.
    async fn ensure_open(&self) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return Ok(());
        }

        let (stream, _) = connect_async(self.url.clone())
            .await
            .map_err(|e| ClientError::Connection(format!("{}: {}", self.url, e)))?;
        let (sink, stream) = stream.split();
        *writer = Some(sink);

        let handle = tokio::spawn(read_frames(
            self.account,
            stream,
            Arc::clone(&self.pending),
            Arc::clone(&self.subscriptions),
        ));
        if let Some(old) = self.reader.lock().replace(handle) {
            old.abort();
        }
        tracing::debug!(account = self.account, url = %self.url, "Bridge connection opened");
        Ok(())
    }

    /// Send a request and wait for its response. `None` waits as long as the gateway does.
    async fn call(
        &self,
        method: &str,
        params: Value,
        deadline: Option<Duration>,
    ) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let frame = serde_json::to_string(&Request { id, method, params })
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        {
            let mut writer = self.writer.lock().await;
            let sent = match writer.as_mut() {
                Some(sink) => sink
                    .send(WsMessage::Text(frame))
                    .await
                    .map_err(|e| ClientError::Connection(e.to_string())),
                None => Err(ClientError::NotConnected),
            };
            if let Err(e) = sent {
                self.pending.remove(&id);
                return Err(e);
            }
        }

        let reply = match deadline {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.remove(&id);
                    return Err(ClientError::Timeout(method.to_string()));
                }
            },
            None => rx.await,
        };
        reply.map_err(|_| ClientError::NotConnected)?
    }

    async fn call_timed(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.call(method, params, Some(self.request_timeout)).await
    }

    async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.close().await;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        fail_pending(&self.pending);
        self.subscriptions.lock().clear();
    }
}

fn fail_pending(pending: &PendingMap) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(ClientError::NotConnected));
        }
    }
}

/// Route frames until the socket closes, then fail in-flight calls and end subscriptions.
async fn read_frames(
    account: usize,
    mut stream: SplitStream<WsStream>,
    pending: Arc<PendingMap>,
    subscriptions: Arc<parking_lot::Mutex<Vec<Subscription>>>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(account, error = %e, "Bridge connection lost");
                break;
            }
        };

        match serde_json::from_str::<Frame>(&text) {
            Ok(Frame::Response { id, result, error }) => {
                if let Some((_, tx)) = pending.remove(&id) {
                    let reply = match error {
                        Some(message) => Err(ClientError::Remote(message)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    let _ = tx.send(reply);
                }
            }
            Ok(Frame::Event { event, data }) if event == "new_message" => {
                match serde_json::from_value::<IncomingMessage>(data) {
                    Ok(message) => deliver_event(&subscriptions, message).await,
                    Err(e) => tracing::warn!(account, error = %e, "Malformed new_message event"),
                }
            }
            Ok(Frame::Event { event, .. }) => {
                tracing::trace!(account, event = %event, "Ignoring bridge event");
            }
            Err(e) => tracing::warn!(account, error = %e, "Unparseable bridge frame"),
        }
    }

    fail_pending(&pending);
    subscriptions.lock().clear();
    tracing::info!(account, "Bridge reader stopped");
}

async fn deliver_event(
    subscriptions: &parking_lot::Mutex<Vec<Subscription>>,
    message: IncomingMessage,
) {
    let targets: Vec<mpsc::Sender<IncomingMessage>> = subscriptions
        .lock()
        .iter()
        .filter(|s| s.chats.contains(&message.chat_id))
        .map(|s| s.tx.clone())
        .collect();

    let mut dropped = false;
    for tx in targets {
        if tx.send(message.clone()).await.is_err() {
            dropped = true;
        }
    }
    if dropped {
        subscriptions.lock().retain(|s| !s.tx.is_closed());
    }
}

/// Messaging client backed by the WebSocket bridge
pub struct BridgeClient {
    inner: Arc<Inner>,
}

impl BridgeClient {
    pub fn new(
        url: &str,
        account: usize,
        session_path: impl Into<PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let url = Url::parse(url)
            .map_err(|e| ClientError::Connection(format!("Invalid bridge URL {}: {}", url, e)))?;
        Ok(Self {
            inner: Arc::new(Inner {
                url,
                account,
                session_path: session_path.into(),
                request_timeout,
                writer: Mutex::new(None),
                pending: Arc::new(DashMap::new()),
                subscriptions: Arc::new(parking_lot::Mutex::new(Vec::new())),
                reader: parking_lot::Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

struct BridgeQrLogin {
    inner: Arc<Inner>,
    token: String,
    url: String,
}

#[async_trait]
impl QrLogin for BridgeQrLogin {
    fn url(&self) -> &str {
        &self.url
    }

    async fn wait(&self) -> Result<(), ClientError> {
        self.inner
            .call("qr_wait", json!({ "token": self.token }), None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn connect(&self) -> Result<(), ClientError> {
        self.inner.ensure_open().await?;
        self.inner
            .call(
                "connect",
                json!({
                    "account": self.inner.account,
                    "session": self.inner.session_path.to_string_lossy(),
                }),
                None,
            )
            .await
            .map(|_| ())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        let result = self.inner.call_timed("disconnect", json!({})).await;
        self.inner.close().await;
        result.map(|_| ())
    }

    async fn is_authorized(&self) -> Result<bool, ClientError> {
        let value = self.inner.call_timed("is_authorized", json!({})).await?;
        value
            .as_bool()
            .ok_or_else(|| ClientError::Protocol(format!("expected bool, got {}", value)))
    }

    async fn request_qr_login(&self) -> Result<Box<dyn QrLogin>, ClientError> {
        let value = self.inner.call_timed("qr_login", json!({})).await?;
        let ticket: QrTicket =
            serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))?;
        Ok(Box::new(BridgeQrLogin {
            inner: Arc::clone(&self.inner),
            token: ticket.token,
            url: ticket.url,
        }))
    }

    async fn send_code(&self, phone: &str) -> Result<(), ClientError> {
        self.inner
            .call_timed("send_code", json!({ "phone": phone }))
            .await
            .map(|_| ())
    }

    async fn sign_in(&self, phone: &str, code: &str) -> Result<SignInOutcome, ClientError> {
        match self
            .inner
            .call("sign_in", json!({ "phone": phone, "code": code }), None)
            .await
        {
            Ok(value) => serde_json::from_value::<SignInReply>(value)
                .map(|reply| reply.status)
                .map_err(|e| ClientError::Protocol(e.to_string())),
            Err(ClientError::Remote(message)) if message.contains(PASSWORD_NEEDED) => {
                Ok(SignInOutcome::PasswordRequired)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_password(&self, password: &str) -> Result<(), ClientError> {
        self.inner
            .call("sign_in_password", json!({ "password": password }), None)
            .await
            .map(|_| ())
    }

    async fn dialogs(&self) -> Result<Vec<Dialog>, ClientError> {
        let value = self.inner.call_timed("dialogs", json!({})).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))
    }

    async fn subscribe(
        &self,
        chats: HashSet<ChatId>,
    ) -> Result<mpsc::Receiver<IncomingMessage>, ClientError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let chat_list: Vec<ChatId> = chats.iter().copied().collect();
        self.inner
            .subscriptions
            .lock()
            .push(Subscription { chats, tx });

        if let Err(e) = self
            .inner
            .call_timed("subscribe", json!({ "chats": chat_list }))
            .await
        {
            drop(rx);
            self.inner.subscriptions.lock().retain(|s| !s.tx.is_closed());
            return Err(e);
        }
        Ok(rx)
    }

    async fn submit_vote(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        option_index: usize,
    ) -> Result<(), ClientError> {
        self.inner
            .call_timed(
                "vote",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "option": option_index,
                }),
            )
            .await
            .map(|_| ())
    }
}

/// Creates one bridge connection per account
pub struct BridgeClientFactory {
    url: String,
    request_timeout: Duration,
}

impl BridgeClientFactory {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl ClientFactory for BridgeClientFactory {
    async fn create(
        &self,
        account: usize,
        session_path: &Path,
    ) -> Result<Arc<dyn MessagingClient>, ClientError> {
        let client = BridgeClient::new(&self.url, account, session_path, self.request_timeout)?;
        Ok(Arc::new(client))
    }
}
