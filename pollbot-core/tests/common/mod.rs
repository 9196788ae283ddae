//! Mock collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pollbot_core::client::{
    ClientError, ClientFactory, IncomingMessage, MessagingClient, PollContent, QrLogin,
    ReasoningClient, ReasoningError, SignInOutcome,
};
use pollbot_core::models::{ChatId, Credential, Dialog, MessageId};
use pollbot_core::providers::{
    CredentialInput, DeliveryError, InputError, InputRequest, QrRenderer, QrSink,
};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Reasoning service returning a fixed reply, failing for listed keys
pub struct MockReasoning {
    pub reply: String,
    pub broken: Mutex<HashSet<String>>,
    pub latency: Duration,
    pub calls: AtomicUsize,
    pub keys_used: Mutex<Vec<String>>,
}

impl MockReasoning {
    pub fn new(reply: &str) -> Arc<Self> {
        Self::with_latency(reply, Duration::ZERO)
    }

    pub fn with_latency(reply: &str, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            broken: Mutex::new(HashSet::new()),
            latency,
            calls: AtomicUsize::new(0),
            keys_used: Mutex::new(Vec::new()),
        })
    }

    pub fn break_key(&self, key: &str) {
        self.broken.lock().insert(key.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.keys_used.lock().clear();
    }
}

#[async_trait]
impl ReasoningClient for MockReasoning {
    async fn generate(
        &self,
        credential: &Credential,
        _model: &str,
        _prompt: &str,
    ) -> Result<String, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys_used.lock().push(credential.expose().to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.broken.lock().contains(credential.expose()) {
            return Err(ReasoningError::Api {
                status: 403,
                message: "API key invalid".to_string(),
            });
        }
        Ok(self.reply.clone())
    }
}

pub fn credentials(keys: &[&str]) -> Vec<Credential> {
    keys.iter().map(|k| Credential::new(*k)).collect()
}

struct MockQrLogin {
    url: String,
    outcome: Result<(), String>,
}

#[async_trait]
impl QrLogin for MockQrLogin {
    fn url(&self) -> &str {
        &self.url
    }

    async fn wait(&self) -> Result<(), ClientError> {
        self.outcome.clone().map_err(ClientError::Remote)
    }
}

/// Scriptable messaging client recording every call
pub struct MockMessaging {
    pub authorized: Mutex<bool>,
    /// Outcome of each QR wait, in order; exhausted means failure
    pub qr_waits: Mutex<VecDeque<Result<(), String>>>,
    /// Whether a successful QR wait authorizes the account
    pub qr_confirms: Mutex<bool>,
    /// Outcome of each phone sign-in, in order; exhausted means failure
    pub sign_ins: Mutex<VecDeque<Result<SignInOutcome, String>>>,
    pub vote_error: Mutex<Option<String>>,
    pub dialogs: Vec<Dialog>,
    pub calls: Mutex<Vec<String>>,
    pub votes: Mutex<Vec<(ChatId, MessageId, usize)>>,
    pub subscribed: Mutex<Option<HashSet<ChatId>>>,
    events: Mutex<Option<mpsc::Sender<IncomingMessage>>>,
}

impl MockMessaging {
    pub fn new() -> Arc<Self> {
        Self::with_dialogs(Vec::new())
    }

    pub fn with_dialogs(dialogs: Vec<Dialog>) -> Arc<Self> {
        Arc::new(Self {
            authorized: Mutex::new(false),
            qr_waits: Mutex::new(VecDeque::new()),
            qr_confirms: Mutex::new(true),
            sign_ins: Mutex::new(VecDeque::new()),
            vote_error: Mutex::new(None),
            dialogs,
            calls: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            subscribed: Mutex::new(None),
            events: Mutex::new(None),
        })
    }

    pub fn authorized() -> Arc<Self> {
        let client = Self::new();
        *client.authorized.lock() = true;
        client
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn votes(&self) -> Vec<(ChatId, MessageId, usize)> {
        self.votes.lock().clone()
    }

    /// Push a message into the active subscription
    pub async fn push(&self, message: IncomingMessage) {
        let tx = self.events.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(message).await;
        }
    }

    /// Close the subscription as a disconnect would
    pub fn close_subscription(&self) {
        self.events.lock().take();
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl MessagingClient for MockMessaging {
    async fn connect(&self) -> Result<(), ClientError> {
        self.record("connect");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.record("disconnect");
        self.close_subscription();
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, ClientError> {
        self.record("is_authorized");
        Ok(*self.authorized.lock())
    }

    async fn request_qr_login(&self) -> Result<Box<dyn QrLogin>, ClientError> {
        self.record("request_qr_login");
        let outcome = self
            .qr_waits
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("AUTH_TOKEN_EXPIRED".to_string()));
        if outcome.is_ok() && *self.qr_confirms.lock() {
            *self.authorized.lock() = true;
        }
        Ok(Box::new(MockQrLogin {
            url: "tg://login?token=abc".to_string(),
            outcome,
        }))
    }

    async fn send_code(&self, _phone: &str) -> Result<(), ClientError> {
        self.record("send_code");
        Ok(())
    }

    async fn sign_in(&self, _phone: &str, _code: &str) -> Result<SignInOutcome, ClientError> {
        self.record("sign_in");
        self.sign_ins
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("PHONE_CODE_INVALID".to_string()))
            .map_err(ClientError::Remote)
    }

    async fn sign_in_password(&self, _password: &str) -> Result<(), ClientError> {
        self.record("sign_in_password");
        *self.authorized.lock() = true;
        Ok(())
    }

    async fn dialogs(&self) -> Result<Vec<Dialog>, ClientError> {
        self.record("dialogs");
        Ok(self.dialogs.clone())
    }

    async fn subscribe(
        &self,
        chats: HashSet<ChatId>,
    ) -> Result<mpsc::Receiver<IncomingMessage>, ClientError> {
        self.record("subscribe");
        let (tx, rx) = mpsc::channel(64);
        *self.subscribed.lock() = Some(chats);
        *self.events.lock() = Some(tx);
        Ok(rx)
    }

    async fn submit_vote(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        option_index: usize,
    ) -> Result<(), ClientError> {
        self.record("submit_vote");
        if let Some(error) = self.vote_error.lock().clone() {
            return Err(ClientError::Remote(error));
        }
        self.votes.lock().push((chat_id, message_id, option_index));
        Ok(())
    }
}

/// Hands out prepared clients by account index
pub struct MockFactory {
    pub clients: Vec<Arc<MockMessaging>>,
    pub sessions: Mutex<Vec<PathBuf>>,
}

impl MockFactory {
    pub fn new(clients: Vec<Arc<MockMessaging>>) -> Arc<Self> {
        Arc::new(Self {
            clients,
            sessions: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn create(
        &self,
        account: usize,
        session_path: &Path,
    ) -> Result<Arc<dyn MessagingClient>, ClientError> {
        self.sessions.lock().push(session_path.to_path_buf());
        let client = self
            .clients
            .get(account)
            .cloned()
            .ok_or_else(|| ClientError::Connection(format!("no mock for user{}", account)))?;
        Ok(client as Arc<dyn MessagingClient>)
    }
}

/// Renders every URL to the same bytes
pub struct StaticRenderer;

impl QrRenderer for StaticRenderer {
    fn render_png(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
        Ok(format!("PNG:{}", url).into_bytes())
    }
}

/// Records deliveries and whether the artifact existed at delivery time
pub struct RecordingSink {
    pub fail: bool,
    pub delivered: Mutex<Vec<(PathBuf, String, bool)>>,
}

impl RecordingSink {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            delivered: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl QrSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, image: &Path, caption: &str) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .push((image.to_path_buf(), caption.to_string(), image.exists()));
        if self.fail {
            return Err(DeliveryError::Rejected {
                status: 401,
                body: "Unauthorized".to_string(),
            });
        }
        Ok(())
    }
}

/// Answers every request with fixed values and records what was asked
pub struct FixedInput {
    pub requests: Mutex<Vec<InputRequest>>,
}

impl FixedInput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CredentialInput for FixedInput {
    async fn request(&self, request: InputRequest) -> Result<String, InputError> {
        self.requests.lock().push(request.clone());
        Ok(match request {
            InputRequest::Phone { .. } => "+15550100".to_string(),
            InputRequest::Code { .. } => "12345".to_string(),
            InputRequest::Password { .. } => "secret".to_string(),
        })
    }
}

pub fn poll_message(
    chat_id: ChatId,
    message_id: MessageId,
    question: &str,
    options: &[&str],
) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        message_id,
        poll: Some(PollContent {
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }),
    }
}

pub fn dialog(id: ChatId, name: &str, username: Option<&str>) -> Dialog {
    Dialog {
        id,
        name: name.to_string(),
        username: username.map(str::to_string),
    }
}
