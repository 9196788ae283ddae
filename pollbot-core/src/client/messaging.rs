//! Messaging-network client contract

use crate::models::{ChatId, Dialog, MessageId, PollEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by the messaging client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    /// Error reported by the network, message verbatim
    #[error("{0}")]
    Remote(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result of a phone-code sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInOutcome {
    Authorized,
    /// The account has a second factor; call `sign_in_password`
    PasswordRequired,
}

/// A new message delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Poll content when the message carries a poll
    #[serde(default)]
    pub poll: Option<PollContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollContent {
    pub question: String,
    pub options: Vec<String>,
}

impl IncomingMessage {
    /// The poll event carried by this message, if any
    pub fn poll_event(&self) -> Option<PollEvent> {
        self.poll.as_ref().map(|poll| PollEvent {
            chat_id: self.chat_id,
            message_id: self.message_id,
            question: poll.question.clone(),
            options: poll.options.clone(),
        })
    }
}

/// Pending QR login. `wait` resolves once the code is scanned and confirmed.
#[async_trait]
pub trait QrLogin: Send + Sync {
    fn url(&self) -> &str;

    async fn wait(&self) -> Result<(), ClientError>;
}

/// One account's connection to the messaging network.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn connect(&self) -> Result<(), ClientError>;

    async fn disconnect(&self) -> Result<(), ClientError>;

    async fn is_authorized(&self) -> Result<bool, ClientError>;

    async fn request_qr_login(&self) -> Result<Box<dyn QrLogin>, ClientError>;

    async fn send_code(&self, phone: &str) -> Result<(), ClientError>;

    async fn sign_in(&self, phone: &str, code: &str) -> Result<SignInOutcome, ClientError>;

    async fn sign_in_password(&self, password: &str) -> Result<(), ClientError>;

    async fn dialogs(&self) -> Result<Vec<Dialog>, ClientError>;

    /// Subscribe to new messages in `chats`. The channel closes when the account disconnects.
    async fn subscribe(
        &self,
        chats: HashSet<ChatId>,
    ) -> Result<mpsc::Receiver<IncomingMessage>, ClientError>;

    async fn submit_vote(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        option_index: usize,
    ) -> Result<(), ClientError>;
}

/// Builds one client per account, bound to that account's session file.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(
        &self,
        account: usize,
        session_path: &Path,
    ) -> Result<Arc<dyn MessagingClient>, ClientError>;
}
