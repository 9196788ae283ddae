//! Credential input: phone numbers, login codes and 2FA passwords

use crate::models::LoginPreset;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("No input available for {0}")]
    Unavailable(String),

    #[error("Input cancelled")]
    Cancelled,

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A secret the login flow needs from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRequest {
    Phone { account: usize },
    Code { account: usize, phone: String },
    Password { account: usize },
}

impl InputRequest {
    pub fn account(&self) -> usize {
        match self {
            InputRequest::Phone { account }
            | InputRequest::Code { account, .. }
            | InputRequest::Password { account } => *account,
        }
    }

    /// Prompt text shown to a human operator
    pub fn prompt(&self) -> String {
        match self {
            InputRequest::Phone { account } => format!(
                "Enter phone number (with country code) for user{}: ",
                account
            ),
            InputRequest::Code { phone, .. } => format!("Enter login code for {}: ", phone),
            InputRequest::Password { account } => {
                format!("Enter 2FA password for user{}: ", account)
            }
        }
    }

    /// Whether the answer must not be echoed or logged
    pub fn is_secret(&self) -> bool {
        matches!(self, InputRequest::Password { .. })
    }
}

impl fmt::Display for InputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRequest::Phone { account } => write!(f, "phone number of user{}", account),
            InputRequest::Code { account, .. } => write!(f, "login code of user{}", account),
            InputRequest::Password { account } => write!(f, "2FA password of user{}", account),
        }
    }
}

/// Source of login secrets.
#[async_trait]
pub trait CredentialInput: Send + Sync {
    async fn request(&self, request: InputRequest) -> Result<String, InputError>;
}

/// Pre-supplied phone numbers and passwords; everything else goes to `fallback`.
pub struct PresetInput {
    presets: Vec<LoginPreset>,
    fallback: Option<Arc<dyn CredentialInput>>,
}

impl PresetInput {
    pub fn new(presets: Vec<LoginPreset>, fallback: Option<Arc<dyn CredentialInput>>) -> Self {
        Self { presets, fallback }
    }

    fn lookup(&self, request: &InputRequest) -> Option<String> {
        let preset = self.presets.iter().find(|p| p.account == request.account())?;
        match request {
            InputRequest::Phone { .. } => preset.phone.clone(),
            InputRequest::Password { .. } => preset.password.clone(),
            InputRequest::Code { .. } => None,
        }
    }
}

#[async_trait]
impl CredentialInput for PresetInput {
    async fn request(&self, request: InputRequest) -> Result<String, InputError> {
        if let Some(value) = self.lookup(&request) {
            tracing::debug!(account = request.account(), "Using pre-supplied {}", request);
            return Ok(value);
        }
        match &self.fallback {
            Some(fallback) => fallback.request(request).await,
            None => Err(InputError::Unavailable(request.to_string())),
        }
    }
}

type InputCallback =
    dyn Fn(InputRequest) -> BoxFuture<'static, Result<String, InputError>> + Send + Sync;

/// Delegates every request to an external async callback (e.g. a web form).
pub struct CallbackInput {
    callback: Arc<InputCallback>,
}

impl CallbackInput {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(InputRequest) -> BoxFuture<'static, Result<String, InputError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl CredentialInput for CallbackInput {
    async fn request(&self, request: InputRequest) -> Result<String, InputError> {
        (self.callback)(request).await
    }
}
