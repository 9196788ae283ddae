//! Account login state machine

use crate::client::{ClientError, MessagingClient, SignInOutcome};
use crate::models::{Configuration, LoginState};
use crate::providers::{
    CredentialInput, DeliveryError, InputError, InputRequest, QrRenderer, QrSink,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Messaging client error: {0}")]
    Client(#[from] ClientError),

    #[error("Login input error: {0}")]
    Input(#[from] InputError),

    #[error("QR code error: {0}")]
    Qr(#[from] DeliveryError),

    #[error("QR artifact error: {0}")]
    Io(#[from] std::io::Error),

    #[error("QR code accepted but user{0} is still not authorized")]
    QrUnconfirmed(usize),

    #[error("Login cancelled for user{0}")]
    Cancelled(usize),

    #[error("Login failed for user{account} after {qr_attempts} QR and {phone_attempts} phone attempts")]
    Exhausted {
        account: usize,
        qr_attempts: u32,
        phone_attempts: u32,
    },
}

/// Attempt limits and backoffs for one login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    pub max_qr_attempts: u32,
    pub max_phone_attempts: u32,
    pub qr_backoff: Duration,
    pub phone_backoff: Duration,
}

impl LoginPolicy {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            max_qr_attempts: config.login.max_qr_attempts,
            max_phone_attempts: config.login.max_phone_attempts,
            qr_backoff: Duration::from_secs(config.login.qr_backoff_secs),
            phone_backoff: Duration::from_secs(config.login.phone_backoff_secs),
        }
    }
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_qr_attempts: 3,
            max_phone_attempts: 3,
            qr_backoff: Duration::from_secs(30),
            phone_backoff: Duration::from_secs(10),
        }
    }
}

/// Drives one account from its persisted session to a connected, authorized handle.
///
/// Order: existing session, then up to `max_qr_attempts` QR logins, then up to
/// `max_phone_attempts` phone logins. Retries are bounded by count only; waits
/// on a scan or a code have no deadline of their own.
pub struct SessionManager {
    account: usize,
    client: Arc<dyn MessagingClient>,
    input: Arc<dyn CredentialInput>,
    renderer: Arc<dyn QrRenderer>,
    sink: Option<Arc<dyn QrSink>>,
    policy: LoginPolicy,
    state: watch::Sender<LoginState>,
}

impl SessionManager {
    pub fn new(
        account: usize,
        client: Arc<dyn MessagingClient>,
        input: Arc<dyn CredentialInput>,
        renderer: Arc<dyn QrRenderer>,
        policy: LoginPolicy,
    ) -> Self {
        let (state, _) = watch::channel(LoginState::Unauthenticated);
        Self {
            account,
            client,
            input,
            renderer,
            sink: None,
            policy,
            state,
        }
    }

    /// Deliver each QR code through `sink`
    pub fn with_sink(mut self, sink: Arc<dyn QrSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn account(&self) -> usize {
        self.account
    }

    pub fn state(&self) -> LoginState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LoginState) {
        tracing::debug!(account = self.account, state = %next, "Login state");
        self.state.send_replace(next);
    }

    /// Run the login flow. Exhausting every attempt is fatal for this account.
    pub async fn login(&self) -> Result<Arc<dyn MessagingClient>, LoginError> {
        match self.authorize().await {
            Ok(()) => {
                self.transition(LoginState::Authorized);
                self.transition(LoginState::Connected);
                tracing::info!(account = self.account, "Account connected");
                Ok(self.client.clone())
            }
            Err(e) => {
                self.transition(LoginState::Failed);
                tracing::error!(account = self.account, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn authorize(&self) -> Result<(), LoginError> {
        self.transition(LoginState::CheckExisting);
        self.client.connect().await?;
        if self.client.is_authorized().await? {
            tracing::info!(account = self.account, "Existing session is authorized");
            return Ok(());
        }

        let qr_attempts = self.policy.max_qr_attempts;
        for attempt in 1..=qr_attempts {
            self.transition(LoginState::QrAttempt(attempt));
            tracing::info!(account = self.account, attempt, max = qr_attempts, "QR login attempt");
            match self.qr_attempt(attempt).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(account = self.account, attempt, error = %e, "QR login attempt failed");
                    if attempt < qr_attempts {
                        tokio::time::sleep(self.policy.qr_backoff).await;
                    }
                }
            }
        }
        if qr_attempts > 0 {
            tracing::warn!(account = self.account, "QR login exhausted, falling back to phone login");
        }

        let phone_attempts = self.policy.max_phone_attempts;
        for attempt in 1..=phone_attempts {
            self.transition(LoginState::PhoneAttempt(attempt));
            tracing::info!(account = self.account, attempt, max = phone_attempts, "Phone login attempt");
            match self.phone_attempt().await {
                Ok(()) => return Ok(()),
                Err(LoginError::Input(InputError::Cancelled)) => {
                    return Err(LoginError::Cancelled(self.account))
                }
                Err(e) => {
                    tracing::warn!(account = self.account, attempt, error = %e, "Phone login attempt failed");
                    if attempt < phone_attempts {
                        tokio::time::sleep(self.policy.phone_backoff).await;
                    }
                }
            }
        }

        Err(LoginError::Exhausted {
            account: self.account,
            qr_attempts,
            phone_attempts,
        })
    }

    async fn qr_attempt(&self, attempt: u32) -> Result<(), LoginError> {
        let login = self.client.request_qr_login().await?;
        let png = self.renderer.render_png(login.url())?;

        // Removed when this attempt returns, on every path
        let mut artifact = tempfile::Builder::new()
            .prefix(&format!("qr_user{}_", self.account))
            .suffix(".png")
            .tempfile()?;
        artifact.write_all(&png)?;
        artifact.flush()?;

        if let Some(sink) = &self.sink {
            let caption = format!(
                "Scan to log in user{} (attempt {}/{})",
                self.account, attempt, self.policy.max_qr_attempts
            );
            match sink.deliver(artifact.path(), &caption).await {
                Ok(()) => tracing::info!(account = self.account, sink = sink.name(), "QR code delivered"),
                Err(e) => tracing::warn!(
                    account = self.account,
                    sink = sink.name(),
                    error = %e,
                    "QR delivery failed, still waiting for scan"
                ),
            }
        } else {
            tracing::info!(
                account = self.account,
                path = %artifact.path().display(),
                url = login.url(),
                "QR code ready, scan it from the saved image"
            );
        }

        login.wait().await?;
        if !self.client.is_authorized().await? {
            return Err(LoginError::QrUnconfirmed(self.account));
        }
        Ok(())
    }

    async fn phone_attempt(&self) -> Result<(), LoginError> {
        let phone = self
            .input
            .request(InputRequest::Phone {
                account: self.account,
            })
            .await?;
        let phone = phone.trim().to_string();
        self.client.send_code(&phone).await?;

        let code = self
            .input
            .request(InputRequest::Code {
                account: self.account,
                phone: phone.clone(),
            })
            .await?;
        match self.client.sign_in(&phone, code.trim()).await? {
            SignInOutcome::Authorized => Ok(()),
            SignInOutcome::PasswordRequired => {
                tracing::info!(account = self.account, "Two-factor password required");
                let password = self
                    .input
                    .request(InputRequest::Password {
                        account: self.account,
                    })
                    .await?;
                self.client.sign_in_password(&password).await?;
                Ok(())
            }
        }
    }
}
