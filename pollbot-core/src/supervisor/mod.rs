//! Account supervision: log in every account, resolve groups, run responders

mod groups;

pub use groups::resolve_target_groups;

use crate::answer::AnswerProvider;
use crate::client::{ClientError, ClientFactory, MessagingClient};
use crate::models::{session_file, Configuration, PollReport};
use crate::providers::{CredentialInput, QrRenderer, QrSink};
use crate::responder::{PollCache, ResponderLoop, ResponsePolicy};
use crate::session::{LoginError, LoginPolicy, SessionManager};
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Session folder error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create client for user{account}: {source}")]
    Client {
        account: usize,
        #[source]
        source: ClientError,
    },

    #[error("Failed to list dialogs: {0}")]
    Dialogs(#[source] ClientError),

    #[error("Login failed for user{account}: {source}")]
    Login {
        account: usize,
        #[source]
        source: LoginError,
    },

    #[error("No account could be logged in")]
    NoAccounts,

    #[error("No target groups found (looked for: {})", .0.join(", "))]
    NoGroups(Vec<String>),

    #[error("Interrupted before startup finished")]
    Cancelled,
}

/// Run-wide options
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub account_count: usize,
    /// Abort when any account fails to log in
    pub require_all: bool,
    pub session_folder: PathBuf,
    pub targets: Vec<String>,
    pub login: LoginPolicy,
    pub response: ResponsePolicy,
}

impl SupervisorOptions {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            account_count: config.accounts.count,
            require_all: config.accounts.require_all,
            session_folder: config.accounts.session_folder.clone(),
            targets: config.groups.targets.clone(),
            login: LoginPolicy::from_config(config),
            response: ResponsePolicy::from_config(config),
        }
    }

    fn session_path(&self, account: usize) -> PathBuf {
        session_file(&self.session_folder, account)
    }
}

/// Owns every account for the lifetime of the process.
pub struct AccountSupervisor {
    options: SupervisorOptions,
    factory: Arc<dyn ClientFactory>,
    input: Arc<dyn CredentialInput>,
    renderer: Arc<dyn QrRenderer>,
    sink: Option<Arc<dyn QrSink>>,
    provider: Arc<AnswerProvider>,
    cache: Arc<PollCache>,
    reports: Option<mpsc::UnboundedSender<PollReport>>,
}

impl AccountSupervisor {
    pub fn new(
        options: SupervisorOptions,
        factory: Arc<dyn ClientFactory>,
        input: Arc<dyn CredentialInput>,
        renderer: Arc<dyn QrRenderer>,
        provider: Arc<AnswerProvider>,
        cache: Arc<PollCache>,
    ) -> Self {
        Self {
            options,
            factory,
            input,
            renderer,
            sink: None,
            provider,
            cache,
            reports: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn QrSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<PollReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Log in, resolve groups and respond until every loop ends or `shutdown` fires.
    /// All clients are disconnected before returning.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SupervisorError> {
        std::fs::create_dir_all(&self.options.session_folder)?;

        let mut created: Vec<Arc<dyn MessagingClient>> = Vec::new();
        let result = self.run_accounts(&shutdown, &mut created).await;

        for client in &created {
            if let Err(e) = client.disconnect().await {
                tracing::debug!(error = %e, "Disconnect failed");
            }
        }
        let stats = self.cache.stats();
        tracing::info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            cached = stats.len,
            "Poll cache statistics"
        );
        result
    }

    async fn run_accounts(
        &self,
        shutdown: &CancellationToken,
        created: &mut Vec<Arc<dyn MessagingClient>>,
    ) -> Result<(), SupervisorError> {
        let mut managers = Vec::with_capacity(self.options.account_count);
        for account in 0..self.options.account_count {
            let client = self
                .factory
                .create(account, &self.options.session_path(account))
                .await
                .map_err(|source| SupervisorError::Client { account, source })?;
            created.push(client.clone());

            let mut manager = SessionManager::new(
                account,
                client,
                self.input.clone(),
                self.renderer.clone(),
                self.options.login,
            );
            if let Some(sink) = &self.sink {
                manager = manager.with_sink(sink.clone());
            }
            managers.push(manager);
        }

        let logins = join_all(managers.iter().map(|m| async move { (m.account(), m.login().await) }));
        let results = tokio::select! {
            _ = shutdown.cancelled() => return Err(SupervisorError::Cancelled),
            results = logins => results,
        };

        let mut clients = Vec::new();
        for (account, result) in results {
            match result {
                Ok(client) => clients.push((account, client)),
                Err(source) if self.options.require_all => {
                    return Err(SupervisorError::Login { account, source });
                }
                Err(e) => {
                    tracing::error!(account, error = %e, "Account left out of the run");
                }
            }
        }
        if clients.is_empty() {
            return Err(SupervisorError::NoAccounts);
        }
        tracing::info!(accounts = clients.len(), "Accounts logged in");

        let (_, first) = &clients[0];
        let dialogs = first.dialogs().await.map_err(SupervisorError::Dialogs)?;
        let groups = resolve_target_groups(&dialogs, &self.options.targets);
        if groups.is_empty() {
            return Err(SupervisorError::NoGroups(self.options.targets.clone()));
        }

        let mut loops = JoinSet::new();
        for (account, client) in clients {
            let mut responder = ResponderLoop::new(
                account,
                client,
                groups.clone(),
                self.cache.clone(),
                self.provider.clone(),
                self.options.response,
            );
            if let Some(reports) = &self.reports {
                responder = responder.with_reports(reports.clone());
            }
            loops.spawn(responder.run(shutdown.child_token()));
        }

        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Responder ended with error"),
                Err(e) => tracing::error!("Responder task failed: {}", e),
            }
        }
        Ok(())
    }
}
