//! Answer provider: prompt the reasoning service with key failover

use crate::answer::{build_prompt, parse_option_index, CredentialPool};
use crate::client::ReasoningClient;
use crate::models::ResolvedAnswer;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Prompt used by the startup self-check
pub const PROBE_PROMPT: &str = "Test";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Credential pool is empty")]
    EmptyPool,

    #[error("All {tried} reasoning API keys failed the startup check")]
    NoUsableCredential { tried: usize },
}

/// Resolves poll answers through the reasoning service.
pub struct AnswerProvider {
    client: Arc<dyn ReasoningClient>,
    pool: CredentialPool,
    model: String,
    fast_mode: bool,
    permits: Semaphore,
}

impl AnswerProvider {
    /// Probe each key in order and adopt the first that answers.
    ///
    /// Failing every key is fatal: the process must not start without a working key.
    pub async fn initialize(
        client: Arc<dyn ReasoningClient>,
        pool: CredentialPool,
        model: impl Into<String>,
        fast_mode: bool,
        max_concurrent_requests: usize,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        let mut adopted = None;
        for (index, key) in pool.iter().enumerate() {
            match client.generate(key, &model, PROBE_PROMPT).await {
                Ok(_) => {
                    tracing::info!(key_index = index + 1, key = %key.masked(), "Using reasoning API key");
                    adopted = Some(index);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        key_index = index + 1,
                        key = %key.masked(),
                        error = %e,
                        "Reasoning API key failed startup check"
                    );
                }
            }
        }

        let index = adopted.ok_or(ProviderError::NoUsableCredential { tried: pool.len() })?;
        pool.adopt(index);
        Ok(Self {
            client,
            pool,
            model,
            fast_mode,
            permits: Semaphore::new(max_concurrent_requests.max(1)),
        })
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt`, rotating keys on failure. Makes at most one call per key
    /// and returns `None` ("no answer") once every key has failed.
    pub async fn ask(&self, prompt: &str) -> Option<String> {
        let _permit = self.permits.acquire().await.ok()?;
        let (start, _) = self.pool.current();
        let total = self.pool.len();

        for attempt in 0..total {
            let index = (start + attempt) % total;
            let key = self.pool.get(index);
            match self.client.generate(key, &self.model, prompt).await {
                Ok(text) => return Some(text.trim().to_string()),
                Err(e) => {
                    tracing::error!(
                        attempt = attempt + 1,
                        key = %key.masked(),
                        error = %e,
                        "Reasoning API error, switching key"
                    );
                    self.pool.advance(index);
                }
            }
        }

        tracing::error!(tried = total, "All reasoning API keys failed");
        None
    }

    /// Choose an option for a poll. Never fails: unusable replies select option 0.
    pub async fn resolve(&self, question: &str, options: &[String]) -> ResolvedAnswer {
        let prompt = build_prompt(question, options, self.fast_mode);
        let started = Instant::now();
        let raw = self.ask(&prompt).await;
        let duration = started.elapsed();

        let option_index = match raw.as_deref() {
            Some(text) => parse_option_index(text, options),
            None => 0,
        };
        tracing::debug!(
            raw = raw.as_deref().unwrap_or("<no answer>"),
            option = option_index + 1,
            elapsed_ms = duration.as_millis() as u64,
            "Resolved poll answer"
        );

        ResolvedAnswer {
            option_index,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ReasoningError;
    use crate::models::Credential;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails for keys listed in `broken`, answers `reply` otherwise
    struct ScriptedClient {
        broken: Vec<&'static str>,
        reply: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReasoningClient for ScriptedClient {
        async fn generate(
            &self,
            credential: &Credential,
            _model: &str,
            _prompt: &str,
        ) -> Result<String, ReasoningError> {
            self.calls.lock().push(credential.expose().to_string());
            if self.broken.iter().any(|k| *k == credential.expose()) {
                Err(ReasoningError::Api {
                    status: 429,
                    message: "quota".to_string(),
                })
            } else {
                Ok(self.reply.to_string())
            }
        }
    }

    fn client(broken: Vec<&'static str>, reply: &'static str) -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient {
            broken,
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn pool(keys: &[&str]) -> CredentialPool {
        CredentialPool::new(keys.iter().map(|k| Credential::new(*k)).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_adopts_first_working_key() {
        let mock = client(vec!["k1"], "ok");
        let provider = AnswerProvider::initialize(mock.clone(), pool(&["k1", "k2", "k3"]), "m", true, 2)
            .await
            .unwrap();
        assert_eq!(provider.pool().current().0, 1);
        assert_eq!(*mock.calls.lock(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_every_key_fails() {
        let mock = client(vec!["k1", "k2"], "ok");
        let result = AnswerProvider::initialize(mock, pool(&["k1", "k2"]), "m", true, 2).await;
        assert!(matches!(
            result,
            Err(ProviderError::NoUsableCredential { tried: 2 })
        ));
    }

    #[tokio::test]
    async fn test_resolve_parses_reply() {
        let mock = client(vec![], " 2\n");
        let provider = AnswerProvider::initialize(mock, pool(&["k1"]), "m", false, 1)
            .await
            .unwrap();
        let options = vec!["3".to_string(), "4".to_string(), "5".to_string()];
        let answer = provider.resolve("2+2?", &options).await;
        assert_eq!(answer.option_index, 1);
    }

    #[tokio::test]
    async fn test_ask_tries_each_key_once_then_gives_up() {
        let mock = client(vec![], "ok");
        let provider = AnswerProvider::initialize(mock.clone(), pool(&["k1", "k2", "k3"]), "m", true, 1)
            .await
            .unwrap();
        mock.calls.lock().clear();

        // Swap in a client where every key now fails
        let failing = client(vec!["k1", "k2", "k3"], "ok");
        let provider = AnswerProvider {
            client: failing.clone(),
            ..provider
        };
        assert!(provider.ask("q").await.is_none());
        assert_eq!(*failing.calls.lock(), vec!["k1", "k2", "k3"]);

        let options = vec!["a".to_string(), "b".to_string()];
        assert_eq!(provider.resolve("q", &options).await.option_index, 0);
    }
}
