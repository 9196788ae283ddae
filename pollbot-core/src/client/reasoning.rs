//! Reasoning-service client contract

use crate::models::Credential;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reasoning API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Reasoning service returned no text")]
    EmptyResponse,

    #[error("Reasoning call failed: {0}")]
    Other(String),
}

/// Single request/response call against the reasoning service.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn generate(
        &self,
        credential: &Credential,
        model: &str,
        prompt: &str,
    ) -> Result<String, ReasoningError>;
}
