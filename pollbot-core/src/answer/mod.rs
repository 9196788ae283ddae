//! Answer resolution against the reasoning service

mod pool;
mod prompt;
mod provider;

pub use pool::CredentialPool;
pub use prompt::{build_prompt, parse_option_index};
pub use provider::{AnswerProvider, ProviderError, PROBE_PROMPT};
