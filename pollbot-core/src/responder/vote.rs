//! One-shot vote submission

use crate::client::{ClientError, MessagingClient};
use crate::models::{PollEvent, VoteOutcome};
use std::sync::Arc;

/// Submits votes for one account. Never retries: a vote is a one-shot action.
#[derive(Clone)]
pub struct VoteDispatcher {
    account: usize,
    client: Arc<dyn MessagingClient>,
}

impl VoteDispatcher {
    pub fn new(account: usize, client: Arc<dyn MessagingClient>) -> Self {
        Self { account, client }
    }

    pub async fn vote(&self, poll: &PollEvent, option_index: usize) -> VoteOutcome {
        if option_index >= poll.options.len() {
            let reason = format!(
                "option {} out of range for {} options",
                option_index,
                poll.options.len()
            );
            tracing::error!(account = self.account, key = %poll.key(), "Vote not submitted: {}", reason);
            return VoteOutcome::Failed(reason);
        }

        match self
            .client
            .submit_vote(poll.chat_id, poll.message_id, option_index)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    account = self.account,
                    key = %poll.key(),
                    option = option_index + 1,
                    "Vote submitted"
                );
                VoteOutcome::Success
            }
            Err(e) => {
                let outcome = classify_vote_error(&e);
                match &outcome {
                    VoteOutcome::AlreadyClosed => {
                        tracing::warn!(account = self.account, key = %poll.key(), "Poll already closed")
                    }
                    _ => {
                        tracing::error!(account = self.account, key = %poll.key(), error = %e, "Vote failed")
                    }
                }
                outcome
            }
        }
    }
}

/// Map a submission failure to an outcome. A network error mentioning "closed"
/// (case-insensitive) means the poll stopped accepting votes; transport
/// failures are always `Failed`.
pub fn classify_vote_error(error: &ClientError) -> VoteOutcome {
    match error {
        ClientError::Remote(message) if message.to_lowercase().contains("closed") => {
            VoteOutcome::AlreadyClosed
        }
        other => VoteOutcome::Failed(other.to_string()),
    }
}
