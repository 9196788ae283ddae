//! Poll events, resolved answers and vote outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Network chat identifier
pub type ChatId = i64;
/// Network message identifier, unique within a chat
pub type MessageId = i64;

/// Identity of one poll instance: `(chat_id, message_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl fmt::Display for PollKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.message_id)
    }
}

/// A poll observed in a watched chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollEvent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub question: String,
    /// Option texts in display order
    pub options: Vec<String>,
}

impl PollEvent {
    pub fn key(&self) -> PollKey {
        PollKey {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

/// Answer chosen for a poll. `option_index` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAnswer {
    pub option_index: usize,
    /// Time spent in the reasoning service
    pub duration: Duration,
}

/// Result of submitting a vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Success,
    /// The poll stopped accepting votes before ours landed
    AlreadyClosed,
    Failed(String),
}

impl VoteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VoteOutcome::Success)
    }
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteOutcome::Success => f.write_str("success"),
            VoteOutcome::AlreadyClosed => f.write_str("already_closed"),
            VoteOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-poll telemetry emitted once a response cycle ends
#[derive(Debug, Clone)]
pub struct PollReport {
    pub account: usize,
    pub key: PollKey,
    pub option_index: usize,
    pub reasoning: Duration,
    pub delay: Duration,
    pub vote_latency: Duration,
    /// First sight of the poll until the vote completed
    pub reaction_time: Duration,
    /// None when auto-voting is off
    pub outcome: Option<VoteOutcome>,
    /// Cosmetic display value, not a probability
    pub confidence: f64,
    pub first_seen: chrono::DateTime<chrono::Utc>,
}
