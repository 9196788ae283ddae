//! Account lifecycle and target groups

use crate::models::ChatId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Login lifecycle of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    CheckExisting,
    QrAttempt(u32),
    PhoneAttempt(u32),
    Authorized,
    Connected,
    Failed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Unauthenticated => f.write_str("unauthenticated"),
            LoginState::CheckExisting => f.write_str("check_existing"),
            LoginState::QrAttempt(n) => write!(f, "qr_attempt({})", n),
            LoginState::PhoneAttempt(n) => write!(f, "phone_attempt({})", n),
            LoginState::Authorized => f.write_str("authorized"),
            LoginState::Connected => f.write_str("connected"),
            LoginState::Failed => f.write_str("failed"),
        }
    }
}

/// One entry of an account's dialog list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: ChatId,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Configured group names resolved to chat ids, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetGroups {
    entries: Vec<(String, ChatId)>,
}

impl TargetGroups {
    /// Record a resolution. A later match for the same target replaces the earlier one.
    pub fn insert(&mut self, target: &str, chat_id: ChatId) {
        match self.entries.iter_mut().find(|(t, _)| t == target) {
            Some(entry) => entry.1 = chat_id,
            None => self.entries.push((target.to_string(), chat_id)),
        }
    }

    pub fn get(&self, target: &str) -> Option<ChatId> {
        self.entries
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, id)| *id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChatId)> {
        self.entries.iter().map(|(t, id)| (t.as_str(), *id))
    }

    /// Distinct chat ids to subscribe to
    pub fn chat_ids(&self) -> HashSet<ChatId> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }
}
