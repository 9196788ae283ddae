//! Target group resolution against a dialog list

use crate::models::{Dialog, TargetGroups};

/// Resolve configured targets to chat ids.
///
/// A dialog matches a target when its name contains the target
/// (case-insensitive) or its username equals it. When several dialogs match
/// one target, the last one in dialog order wins.
pub fn resolve_target_groups(dialogs: &[Dialog], targets: &[String]) -> TargetGroups {
    let mut groups = TargetGroups::default();
    let targets: Vec<(&str, String)> = targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| (t, t.trim_start_matches('@').to_lowercase()))
        .collect();

    for dialog in dialogs {
        let name = dialog.name.to_lowercase();
        let username = dialog.username.as_deref().unwrap_or("").to_lowercase();
        for (target, needle) in &targets {
            if name.contains(needle.as_str()) || username == *needle {
                tracing::info!(target = %target, chat_id = dialog.id, name = %dialog.name, "Found target group");
                groups.insert(target, dialog.id);
            }
        }
    }

    for (target, _) in &targets {
        if groups.get(target).is_none() {
            tracing::warn!(target = %target, "Target group not found");
        }
    }
    groups
}
