use crate::error::Result;
use crate::models::{ConversationId, PairGroup, Round};

/// Selects the groups of the last round that show no sign of a follow-up.
///
/// `activity` answers "any non-bot message in this conversation since the
/// round was created" and is the only collaborator boundary here. A group
/// whose conversation was never opened (dry-run rounds, failed dispatch) has
/// nothing to query or message and is skipped. No prior round means nothing
/// to remind, not an error.
pub fn needs_reminder<F>(last_round: Option<&Round>, mut activity: F) -> Result<Vec<PairGroup>>
where
    F: FnMut(&ConversationId) -> Result<bool>,
{
    let Some(round) = last_round else {
        return Ok(Vec::new());
    };

    let mut quiet = Vec::new();
    for group in &round.groups {
        let Some(conversation) = &group.conversation_id else {
            tracing::debug!(members = ?group.members, "group has no conversation, skipping");
            continue;
        };
        if !activity(conversation)? {
            quiet.push(group.clone());
        }
    }
    Ok(quiet)
}
