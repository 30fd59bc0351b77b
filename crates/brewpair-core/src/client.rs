use serde::Serialize;

use crate::config::RunConfig;
use crate::distance::{DistanceEstimator, DistanceMatrix, SharedGroupEstimator, UniformEstimator};
use crate::error::Result;
use crate::history::{FileHistory, PairHistory};
use crate::matching::{GeneratorOptions, generate};
use crate::models::{Algorithm, GroupId, MemberId};
use crate::provider::{ConversationProvider, MembershipProvider};
use crate::reminder::needs_reminder;

const INVITATION_TEXT: &str = ":wave: Hi! It can be hard to know all your colleagues, \
so I create opportunities for a :coffee: and a chat between members of <#{channel}>.\n\
What do you think about finding a time to get to know each other better?";

const REMINDER_TEXT: &str = ":slightly_smiling_face: Hi! Have you had the chance to \
schedule a time for a :coffee: and a chat?";

#[derive(Debug, Clone, Serialize)]
pub struct InvitationOutcome {
    pub members: usize,
    pub pairs: usize,
    pub triples: usize,
    pub unresolved_conflicts: usize,
    pub dispatched: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderOutcome {
    pub evaluated: usize,
    pub reminders_sent: usize,
    pub dry_run: bool,
}

/// Facade over one run: the `invitation` action generates and dispatches a
/// new round, the `reminder` action nudges last round's quiet groups. Each
/// run loads the history ledger once, up front, and appends at most once.
pub struct BrewPair<P> {
    config: RunConfig,
    provider: P,
}

impl<P> std::fmt::Debug for BrewPair<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrewPair").finish_non_exhaustive()
    }
}

impl<P> BrewPair<P>
where
    P: MembershipProvider + ConversationProvider,
{
    pub fn new(config: RunConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run_invitation(&self) -> Result<InvitationOutcome> {
        // Ledger problems abort before any provider traffic.
        let mut history = FileHistory::open(self.config.history_file())?;

        let channel = GroupId(self.config.slack.channel_id.clone());
        let listed = self.provider.list_active_members(&channel)?;
        let members = drop_ignored(listed, &self.config.slack.ignore_members);
        tracing::info!(members = members.len(), "active member set resolved");

        let matrix = self.build_distance_matrix(&members)?;
        let mut round = generate(
            &members,
            &matrix,
            &history,
            &GeneratorOptions {
                algorithm: self.config.pairing.algorithm,
                backtrack_days: self.config.pairing.backtrack_days,
                backtrack_max_attempts: self.config.pairing.backtrack_max_attempts,
            },
        );

        let invitation = INVITATION_TEXT.replace("{channel}", &self.config.slack.channel_id);
        let mut dispatched = 0usize;
        let total = round.groups.len();
        for (index, group) in round.groups.iter_mut().enumerate() {
            tracing::debug!(group = index + 1, total, "dispatching invitation");
            let conversation = match self.provider.create_conversation(&group.members) {
                Ok(conversation) => conversation,
                Err(err) => {
                    tracing::warn!(members = ?group.members, %err, "could not open conversation, continuing");
                    continue;
                }
            };
            group.conversation_id = Some(conversation.clone());
            match self.provider.send_message(&conversation, &invitation) {
                Ok(()) => dispatched += 1,
                Err(err) => {
                    tracing::warn!(conversation = %conversation, %err, "invitation send failed, continuing");
                }
            }
        }

        let outcome = InvitationOutcome {
            members: members.len(),
            pairs: round.groups.iter().filter(|g| !g.is_triple()).count(),
            triples: round.groups.iter().filter(|g| g.is_triple()).count(),
            unresolved_conflicts: round.unresolved_conflicts,
            dispatched,
            dry_run: self.config.run.dry_run,
        };

        history.append(round)?;
        tracing::info!(
            pairs = outcome.pairs,
            triples = outcome.triples,
            dispatched = outcome.dispatched,
            "invitation round persisted"
        );
        Ok(outcome)
    }

    pub fn run_reminder(&self) -> Result<ReminderOutcome> {
        let history = FileHistory::open(self.config.history_file())?;
        let last_round = history.last_round();
        if last_round.is_none() {
            tracing::warn!("no previous round, nothing to remind");
        }

        let since = last_round.map(|round| round.created_at);
        let quiet = needs_reminder(last_round, |conversation| {
            // `since` is present whenever a group exists to query.
            let Some(since) = since else { return Ok(true) };
            self.provider.has_activity_since(conversation, since)
        })?;

        let mut sent = 0usize;
        for group in &quiet {
            let Some(conversation) = &group.conversation_id else {
                continue;
            };
            tracing::debug!(conversation = %conversation, "sending reminder");
            match self.provider.send_message(conversation, REMINDER_TEXT) {
                Ok(()) => sent += 1,
                Err(err) => {
                    tracing::warn!(conversation = %conversation, %err, "reminder send failed, continuing");
                }
            }
        }

        tracing::info!(reminders = sent, "reminder run complete");
        Ok(ReminderOutcome {
            evaluated: last_round.map(|round| round.groups.len()).unwrap_or(0),
            reminders_sent: sent,
            dry_run: self.config.run.dry_run,
        })
    }

    fn build_distance_matrix(&self, members: &[MemberId]) -> Result<DistanceMatrix> {
        match self.config.pairing.algorithm {
            Algorithm::Simple => UniformEstimator.estimate(members),
            Algorithm::MaxDistance => {
                SharedGroupEstimator::new(&self.provider).estimate(members)
            }
        }
    }
}

fn drop_ignored(members: Vec<MemberId>, ignored: &[String]) -> Vec<MemberId> {
    members
        .into_iter()
        .filter(|member| !ignored.iter().any(|ignore| ignore == member.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_set_is_removed_from_the_active_members() {
        let members = vec![
            MemberId::new("U001"),
            MemberId::new("U002"),
            MemberId::new("U003"),
        ];
        let active = drop_ignored(members, &["U002".to_string()]);
        assert_eq!(active, vec![MemberId::new("U001"), MemberId::new("U003")]);
    }
}
