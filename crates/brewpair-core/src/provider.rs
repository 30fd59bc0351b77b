use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ConversationId, GroupId, MemberId};

/// Read-side boundary to the messaging platform.
pub trait MembershipProvider {
    /// All current members of the target group. The caller applies the
    /// configured ignore-set.
    fn list_active_members(&self, group: &GroupId) -> Result<Vec<MemberId>>;

    /// The groups a member belongs to. A provider that lacks the permission
    /// for this lookup returns an empty set, which degrades distance
    /// estimation toward uniform rather than failing the run.
    fn list_groups_of(&self, member: &MemberId) -> Result<BTreeSet<GroupId>>;
}

impl<P: MembershipProvider + ?Sized> MembershipProvider for &P {
    fn list_active_members(&self, group: &GroupId) -> Result<Vec<MemberId>> {
        (**self).list_active_members(group)
    }

    fn list_groups_of(&self, member: &MemberId) -> Result<BTreeSet<GroupId>> {
        (**self).list_groups_of(member)
    }
}

/// Write/activity-side boundary to the messaging platform.
pub trait ConversationProvider {
    fn create_conversation(&self, members: &[MemberId]) -> Result<ConversationId>;

    fn send_message(&self, conversation: &ConversationId, text: &str) -> Result<()>;

    /// Whether any non-bot message landed in the conversation since `since`.
    fn has_activity_since(
        &self,
        conversation: &ConversationId,
        since: DateTime<Utc>,
    ) -> Result<bool>;
}

impl<P: ConversationProvider + ?Sized> ConversationProvider for &P {
    fn create_conversation(&self, members: &[MemberId]) -> Result<ConversationId> {
        (**self).create_conversation(members)
    }

    fn send_message(&self, conversation: &ConversationId, text: &str) -> Result<()> {
        (**self).send_message(conversation, text)
    }

    fn has_activity_since(
        &self,
        conversation: &ConversationId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        (**self).has_activity_since(conversation, since)
    }
}
