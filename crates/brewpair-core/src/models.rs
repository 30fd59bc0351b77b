use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrewError;

/// Opaque platform identifier of a participant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Simple,
    MaxDistance,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::MaxDistance => "max-distance",
        }
    }
}

impl FromStr for Algorithm {
    type Err = BrewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "max-distance" => Ok(Self::MaxDistance),
            other => Err(BrewError::Configuration(format!(
                "unsupported pairing algorithm '{other}' (expected 'simple' or 'max-distance')"
            ))),
        }
    }
}

/// Two members paired for a coffee date, or three when the round had an odd
/// member count. The conversation id is attached at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairGroup {
    pub members: Vec<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

impl PairGroup {
    pub fn pair(a: MemberId, b: MemberId) -> Self {
        Self {
            members: vec![a, b],
            conversation_id: None,
        }
    }

    pub fn is_triple(&self) -> bool {
        self.members.len() == 3
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.iter().any(|m| m == member)
    }

    /// Every unordered member pair inside the group. A triple yields three.
    pub fn member_pairs(&self) -> impl Iterator<Item = (&MemberId, &MemberId)> {
        let members = &self.members;
        (0..members.len()).flat_map(move |i| {
            (i + 1..members.len()).map(move |j| (&members[i], &members[j]))
        })
    }
}

/// One invitation run's output. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub created_at: DateTime<Utc>,
    pub algorithm: Algorithm,
    pub groups: Vec<PairGroup>,
    /// Recency conflicts left in place after the retry budget ran out.
    /// Zero for a clean round.
    #[serde(default)]
    pub unresolved_conflicts: usize,
}

impl Round {
    pub fn member_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn triple(&self) -> Option<&PairGroup> {
        self.groups.iter().find(|g| g.is_triple())
    }
}
