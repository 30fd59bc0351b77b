use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{GroupId, MemberId};
use crate::provider::MembershipProvider;

/// Symmetric social-distance lookup over an active member set. Built once per
/// invitation run and never mutated afterward.
#[derive(Debug, Clone, Default)]
pub struct DistanceMatrix {
    distances: BTreeMap<(MemberId, MemberId), f64>,
}

impl DistanceMatrix {
    /// Distance between two distinct members. Unknown pairs read as the
    /// uniform distance so a partial matrix degrades instead of panicking.
    pub fn distance(&self, a: &MemberId, b: &MemberId) -> f64 {
        self.distances
            .get(&ordered_key(a, b))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn set(&mut self, a: &MemberId, b: &MemberId, distance: f64) {
        debug_assert!(a != b, "distance to self is undefined");
        debug_assert!(distance >= 0.0, "distance must be non-negative");
        self.distances.insert(ordered_key(a, b), distance);
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Total distance of a proposed matching.
    pub fn matching_weight<'a, I>(&self, pairs: I) -> f64
    where
        I: IntoIterator<Item = (&'a MemberId, &'a MemberId)>,
    {
        pairs
            .into_iter()
            .map(|(a, b)| self.distance(a, b))
            .sum()
    }
}

fn ordered_key(a: &MemberId, b: &MemberId) -> (MemberId, MemberId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Produces the distance matrix for one run. Implementations decide how much
/// of the platform they consult; `UniformEstimator` consults nothing.
pub trait DistanceEstimator {
    fn estimate(&self, members: &[MemberId]) -> Result<DistanceMatrix>;
}

/// Every pair at distance 1.0; selection degenerates to a random matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformEstimator;

impl DistanceEstimator for UniformEstimator {
    fn estimate(&self, _members: &[MemberId]) -> Result<DistanceMatrix> {
        Ok(DistanceMatrix::default())
    }
}

/// Distance from shared-group overlap: `1 / (1 + |groups(a) ∩ groups(b)|)`.
/// One bulk membership fetch per member, overlap computed locally.
pub struct SharedGroupEstimator<'a, P: MembershipProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: MembershipProvider + ?Sized> SharedGroupEstimator<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }
}

impl<P: MembershipProvider + ?Sized> DistanceEstimator for SharedGroupEstimator<'_, P> {
    fn estimate(&self, members: &[MemberId]) -> Result<DistanceMatrix> {
        let mut group_sets: BTreeMap<&MemberId, std::collections::BTreeSet<GroupId>> =
            BTreeMap::new();
        for member in members {
            let groups = self.provider.list_groups_of(member)?;
            tracing::debug!(member = %member, groups = groups.len(), "fetched group membership");
            group_sets.insert(member, groups);
        }

        let mut matrix = DistanceMatrix::default();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                let shared = group_sets[a].intersection(&group_sets[b]).count();
                matrix.set(a, b, 1.0 / (1.0 + shared as f64));
            }
        }
        Ok(matrix)
    }
}
