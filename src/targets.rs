//! Target set: which requests are eligible for fault injection.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::identity::RequestIdentity;

/// Immutable set of targeted request identities.
///
/// An empty set means every request is targeted, never that none is.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    members: Arc<HashSet<RequestIdentity>>,
}

impl TargetSet {
    /// The empty set, which targets all requests.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// `true` when no explicit targets are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of distinct targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Explicit membership, ignoring the empty-means-all rule.
    #[must_use]
    pub fn contains(&self, identity: &RequestIdentity) -> bool {
        self.members.contains(identity)
    }

    /// Iterate over the configured targets in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RequestIdentity> {
        self.members.iter()
    }
}

impl FromIterator<RequestIdentity> for TargetSet {
    fn from_iter<I: IntoIterator<Item = RequestIdentity>>(iter: I) -> Self {
        Self {
            members: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl PartialEq for TargetSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.members, &other.members) || self.members == other.members
    }
}

impl Eq for TargetSet {}

impl fmt::Display for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self.iter().map(ToString::to_string).collect();
        entries.sort();
        write!(f, "[{}]", entries.join(", "))
    }
}

/// Whether `request` is subject to fault injection under `targets`.
#[must_use]
pub fn is_targeted(request: &RequestIdentity, targets: &TargetSet) -> bool {
    targets.is_empty() || targets.contains(request)
}
