//! Conflict detection and resolution policy.

use foliodb_core::{DocumentId, Revision};
use serde::{Deserialize, Serialize};

/// Which side of a divergent write was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictWinner {
    /// The local version was kept.
    Local,
    /// The remote version was kept.
    Remote,
}

/// How divergent writes to the same document are resolved.
///
/// Resolution is deterministic on both sides, so replicas converge
/// without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// The remote version always wins.
    RemoteWins,
    /// The local version always wins.
    LocalWins,
    /// The higher revision wins; ties break on the digest.
    #[default]
    HigherRevisionWins,
}

impl ConflictPolicy {
    /// Picks the winner for a divergent write.
    #[must_use]
    pub fn pick(&self, local: &Revision, remote: &Revision) -> ConflictWinner {
        match self {
            Self::RemoteWins => ConflictWinner::Remote,
            Self::LocalWins => ConflictWinner::Local,
            Self::HigherRevisionWins => {
                if remote > local {
                    ConflictWinner::Remote
                } else {
                    ConflictWinner::Local
                }
            }
        }
    }
}

/// A detected divergent write, with its resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// The contested document's id.
    pub doc_id: DocumentId,
    /// Revision held by the losing read of the local side.
    pub local_rev: Revision,
    /// Revision carried by the remote operation.
    pub remote_rev: Revision,
    /// Which side was kept.
    pub winner: ConflictWinner,
}

impl Conflict {
    /// Records a conflict resolved under `policy`.
    pub fn resolve(
        doc_id: DocumentId,
        local_rev: Revision,
        remote_rev: Revision,
        policy: ConflictPolicy,
    ) -> Self {
        let winner = policy.pick(&local_rev, &remote_rev);
        Self {
            doc_id,
            local_rev,
            remote_rev,
            winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_revision_wins_by_generation() {
        let policy = ConflictPolicy::default();
        let local = Revision::new(3, "aaaaaaaaaaaaaaaa");
        let remote = Revision::new(4, "0000000000000000");
        assert_eq!(policy.pick(&local, &remote), ConflictWinner::Remote);
        assert_eq!(policy.pick(&remote, &local), ConflictWinner::Local);
    }

    #[test]
    fn equal_generations_break_on_digest() {
        let policy = ConflictPolicy::HigherRevisionWins;
        let low = Revision::new(2, "0000000000000001");
        let high = Revision::new(2, "ffffffffffffffff");
        assert_eq!(policy.pick(&low, &high), ConflictWinner::Remote);
        // Identical revisions: local is kept, the write is a no-op.
        assert_eq!(policy.pick(&high, &high), ConflictWinner::Local);
    }

    #[test]
    fn fixed_policies_ignore_revisions() {
        let local = Revision::new(9, "ffffffffffffffff");
        let remote = Revision::new(1, "0000000000000000");
        assert_eq!(
            ConflictPolicy::RemoteWins.pick(&local, &remote),
            ConflictWinner::Remote
        );
        assert_eq!(
            ConflictPolicy::LocalWins.pick(&local, &remote),
            ConflictWinner::Local
        );
    }

    #[test]
    fn resolve_records_both_revisions() {
        let conflict = Conflict::resolve(
            DocumentId::new("doc").unwrap(),
            Revision::new(2, "00"),
            Revision::new(3, "ff"),
            ConflictPolicy::default(),
        );
        assert_eq!(conflict.winner, ConflictWinner::Remote);
        assert_eq!(conflict.local_rev.generation(), 2);
        assert_eq!(conflict.remote_rev.generation(), 3);
    }
}
