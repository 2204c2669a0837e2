//! Revision tokens for optimistic concurrency.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque revision token.
///
/// A revision changes on every mutation of a document. The token from the
/// most recent read must be echoed on the next write; a write carrying a
/// stale token is rejected by the store.
///
/// The textual form is `generation-digest`, e.g. `3-9f2a40c1d408be77`.
/// Ordering compares generation first, then digest, which gives sync a
/// deterministic winner for concurrent edits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision {
    generation: u64,
    digest: String,
}

impl Revision {
    /// Creates a revision from its parts.
    pub fn new(generation: u64, digest: impl Into<String>) -> Self {
        Self {
            generation,
            digest: digest.into(),
        }
    }

    /// Derives the first revision for newly inserted content.
    pub fn first(content_digest: &str) -> Self {
        Self::new(1, content_digest)
    }

    /// Derives the successor revision for new content.
    pub fn next(&self, content_digest: &str) -> Self {
        Self::new(self.generation + 1, content_digest)
    }

    /// Returns the generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the content digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for Revision {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidRevision(s.to_string()))?;

        let generation: u64 = generation
            .parse()
            .map_err(|_| StoreError::InvalidRevision(s.to_string()))?;

        if digest.is_empty() {
            return Err(StoreError::InvalidRevision(s.to_string()));
        }

        Ok(Self::new(generation, digest))
    }
}

/// Computes the content digest for a revision token.
///
/// The digest is the first 8 bytes of SHA-256 over the encoded document
/// content, hex-encoded.
pub fn content_digest(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(content);
    hex::encode(&hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let rev = Revision::new(3, "9f2a40c1d408be77");
        let parsed: Revision = rev.to_string().parse().unwrap();
        assert_eq!(parsed, rev);
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert!("".parse::<Revision>().is_err());
        assert!("3".parse::<Revision>().is_err());
        assert!("3-".parse::<Revision>().is_err());
        assert!("x-abc".parse::<Revision>().is_err());
    }

    #[test]
    fn next_bumps_generation() {
        let rev = Revision::first("aaaa");
        let next = rev.next("bbbb");
        assert_eq!(next.generation(), 2);
        assert_eq!(next.digest(), "bbbb");
    }

    #[test]
    fn ordering_prefers_higher_generation() {
        let older = Revision::new(2, "ffff");
        let newer = Revision::new(3, "0000");
        assert!(newer > older);
    }

    #[test]
    fn ordering_breaks_ties_on_digest() {
        let a = Revision::new(3, "aaaa");
        let b = Revision::new(3, "bbbb");
        assert!(b > a);
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(content_digest(b"abc"), content_digest(b"abc"));
        assert_ne!(content_digest(b"abc"), content_digest(b"abd"));
        assert_eq!(content_digest(b"abc").len(), 16);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Conflict resolution picks winners by revision order, so a
            // higher generation must always win regardless of digests.
            #[test]
            fn higher_generation_always_orders_later(
                g in 1u64..u64::MAX,
                da in "[0-9a-f]{16}",
                db in "[0-9a-f]{16}",
            ) {
                prop_assert!(Revision::new(g + 1, da) > Revision::new(g, db));
            }

            #[test]
            fn textual_form_roundtrips(g in 1u64.., d in "[0-9a-f]{16}") {
                let rev = Revision::new(g, d);
                let parsed: Revision = rev.to_string().parse().unwrap();
                prop_assert_eq!(parsed, rev);
            }
        }
    }
}
