use std::collections::HashMap;

use thiserror::Error;

use super::{EngineConfig, Fingerprint, Signature};

/// Failure inside the storage collaborator, wrapping whatever error the
/// backing implementation produced. Always surfaced to the caller — a
/// broken store is never reported as "no match".
#[derive(Debug, Error)]
#[error("fingerprint store unavailable: {0}")]
pub struct StoreError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// A stored fingerprint retrieved by exact signature equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHit {
    pub track_id: i64,
    pub center: u32,
}

/// The storage collaborator contract. Implementations are handed in
/// explicitly wherever fingerprints are written or matched; nothing in the
/// engine holds a connection of its own.
///
/// `lookup_by_signature` must be a side-effect-free read so concurrent
/// identifications against one catalog need no locking.
pub trait FingerprintStore {
    fn insert_fingerprints(
        &self,
        track_id: i64,
        fingerprints: &[Fingerprint],
    ) -> Result<(), StoreError>;

    fn lookup_by_signature(&self, signature: Signature) -> Result<Vec<SignatureHit>, StoreError>;

    /// Flip a track's catalog entry to "fully fingerprinted".
    fn mark_fingerprinted(&self, track_id: i64) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("query produced no signatures")]
    EmptyQuery,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one identification call.
#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Identified { track_id: i64, confidence: f32 },
    /// Two or more tracks tied for the strongest alignment. Reported as-is
    /// rather than picking one arbitrarily.
    Ambiguous { candidates: Vec<i64>, confidence: f32 },
    Unmatched,
}

/// Match a query's fingerprints against the catalog.
///
/// For every stored fingerprint sharing a signature with the query, the
/// alignment `offset = stored center - query time` gets one vote in a
/// per-(track, offset) histogram. A real match concentrates its votes in
/// one bucket (all true hash pairs share the query's alignment within the
/// track), while spurious signature collisions scatter across offsets, so
/// the dominant bucket exposes the true track even under heavy collision
/// noise. The winner must clear `min_votes`; equal top buckets on
/// different tracks come back as [`Identification::Ambiguous`].
///
/// Confidence is the top bucket's vote count over the query signature
/// count, bounded to [0, 1].
pub fn identify<S: FingerprintStore + ?Sized>(
    query: &[Fingerprint],
    store: &S,
    config: &EngineConfig,
) -> Result<Identification, MatchError> {
    if query.is_empty() {
        return Err(MatchError::EmptyQuery);
    }

    // Collecting + voting in one pass: each signature lookup is an
    // independent idempotent read.
    let mut votes: HashMap<(i64, i64), usize> = HashMap::new();
    for fingerprint in query {
        for hit in store.lookup_by_signature(fingerprint.signature)? {
            let offset = hit.center as i64 - fingerprint.center as i64;
            *votes.entry((hit.track_id, offset)).or_default() += 1;
        }
    }

    let Some(&best) = votes.values().max() else {
        log::debug!("no stored fingerprints matched {} query signatures", query.len());
        return Ok(Identification::Unmatched);
    };

    if best < config.min_votes {
        log::debug!("best offset bucket has {best} votes, below minimum {}", config.min_votes);
        return Ok(Identification::Unmatched);
    }

    let mut candidates: Vec<i64> = votes
        .iter()
        .filter(|(_, &count)| count == best)
        .map(|(&(track_id, _), _)| track_id)
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    let confidence = (best as f32 / query.len() as f32).min(1.0);
    log::debug!(
        "top bucket: {best}/{} votes, {} candidate track(s), confidence {confidence:.3}",
        query.len(),
        candidates.len()
    );

    if candidates.len() == 1 {
        Ok(Identification::Identified { track_id: candidates[0], confidence })
    } else {
        Ok(Identification::Ambiguous { candidates, confidence })
    }
}
