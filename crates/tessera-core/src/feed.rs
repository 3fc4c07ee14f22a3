//! # Feed
//!
//! The append-only sequence of entity addresses for one entity type.
//!
//! A feed keeps a bounded window of recent entries inline and pushes older
//! entries into a spine in batches of `optimal_recent`. Reading the newest
//! items therefore costs one object fetch; reaching any older item costs
//! O(log n) spine tree fetches.
//!
//! ## Window invariant
//!
//! With `k = optimal_recent`, after every append the recent window holds
//! between 0 and `2k - 1` entries. The window reaching `2k` evicts its
//! oldest `k` entries as one batch.

use crate::canonical::{self, Record};
use crate::primitives::MAX_OPTIMAL_RECENT;
use crate::spine::{FeedEntry, SearchSpineStack};
use crate::store::ContentStore;
use crate::{Cid, TesseraError};
use serde::{Deserialize, Serialize};

/// An append-only, per-entity-type sequence of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Feed {
    pub protocol_version: String,
    pub optimal_recent: u64,
    pub next_sequence_number: u64,
    /// Newest first.
    pub recent: Vec<FeedEntry>,
    pub older: SearchSpineStack,
}

impl Feed {
    /// The zero state of a feed.
    pub fn make_empty(
        protocol_version: impl Into<String>,
        optimal_recent: u64,
    ) -> Result<Self, TesseraError> {
        check_optimal_recent(optimal_recent)?;
        Ok(Self {
            protocol_version: protocol_version.into(),
            optimal_recent,
            next_sequence_number: 0,
            recent: Vec::new(),
            older: SearchSpineStack::new(),
        })
    }

    /// Append `item`, returning the new feed.
    ///
    /// Eviction batches are written to `store`; the receiver is unchanged.
    pub fn append<S: ContentStore + ?Sized>(
        &self,
        store: &mut S,
        item: Cid,
    ) -> Result<Self, TesseraError> {
        let sequence_number = self.next_sequence_number;
        let next_sequence_number = sequence_number
            .checked_add(1)
            .ok_or_else(|| TesseraError::format(Self::NAME, "sequence numbers exhausted"))?;
        let mut recent = Vec::with_capacity(self.recent.len() + 1);
        recent.push(FeedEntry::new(sequence_number, item));
        recent.extend_from_slice(&self.recent);

        let window = usize::try_from(self.optimal_recent)
            .map_err(|_| TesseraError::InvalidConfig("optimal_recent too large".to_string()))?;

        let mut older = self.older.clone();
        if recent.len() >= window.saturating_mul(2) {
            // Tail is oldest, so popping yields the batch oldest-first.
            let mut batch = Vec::with_capacity(recent.len() - window);
            while recent.len() > window {
                if let Some(entry) = recent.pop() {
                    batch.push(entry);
                }
            }
            if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
                let (first_key, last_key) = (first.sequence_number, last.sequence_number);
                tracing::debug!(first_key, last_key, "evicting recent entries");
                older = older.push(store, first_key, last_key, batch)?;
            }
        }

        Ok(Self {
            protocol_version: self.protocol_version.clone(),
            optimal_recent: self.optimal_recent,
            next_sequence_number,
            recent,
            older,
        })
    }

    /// Total number of entries ever appended.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_sequence_number
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_sequence_number == 0
    }

    /// Number of entries that live in the spine.
    #[must_use]
    pub fn evicted_count(&self) -> u64 {
        self.next_sequence_number - self.recent.len() as u64
    }

    /// Newest entry, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&FeedEntry> {
        self.recent.first()
    }

    /// Item at `sequence_number`, searching the spine if it has aged out.
    pub fn get<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        sequence_number: u64,
    ) -> Result<Option<Cid>, TesseraError> {
        if sequence_number >= self.next_sequence_number {
            return Ok(None);
        }
        if let Some(entry) = self
            .recent
            .iter()
            .find(|entry| entry.sequence_number == sequence_number)
        {
            return Ok(Some(entry.item.clone()));
        }
        self.older.find(store, sequence_number)
    }

    /// Full history, newest first.
    pub fn history<S: ContentStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<FeedEntry>, TesseraError> {
        let mut entries = self.recent.clone();
        entries.extend(self.older.entries(store)?);
        Ok(entries)
    }

    /// Check the structural invariants of a loaded feed.
    pub fn validate(&self) -> Result<(), TesseraError> {
        check_optimal_recent(self.optimal_recent)
            .map_err(|e| TesseraError::format(Self::NAME, e.to_string()))?;

        let max_recent = self.optimal_recent * 2 - 1;
        if self.recent.len() as u64 > max_recent {
            return Err(TesseraError::format(
                Self::NAME,
                format!(
                    "{} recent entries exceeds window of {}",
                    self.recent.len(),
                    max_recent
                ),
            ));
        }
        if self.recent.len() as u64 > self.next_sequence_number {
            return Err(TesseraError::format(
                Self::NAME,
                "more recent entries than sequence numbers issued",
            ));
        }

        let mut expected = self.next_sequence_number;
        for entry in &self.recent {
            expected -= 1;
            if entry.sequence_number != expected {
                return Err(TesseraError::format(
                    Self::NAME,
                    format!(
                        "recent entry {} out of sequence, expected {}",
                        entry.sequence_number, expected
                    ),
                ));
            }
        }

        self.older.validate()?;
        let evicted = self.evicted_count();
        match self.older.covered() {
            None if evicted == 0 => Ok(()),
            Some((0, last)) if last.checked_add(1) == Some(evicted) => Ok(()),
            covered => Err(TesseraError::format(
                Self::NAME,
                format!(
                    "spine covers {:?}, expected {} evicted entries",
                    covered, evicted
                ),
            )),
        }
    }
}

impl Record for Feed {
    const NAME: &'static str = "Feed";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        let feed: Self = canonical::decode_strict(Self::NAME, bytes)?;
        feed.validate()?;
        Ok(feed)
    }
}

fn check_optimal_recent(optimal_recent: u64) -> Result<(), TesseraError> {
    if optimal_recent == 0 || optimal_recent > MAX_OPTIMAL_RECENT {
        return Err(TesseraError::InvalidConfig(format!(
            "optimal_recent must be between 1 and {}, got {}",
            MAX_OPTIMAL_RECENT, optimal_recent
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
