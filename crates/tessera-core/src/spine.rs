//! # Spine Index
//!
//! Append-only history storage shaped like a binary counter.
//!
//! A feed evicts its recent window in fixed-size batches. Each batch is
//! pushed onto a `SearchSpineStack`; equal-depth levels merge on the way in
//! the way carries propagate in binary addition, so a history of `n`
//! batches is held in at most `log2(n) + 1` levels and every push costs
//! amortized O(1) stored trees.
//!
//! ## Shape
//!
//! - `SearchSpineTree` is the persisted node: `first` is the batch that was
//!   pushed when the node was built, `rest` the levels it absorbed
//! - `SearchSpineStack` is the ordered list of levels, newest first, that a
//!   feed carries in its `older` field
//!
//! A level at depth `d` holds exactly `2^d` batches.

use crate::canonical::{self, Record};
use crate::store::ContentStore;
use crate::{Cid, TesseraError};
use serde::{Deserialize, Serialize};

// =============================================================================
// FEED ENTRY
// =============================================================================

/// One item of a feed together with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedEntry {
    pub sequence_number: u64,
    pub item: Cid,
}

impl FeedEntry {
    #[must_use]
    pub fn new(sequence_number: u64, item: Cid) -> Self {
        Self {
            sequence_number,
            item,
        }
    }
}

// =============================================================================
// SPINE LEVEL
// =============================================================================

/// One level of a spine stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpineLevel {
    /// Number of levels merged when this level was built.
    pub depth: u32,
    /// Lowest sequence number covered.
    pub first_key: u64,
    /// Highest sequence number covered.
    pub last_key: u64,
    /// Address of the `SearchSpineTree` holding the entries.
    pub item: Cid,
}

impl SpineLevel {
    /// True if `key` falls inside this level's range.
    #[must_use]
    pub fn covers(&self, key: u64) -> bool {
        self.first_key <= key && key <= self.last_key
    }

    /// Number of sequence numbers covered, saturating at `u64::MAX`.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.last_key
            .saturating_sub(self.first_key)
            .saturating_add(1)
    }
}

// =============================================================================
// SEARCH SPINE TREE
// =============================================================================

/// The `first` slot of a tree: an inline batch, or a nested tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpineFirst {
    /// Entries oldest-first.
    Batch(Vec<FeedEntry>),
    Tree(Cid),
}

/// Persisted spine node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSpineTree {
    pub first: SpineFirst,
    /// Absorbed levels, newest first. Every one is older than `first`.
    pub rest: Vec<SpineLevel>,
}

impl Record for SearchSpineTree {
    const NAME: &'static str = "SearchSpineTree";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        canonical::decode_strict(Self::NAME, bytes)
    }
}

impl SearchSpineTree {
    /// Find the item stored under `key` in this tree or below it.
    pub fn find<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        key: u64,
    ) -> Result<Option<Cid>, TesseraError> {
        if let Some(level) = self.rest.iter().find(|level| level.covers(key)) {
            let tree = Self::load(store, &level.item)?;
            return tree.find(store, key);
        }
        match &self.first {
            SpineFirst::Batch(entries) => Ok(entries
                .iter()
                .find(|entry| entry.sequence_number == key)
                .map(|entry| entry.item.clone())),
            SpineFirst::Tree(cid) => Self::load(store, cid)?.find(store, key),
        }
    }

    /// Append every entry in this tree to `out`, newest first.
    pub fn collect_entries<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        out: &mut Vec<FeedEntry>,
    ) -> Result<(), TesseraError> {
        match &self.first {
            SpineFirst::Batch(entries) => out.extend(entries.iter().rev().cloned()),
            SpineFirst::Tree(cid) => Self::load(store, cid)?.collect_entries(store, out)?,
        }
        for level in &self.rest {
            Self::load(store, &level.item)?.collect_entries(store, out)?;
        }
        Ok(())
    }
}

// =============================================================================
// SEARCH SPINE STACK
// =============================================================================

/// The in-feed view of a spine: levels newest first.
///
/// Values are never modified in place; `push` returns a new stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpineStack {
    levels: Vec<SpineLevel>,
}

impl SearchSpineStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap levels read from elsewhere, checking the stack invariants.
    pub fn from_levels(levels: Vec<SpineLevel>) -> Result<Self, TesseraError> {
        let stack = Self { levels };
        stack.validate()?;
        Ok(stack)
    }

    /// Levels, newest first.
    #[must_use]
    pub fn levels(&self) -> &[SpineLevel] {
        &self.levels
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Inclusive key range covered by the whole stack.
    #[must_use]
    pub fn covered(&self) -> Option<(u64, u64)> {
        let newest = self.levels.first()?;
        let oldest = self.levels.last()?;
        Some((oldest.first_key, newest.last_key))
    }

    /// Number of entries held.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.levels
            .iter()
            .map(SpineLevel::key_count)
            .fold(0, u64::saturating_add)
    }

    /// Push an evicted batch, returning the new stack.
    ///
    /// `batch` must be ordered oldest-first and hold exactly the sequence
    /// numbers `first_key..=last_key`, and `first_key` must directly follow
    /// the newest level's `last_key`.
    pub fn push<S: ContentStore + ?Sized>(
        &self,
        store: &mut S,
        first_key: u64,
        last_key: u64,
        batch: Vec<FeedEntry>,
    ) -> Result<Self, TesseraError> {
        if let Some(newest) = self.levels.first() {
            let expected = newest.last_key.saturating_add(1);
            if first_key != expected {
                return Err(TesseraError::SpineOrder {
                    expected,
                    found: first_key,
                });
            }
        }
        check_batch(first_key, last_key, &batch)?;

        // Carry: take the run of levels with depths 0, 1, 2, ...
        let merged = self
            .levels
            .iter()
            .zip(0u32..)
            .take_while(|(level, expected)| level.depth == *expected)
            .count();
        let collected = &self.levels[..merged];

        let new_first_key = collected.last().map_or(first_key, |oldest| oldest.first_key);
        let tree = SearchSpineTree {
            first: SpineFirst::Batch(batch),
            rest: collected.to_vec(),
        };
        let item = tree.store(store)?;

        let depth = u32::try_from(merged)
            .map_err(|_| TesseraError::Store("spine depth overflow".to_string()))?;
        tracing::debug!(
            depth,
            first_key = new_first_key,
            last_key,
            merged,
            "pushed spine level"
        );

        let mut levels = Vec::with_capacity(self.levels.len() - merged + 1);
        levels.push(SpineLevel {
            depth,
            first_key: new_first_key,
            last_key,
            item,
        });
        levels.extend_from_slice(&self.levels[merged..]);
        Ok(Self { levels })
    }

    /// Find the item stored under `key`.
    pub fn find<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        key: u64,
    ) -> Result<Option<Cid>, TesseraError> {
        match self.levels.iter().find(|level| level.covers(key)) {
            Some(level) => SearchSpineTree::load(store, &level.item)?.find(store, key),
            None => Ok(None),
        }
    }

    /// Every entry held, newest first.
    pub fn entries<S: ContentStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<FeedEntry>, TesseraError> {
        let mut out = Vec::new();
        for level in &self.levels {
            SearchSpineTree::load(store, &level.item)?.collect_entries(store, &mut out)?;
        }
        Ok(out)
    }

    /// Check depth ordering and range contiguity without touching the store.
    pub fn validate(&self) -> Result<(), TesseraError> {
        for level in &self.levels {
            if level.first_key > level.last_key {
                return Err(TesseraError::format(
                    "SearchSpineStack",
                    format!(
                        "level range {}..{} is inverted",
                        level.first_key, level.last_key
                    ),
                ));
            }
        }
        for pair in self.levels.windows(2) {
            let (newer, older) = (&pair[0], &pair[1]);
            if newer.depth >= older.depth {
                return Err(TesseraError::format(
                    "SearchSpineStack",
                    format!(
                        "depths must increase toward older levels, found {} before {}",
                        newer.depth, older.depth
                    ),
                ));
            }
            let expected = older.last_key.saturating_add(1);
            if newer.first_key != expected {
                return Err(TesseraError::SpineOrder {
                    expected,
                    found: newer.first_key,
                });
            }
        }
        Ok(())
    }
}

fn check_batch(first_key: u64, last_key: u64, batch: &[FeedEntry]) -> Result<(), TesseraError> {
    if batch.is_empty() || first_key > last_key {
        return Err(TesseraError::format(
            "SearchSpineTree",
            format!("empty spine batch for keys {}..{}", first_key, last_key),
        ));
    }
    for (entry, expected) in batch.iter().zip(first_key..) {
        if entry.sequence_number != expected {
            return Err(TesseraError::SpineOrder {
                expected,
                found: entry.sequence_number,
            });
        }
    }
    let end = first_key.saturating_add(batch.len() as u64 - 1);
    if end != last_key {
        return Err(TesseraError::SpineOrder {
            expected: last_key,
            found: end,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
