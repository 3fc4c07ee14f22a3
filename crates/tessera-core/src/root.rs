//! # User Root
//!
//! The single published pointer aggregating a user's feeds.
//!
//! `RootManager` holds the decoded root in memory, applies publishes to it
//! and re-persists the whole aggregate on every store. It remembers the
//! root address it started from; if the store's pointer has moved by the
//! time it publishes, the publish is refused with `RootConflict` instead of
//! silently overwriting another writer's update.

use crate::canonical::{self, Record};
use crate::feed::Feed;
use crate::primitives::{DEFAULT_OPTIMAL_RECENT, PROTOCOL_VERSION};
use crate::schema::Entity;
use crate::store::ContentStore;
use crate::validator::SchemaEngine;
use crate::{Cid, TesseraError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// WIRE RECORD
// =============================================================================

/// Persisted root: entity type -> feed address, entity type -> index address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRoot {
    pub feeds: BTreeMap<Cid, Cid>,
    pub indexes: BTreeMap<Cid, Cid>,
}

impl Record for UserRoot {
    const NAME: &'static str = "UserRoot";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        canonical::decode_strict(Self::NAME, bytes)
    }
}

// =============================================================================
// SETTINGS AND OUTCOMES
// =============================================================================

/// Parameters for feeds created by a root manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub protocol_version: String,
    pub optimal_recent: u64,
}

impl FeedSettings {
    /// Create settings, rejecting an unusable window size.
    pub fn new(
        protocol_version: impl Into<String>,
        optimal_recent: u64,
    ) -> Result<Self, TesseraError> {
        let settings = Self {
            protocol_version: protocol_version.into(),
            optimal_recent,
        };
        settings.empty_feed()?;
        Ok(settings)
    }

    /// A fresh feed with these settings.
    pub fn empty_feed(&self) -> Result<Feed, TesseraError> {
        Feed::make_empty(self.protocol_version.clone(), self.optimal_recent)
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            optimal_recent: DEFAULT_OPTIMAL_RECENT,
        }
    }
}

/// Result of publishing one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The entity is stored, appended and the new root is published.
    Published {
        entity: Cid,
        root: Cid,
        sequence_number: u64,
    },
    /// The entity failed validation. Nothing was written.
    Rejected(TesseraError),
}

impl PublishOutcome {
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// The rejection reason, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&TesseraError> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::Published { .. } => None,
        }
    }
}

// =============================================================================
// ROOT MANAGER
// =============================================================================

/// In-memory view of a user's root.
#[derive(Debug, Clone)]
pub struct RootManager {
    engine: SchemaEngine,
    settings: FeedSettings,
    /// Root address this view was loaded from or last published.
    base: Option<Cid>,
    feeds: BTreeMap<Cid, Arc<Feed>>,
    indexes: BTreeMap<Cid, Cid>,
}

impl RootManager {
    /// Load the published root, initializing and publishing an empty one
    /// if the store has none yet.
    pub fn load<S: ContentStore + ?Sized>(
        store: &mut S,
        engine: SchemaEngine,
        settings: FeedSettings,
    ) -> Result<Self, TesseraError> {
        let mut manager = Self {
            engine,
            settings,
            base: None,
            feeds: BTreeMap::new(),
            indexes: BTreeMap::new(),
        };

        match store.resolve()? {
            None => {
                tracing::info!("no published root, initializing");
                manager.store(store)?;
            }
            Some(cid) => {
                let root = UserRoot::load(store, &cid)?;
                for (entity_type, feed_cid) in &root.feeds {
                    let feed = manager.engine.load_feed(store, feed_cid)?;
                    manager.feeds.insert(entity_type.clone(), feed.record);
                }
                manager.indexes = root.indexes;
                tracing::debug!(root = %cid, feeds = manager.feeds.len(), "loaded root");
                manager.base = Some(cid);
            }
        }
        Ok(manager)
    }

    /// Persist every feed and the root record, then publish the root.
    ///
    /// Fails with `RootConflict` if the store's pointer no longer matches
    /// the address this view is based on.
    pub fn store<S: ContentStore + ?Sized>(&mut self, store: &mut S) -> Result<Cid, TesseraError> {
        let mut root = UserRoot {
            feeds: BTreeMap::new(),
            indexes: self.indexes.clone(),
        };
        for (entity_type, feed) in &self.feeds {
            root.feeds.insert(entity_type.clone(), feed.store(store)?);
        }
        let root_cid = root.store(store)?;

        let current = store.resolve()?;
        if current != self.base {
            tracing::warn!(expected = ?self.base, found = ?current, "root moved, refusing to publish");
            return Err(TesseraError::RootConflict {
                expected: self.base.clone(),
                found: current,
            });
        }

        store.publish(&root_cid)?;
        tracing::info!(root = %root_cid, feeds = root.feeds.len(), "published root");
        self.base = Some(root_cid.clone());
        Ok(root_cid)
    }

    /// Create an empty feed for `entity_type` unless one exists.
    pub fn ensure_feed_exists(&mut self, entity_type: &Cid) -> Result<Arc<Feed>, TesseraError> {
        if let Some(feed) = self.feeds.get(entity_type) {
            return Ok(Arc::clone(feed));
        }
        let feed = Arc::new(self.settings.empty_feed()?);
        self.feeds.insert(entity_type.clone(), Arc::clone(&feed));
        Ok(feed)
    }

    /// Validate, store and append `entity`, then publish the new root.
    ///
    /// Validation failures come back as `PublishOutcome::Rejected` and leave
    /// both the store and this view untouched. Store failures and conflicts
    /// are errors.
    pub fn publish_entity<S: ContentStore + ?Sized>(
        &mut self,
        store: &mut S,
        entity: Entity,
    ) -> Result<PublishOutcome, TesseraError> {
        let entity_type = entity.entity_type.clone();

        let definition = match self.engine.load_definition(store, &entity_type) {
            Ok(definition) => definition,
            Err(e) => return rejected(e),
        };
        if let Err(e) = self.engine.check_entity(store, &definition, &entity) {
            return rejected(e);
        }

        let feed = match self.feeds.get(&entity_type) {
            Some(feed) => Arc::clone(feed),
            None => Arc::new(self.settings.empty_feed()?),
        };

        let entity_cid = entity.store(store)?;
        let appended = feed.append(store, entity_cid.clone())?;
        let sequence_number = appended.next_sequence_number - 1;

        let previous = self.feeds.insert(entity_type.clone(), Arc::new(appended));
        match self.store(store) {
            Ok(root) => {
                tracing::info!(
                    entity = %entity_cid,
                    entity_type = %entity_type,
                    sequence_number,
                    "published entity"
                );
                Ok(PublishOutcome::Published {
                    entity: entity_cid,
                    root,
                    sequence_number,
                })
            }
            Err(e) => {
                match previous {
                    Some(feed) => self.feeds.insert(entity_type, feed),
                    None => self.feeds.remove(&entity_type),
                };
                Err(e)
            }
        }
    }

    /// `publish_entity`, reloading the root and retrying on conflict.
    pub fn publish_entity_with_retry<S: ContentStore + ?Sized>(
        &mut self,
        store: &mut S,
        entity: Entity,
        max_attempts: u32,
    ) -> Result<PublishOutcome, TesseraError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.publish_entity(store, entity.clone()) {
                Err(TesseraError::RootConflict { .. }) if attempt < max_attempts => {
                    tracing::debug!(attempt, max_attempts, "retrying publish after root conflict");
                    *self = Self::load(store, self.engine.clone(), self.settings.clone())?;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Current feed for `entity_type`.
    #[must_use]
    pub fn feed(&self, entity_type: &Cid) -> Option<&Arc<Feed>> {
        self.feeds.get(entity_type)
    }

    /// All feeds by entity type.
    #[must_use]
    pub fn feeds(&self) -> &BTreeMap<Cid, Arc<Feed>> {
        &self.feeds
    }

    /// Secondary index addresses, carried through unchanged.
    #[must_use]
    pub fn indexes(&self) -> &BTreeMap<Cid, Cid> {
        &self.indexes
    }

    /// Root address this view is based on.
    #[must_use]
    pub fn base(&self) -> Option<&Cid> {
        self.base.as_ref()
    }

    #[must_use]
    pub fn engine(&self) -> &SchemaEngine {
        &self.engine
    }

    #[must_use]
    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }
}

fn rejected(error: TesseraError) -> Result<PublishOutcome, TesseraError> {
    if error.is_rejection() {
        tracing::warn!(%error, "entity rejected");
        Ok(PublishOutcome::Rejected(error))
    } else {
        Err(error)
    }
}

// =============================================================================
// TESTS
// =============================================================================
