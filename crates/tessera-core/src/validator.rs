//! # Schema Engine
//!
//! Loads records through the load caches and checks entities against their
//! definitions.
//!
//! `check_entity` is all-or-nothing: it reads from the store but never
//! writes, so a failed check leaves nothing behind.
//!
//! ## Reference resolution
//!
//! | Tag                 | Value must address                                   |
//! |---------------------|------------------------------------------------------|
//! | `file_info`         | a valid `FileInfo`                                   |
//! | `entity_definition` | a valid `EntityDefinition`                           |
//! | `thing` / `action`  | an `Entity` whose own definition has that `kind`     |

use crate::cache::{LoadCache, RecordCache};
use crate::canonical::Record;
use crate::feed::Feed;
use crate::schema::{self, Entity, EntityDefinition, FileInfo};
use crate::store::ContentStore;
use crate::{Cid, PartValue, TesseraError, TypeTag};
use std::sync::Arc;

/// A decoded record together with its address.
#[derive(Debug)]
pub struct Addressed<T> {
    pub cid: Cid,
    pub record: Arc<T>,
}

impl<T> Clone for Addressed<T> {
    fn clone(&self) -> Self {
        Self {
            cid: self.cid.clone(),
            record: Arc::clone(&self.record),
        }
    }
}

/// Record loader and entity checker.
#[derive(Debug, Clone, Default)]
pub struct SchemaEngine {
    cache: Arc<LoadCache>,
}

impl SchemaEngine {
    /// Create an engine backed by `cache`.
    #[must_use]
    pub fn new(cache: Arc<LoadCache>) -> Self {
        Self { cache }
    }

    /// The engine's load caches.
    #[must_use]
    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    pub fn load_definition<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        cid: &Cid,
    ) -> Result<Addressed<EntityDefinition>, TesseraError> {
        load_cached(&self.cache.definitions, store, cid)
    }

    pub fn load_file_info<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        cid: &Cid,
    ) -> Result<Addressed<FileInfo>, TesseraError> {
        load_cached(&self.cache.file_infos, store, cid)
    }

    pub fn load_entity<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        cid: &Cid,
    ) -> Result<Addressed<Entity>, TesseraError> {
        load_cached(&self.cache.entities, store, cid)
    }

    pub fn load_feed<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        cid: &Cid,
    ) -> Result<Addressed<Feed>, TesseraError> {
        load_cached(&self.cache.feeds, store, cid)
    }

    // =========================================================================
    // CHECKING
    // =========================================================================

    /// Check that `entity` conforms to `definition`.
    ///
    /// Checks run in order: protocol version, entity type, part names, then
    /// each part's value against its tag. The first failure is returned.
    pub fn check_entity<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        definition: &Addressed<EntityDefinition>,
        entity: &Entity,
    ) -> Result<(), TesseraError> {
        let schema = &definition.record;

        if schema.protocol_version != entity.protocol_version {
            return Err(TesseraError::ProtocolVersionMismatch {
                definition: schema.protocol_version.clone(),
                entity: entity.protocol_version.clone(),
            });
        }
        if definition.cid != entity.entity_type {
            return Err(TesseraError::EntityTypeMismatch {
                expected: definition.cid.clone(),
                found: entity.entity_type.clone(),
            });
        }

        let missing: Vec<String> = schema
            .parts
            .keys()
            .filter(|name| !entity.parts.contains_key(*name))
            .cloned()
            .collect();
        let unexpected: Vec<String> = entity
            .parts
            .keys()
            .filter(|name| !schema.parts.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(TesseraError::PartsMismatch {
                missing,
                unexpected,
            });
        }

        for (name, tag) in &schema.parts {
            if let Some(value) = entity.parts.get(name) {
                self.check_part(store, name, *tag, value)?;
            }
        }

        tracing::debug!(
            entity_type = %definition.cid,
            name = %schema.name,
            parts = schema.parts.len(),
            "entity conforms"
        );
        Ok(())
    }

    fn check_part<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        part: &str,
        tag: TypeTag,
        value: &PartValue,
    ) -> Result<(), TesseraError> {
        let mismatch = |reason: String| TesseraError::TypeMismatch {
            part: part.to_string(),
            expected: tag,
            reason,
        };

        let cid = match tag {
            TypeTag::String | TypeTag::Integer | TypeTag::Boolean | TypeTag::Url => {
                return schema::check_primitive(tag, value).map_err(mismatch);
            }
            TypeTag::FileInfo | TypeTag::EntityDefinition | TypeTag::Thing | TypeTag::Action => {
                let text = value
                    .as_str()
                    .ok_or_else(|| mismatch(format!("expected an address, got {}", value)))?;
                Cid::parse(text).map_err(|_| mismatch(format!("expected an address, got {}", value)))?
            }
        };

        let resolved = match tag {
            TypeTag::FileInfo => self.load_file_info(store, &cid).map(|_| ()),
            TypeTag::EntityDefinition => self.load_definition(store, &cid).map(|_| ()),
            TypeTag::Thing | TypeTag::Action => self.check_entity_kind(store, part, &cid, tag),
            TypeTag::String | TypeTag::Integer | TypeTag::Boolean | TypeTag::Url => Ok(()),
        };
        resolved.map_err(|e| reference_error(part, &cid, e))
    }

    /// Entity at `cid` -> its definition -> that definition's kind.
    fn check_entity_kind<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        part: &str,
        cid: &Cid,
        tag: TypeTag,
    ) -> Result<(), TesseraError> {
        let referenced = self.load_entity(store, cid)?;
        let definition = self.load_definition(store, &referenced.record.entity_type)?;
        let found = definition.record.kind.as_tag();
        if found == tag {
            Ok(())
        } else {
            Err(TesseraError::Reference {
                part: part.to_string(),
                cid: cid.clone(),
                reason: format!("is a {}, expected {}", found, tag),
            })
        }
    }
}

/// Load through `cache`, decoding and inserting on a miss.
fn load_cached<T: Record, S: ContentStore + ?Sized>(
    cache: &RecordCache<T>,
    store: &S,
    cid: &Cid,
) -> Result<Addressed<T>, TesseraError> {
    if let Some(record) = cache.get(cid) {
        return Ok(Addressed {
            cid: cid.clone(),
            record,
        });
    }
    let record = cache.insert(cid.clone(), T::load(store, cid)?);
    Ok(Addressed {
        cid: cid.clone(),
        record,
    })
}

/// Turn a failed resolution into a `Reference` error for `part`.
/// Infrastructure failures pass through untouched.
fn reference_error(part: &str, cid: &Cid, error: TesseraError) -> TesseraError {
    match error {
        e @ TesseraError::Reference { .. } => e,
        e if e.is_rejection() => TesseraError::Reference {
            part: part.to_string(),
            cid: cid.clone(),
            reason: e.to_string(),
        },
        e => e,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::schema::{PartValues, PartsSchema};
    use crate::store::MemoryStore;
    use crate::EntityKind;

    struct Fixture {
        store: MemoryStore,
        engine: SchemaEngine,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                engine: SchemaEngine::default(),
            }
        }

        fn define(&mut self, kind: EntityKind, parts: &[(&str, TypeTag)]) -> Addressed<EntityDefinition> {
            let parts: PartsSchema = parts.iter().map(|(n, t)| (n.to_string(), *t)).collect();
            let definition = EntityDefinition::new("v0", kind, "test", parts).unwrap();
            let cid = definition.store(&mut self.store).unwrap();
            self.engine.load_definition(&self.store, &cid).unwrap()
        }

        fn entity(&self, definition: &Addressed<EntityDefinition>, parts: &[(&str, PartValue)]) -> Entity {
            let parts: PartValues = parts.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
            Entity::new("v0", definition.cid.clone(), "2022-10-31T03:33:33Z", parts)
        }

        fn check(&self, definition: &Addressed<EntityDefinition>, entity: &Entity) -> Result<(), TesseraError> {
            self.engine.check_entity(&self.store, definition, entity)
        }
    }

    #[test]
    fn primitive_parts_conform() {
        let mut fx = Fixture::new();
        let def = fx.define(
            EntityKind::Thing,
            &[
                ("name", TypeTag::String),
                ("age", TypeTag::Integer),
                ("active", TypeTag::Boolean),
                ("homepage", TypeTag::Url),
            ],
        );
        let entity = fx.entity(
            &def,
            &[
                ("name", PartValue::text("Dade")),
                ("age", PartValue::text("17")),
                ("active", PartValue::Boolean(true)),
                ("homepage", PartValue::text("https://example.org")),
            ],
        );

        assert!(fx.check(&def, &entity).is_ok());
    }

    #[test]
    fn boolean_where_integer_declared() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[("count", TypeTag::Integer)]);
        let entity = fx.entity(&def, &[("count", PartValue::Boolean(true))]);

        assert!(matches!(
            fx.check(&def, &entity),
            Err(TesseraError::TypeMismatch { part, expected: TypeTag::Integer, .. }) if part == "count"
        ));
    }

    #[test]
    fn number_where_integer_declared() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[("count", TypeTag::Integer)]);
        let bytes = format!(
            r#"{{"protocol_version":"v0","entity_type":"{}","datetime":"2022-10-31T03:33:33Z","parts":{{"count":5}}}}"#,
            def.cid
        );
        let entity = Entity::decode(bytes.as_bytes()).unwrap();

        match fx.check(&def, &entity) {
            Err(TesseraError::TypeMismatch { part, expected, reason }) => {
                assert_eq!(part, "count");
                assert_eq!(expected, TypeTag::Integer);
                assert!(reason.contains('5'), "{}", reason);
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn null_where_reference_declared() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Action, &[("target", TypeTag::Thing)]);
        let entity = fx.entity(&def, &[("target", PartValue::Other(serde_json::Value::Null))]);

        assert!(matches!(
            fx.check(&def, &entity),
            Err(TesseraError::TypeMismatch { part, expected: TypeTag::Thing, .. }) if part == "target"
        ));
    }

    #[test]
    fn missing_and_extra_parts() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[("a", TypeTag::String), ("b", TypeTag::String)]);

        let missing = fx.entity(&def, &[("a", PartValue::text("x"))]);
        assert_eq!(
            fx.check(&def, &missing),
            Err(TesseraError::PartsMismatch {
                missing: vec!["b".into()],
                unexpected: vec![]
            })
        );

        let extra = fx.entity(
            &def,
            &[
                ("a", PartValue::text("x")),
                ("b", PartValue::text("y")),
                ("c", PartValue::text("z")),
            ],
        );
        assert_eq!(
            fx.check(&def, &extra),
            Err(TesseraError::PartsMismatch {
                missing: vec![],
                unexpected: vec!["c".into()]
            })
        );
    }

    #[test]
    fn version_and_type_mismatch() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[]);
        let other = fx.define(EntityKind::Action, &[]);

        let mut entity = fx.entity(&def, &[]);
        entity.protocol_version = "v1".into();
        assert!(matches!(
            fx.check(&def, &entity),
            Err(TesseraError::ProtocolVersionMismatch { .. })
        ));

        let entity = fx.entity(&other, &[]);
        assert!(matches!(
            fx.check(&def, &entity),
            Err(TesseraError::EntityTypeMismatch { .. })
        ));
    }

    #[test]
    fn thing_and_action_references_resolve_two_hops() {
        let mut fx = Fixture::new();
        let profile = fx.define(EntityKind::Thing, &[("name", TypeTag::String)]);
        let like = fx.define(EntityKind::Action, &[("target", TypeTag::Thing)]);
        let comment = fx.define(EntityKind::Action, &[("on", TypeTag::Action)]);

        let alice = fx.entity(&profile, &[("name", PartValue::text("alice"))]);
        let alice_cid = alice.store(&mut fx.store).unwrap();

        let liked = fx.entity(&like, &[("target", PartValue::text(alice_cid.as_str()))]);
        assert!(fx.check(&like, &liked).is_ok());

        // A thing where an action is declared.
        let wrong = fx.entity(&comment, &[("on", PartValue::text(alice_cid.as_str()))]);
        assert!(matches!(
            fx.check(&comment, &wrong),
            Err(TesseraError::Reference { part, .. }) if part == "on"
        ));

        let liked_cid = liked.store(&mut fx.store).unwrap();
        let ok = fx.entity(&comment, &[("on", PartValue::text(liked_cid.as_str()))]);
        assert!(fx.check(&comment, &ok).is_ok());
    }

    #[test]
    fn unresolvable_second_hop_is_reference_error() {
        let mut fx = Fixture::new();
        let like = fx.define(EntityKind::Action, &[("target", TypeTag::Thing)]);

        let orphan = Entity::new("v0", Cid::digest(b"no such definition"), "d", PartValues::new());
        let orphan_cid = orphan.store(&mut fx.store).unwrap();

        let entity = fx.entity(&like, &[("target", PartValue::text(orphan_cid.as_str()))]);
        assert!(matches!(
            fx.check(&like, &entity),
            Err(TesseraError::Reference { part, cid, .. }) if part == "target" && cid == orphan_cid
        ));
    }

    #[test]
    fn file_info_and_definition_references() {
        let mut fx = Fixture::new();
        let def = fx.define(
            EntityKind::Thing,
            &[("avatar", TypeTag::FileInfo), ("schema", TypeTag::EntityDefinition)],
        );

        let raw = fx.store.put(b"\x89PNG").unwrap();
        let info_cid = FileInfo::new("v0", "png", 4, raw).store(&mut fx.store).unwrap();

        let ok = fx.entity(
            &def,
            &[
                ("avatar", PartValue::text(info_cid.as_str())),
                ("schema", PartValue::text(def.cid.as_str())),
            ],
        );
        assert!(fx.check(&def, &ok).is_ok());

        // A definition is not a file info.
        let swapped = fx.entity(
            &def,
            &[
                ("avatar", PartValue::text(def.cid.as_str())),
                ("schema", PartValue::text(def.cid.as_str())),
            ],
        );
        assert!(matches!(
            fx.check(&def, &swapped),
            Err(TesseraError::Reference { part, .. }) if part == "avatar"
        ));

        let dangling = fx.entity(
            &def,
            &[
                ("avatar", PartValue::text(info_cid.as_str())),
                ("schema", PartValue::text("not-stored")),
            ],
        );
        assert!(matches!(
            fx.check(&def, &dangling),
            Err(TesseraError::Reference { part, .. }) if part == "schema"
        ));

        let boolean = fx.entity(
            &def,
            &[
                ("avatar", PartValue::Boolean(false)),
                ("schema", PartValue::text(def.cid.as_str())),
            ],
        );
        assert!(matches!(
            fx.check(&def, &boolean),
            Err(TesseraError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn repeated_loads_hit_cache() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[("name", TypeTag::String)]);
        let gets_before = fx.store.counters().gets;

        let again = fx.engine.load_definition(&fx.store, &def.cid).unwrap();

        assert!(Arc::ptr_eq(&again.record, &def.record));
        assert_eq!(fx.store.counters().gets, gets_before);
        assert_eq!(fx.engine.cache().stats().definitions, 1);
    }

    #[test]
    fn failed_check_writes_nothing() {
        let mut fx = Fixture::new();
        let def = fx.define(EntityKind::Thing, &[("n", TypeTag::Integer)]);
        let objects = fx.store.object_count();

        let bad = fx.entity(&def, &[("n", PartValue::text("x"))]);
        assert!(fx.check(&def, &bad).is_err());
        assert_eq!(fx.store.object_count(), objects);
        assert_eq!(fx.store.counters().puts, 1);
    }
}
