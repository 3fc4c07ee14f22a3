//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the system is INVALID.
//!
//! ## Tiers
//! - T0: Record Integrity
//! - T1: Schema Conformance
//! - T2: Feed Window and Spine
//! - T3: Root Publication

#![allow(clippy::panic)]

use tessera_core::{
    Cid, ContentStore, Entity, EntityDefinition, EntityKind, Feed, FeedSettings, FileInfo,
    MemoryStore, PartValue, PartValues, PartsSchema, PublishOutcome, Record, RootManager,
    SchemaEngine, SearchSpineTree, SpineFirst, TesseraError, TypeTag, UserRoot,
};

fn schema(parts: &[(&str, TypeTag)]) -> PartsSchema {
    parts.iter().map(|(n, t)| (n.to_string(), *t)).collect()
}

fn values(parts: &[(&str, PartValue)]) -> PartValues {
    parts.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
}

// =============================================================================
// TIER T0: RECORD INTEGRITY
// =============================================================================

mod t0_record_integrity {
    use super::*;

    /// T0.1: Every record type survives put/get unchanged.
    #[test]
    fn records_roundtrip_through_store() {
        let mut store = MemoryStore::new();

        let raw = store.put(b"GIF89a").expect("raw");
        let info = FileInfo::new("v0", "gif", 6, raw);
        let info_cid = info.store(&mut store).expect("store");
        assert_eq!(FileInfo::load(&store, &info_cid).expect("load"), info);

        let definition = EntityDefinition::new(
            "v0",
            EntityKind::Thing,
            "Avatar",
            schema(&[("image", TypeTag::FileInfo)]),
        )
        .expect("definition");
        let def_cid = definition.store(&mut store).expect("store");
        assert_eq!(
            EntityDefinition::load(&store, &def_cid).expect("load"),
            definition
        );

        let entity = Entity::new(
            "v0",
            def_cid,
            "2022-10-31T03:33:33Z",
            values(&[("image", PartValue::text(info_cid.as_str()))]),
        );
        let entity_cid = entity.store(&mut store).expect("store");
        assert_eq!(Entity::load(&store, &entity_cid).expect("load"), entity);

        let mut feed = Feed::make_empty("v0", 1).expect("feed");
        for _ in 0..3 {
            feed = feed.append(&mut store, entity_cid.clone()).expect("append");
        }
        let feed_cid = feed.store(&mut store).expect("store");
        assert_eq!(Feed::load(&store, &feed_cid).expect("load"), feed);
    }

    /// T0.2: Identical records share an address.
    #[test]
    fn identical_records_identical_address() {
        let a = FileInfo::new("v0", "txt", 1, Cid::digest(b"x"));
        let b = FileInfo::new("v0", "txt", 1, Cid::digest(b"x"));
        let c = FileInfo::new("v0", "txt", 2, Cid::digest(b"x"));

        assert_eq!(a.address().expect("a"), b.address().expect("b"));
        assert_ne!(a.address().expect("a"), c.address().expect("c"));
    }

    /// T0.3: Extra or missing fields are format errors on every record.
    #[test]
    fn exact_field_sets_enforced() {
        let cases: [(&str, &[u8]); 5] = [
            (
                "FileInfo",
                br#"{"protocol_version":"v0","file_type":"png","file_size":"1","raw_data_cid":"a","x":1}"#,
            ),
            (
                "Entity",
                br#"{"protocol_version":"v0","entity_type":"a","parts":{}}"#,
            ),
            ("SearchSpineTree", br#"{"first":[]}"#),
            (
                "Feed",
                br#"{"protocol_version":"v0","optimal_recent":1,"next_sequence_number":0,"recent":[]}"#,
            ),
            ("UserRoot", br#"{"feeds":{},"indexes":{},"owner":"x"}"#),
        ];

        for (name, bytes) in cases {
            let result = match name {
                "FileInfo" => FileInfo::decode(bytes).map(|_| ()),
                "Entity" => Entity::decode(bytes).map(|_| ()),
                "SearchSpineTree" => SearchSpineTree::decode(bytes).map(|_| ()),
                "Feed" => Feed::decode(bytes).map(|_| ()),
                _ => UserRoot::decode(bytes).map(|_| ()),
            };
            assert!(
                matches!(result, Err(TesseraError::Format { .. })),
                "{} accepted a bad field set: {:?}",
                name,
                result
            );
        }
    }
}

// =============================================================================
// TIER T1: SCHEMA CONFORMANCE
// =============================================================================

mod t1_schema_conformance {
    use super::*;

    fn setup() -> (MemoryStore, SchemaEngine, Cid) {
        let mut store = MemoryStore::new();
        let definition = EntityDefinition::new(
            "v0",
            EntityKind::Thing,
            "Post",
            schema(&[("text", TypeTag::String), ("likes", TypeTag::Integer)]),
        )
        .expect("definition");
        let cid = definition.store(&mut store).expect("store");
        (store, SchemaEngine::default(), cid)
    }

    fn check(
        store: &MemoryStore,
        engine: &SchemaEngine,
        cid: &Cid,
        parts: &[(&str, PartValue)],
    ) -> Result<(), TesseraError> {
        let definition = engine.load_definition(store, cid).expect("definition");
        let entity = Entity::new("v0", cid.clone(), "2022-10-31T03:33:33Z", values(parts));
        engine.check_entity(store, &definition, &entity)
    }

    /// T1.1: A conforming entity passes.
    #[test]
    fn conforming_entity_accepted() {
        let (store, engine, cid) = setup();
        let result = check(
            &store,
            &engine,
            &cid,
            &[("text", PartValue::text("hi")), ("likes", PartValue::text("3"))],
        );
        assert!(result.is_ok());
    }

    /// T1.2: Omitting a required part fails.
    #[test]
    fn missing_part_rejected() {
        let (store, engine, cid) = setup();
        let result = check(&store, &engine, &cid, &[("text", PartValue::text("hi"))]);
        assert!(matches!(result, Err(TesseraError::PartsMismatch { .. })));
    }

    /// T1.3: Adding an undeclared part fails.
    #[test]
    fn extra_part_rejected() {
        let (store, engine, cid) = setup();
        let result = check(
            &store,
            &engine,
            &cid,
            &[
                ("text", PartValue::text("hi")),
                ("likes", PartValue::text("3")),
                ("author", PartValue::text("me")),
            ],
        );
        assert!(matches!(result, Err(TesseraError::PartsMismatch { .. })));
    }

    /// T1.4: A boolean where an integer is declared fails.
    #[test]
    fn wrong_tag_rejected() {
        let (store, engine, cid) = setup();
        let result = check(
            &store,
            &engine,
            &cid,
            &[("text", PartValue::text("hi")), ("likes", PartValue::Boolean(true))],
        );
        assert!(matches!(
            result,
            Err(TesseraError::TypeMismatch { expected: TypeTag::Integer, .. })
        ));
    }

    /// T1.5: A second load of the same definition never reaches the store.
    #[test]
    fn cache_idempotence() {
        let (store, engine, cid) = setup();

        let first = engine.load_definition(&store, &cid).expect("first");
        let gets = store.counters().gets;
        let second = engine.load_definition(&store, &cid).expect("second");

        assert_eq!(first.record, second.record);
        assert!(std::sync::Arc::ptr_eq(&first.record, &second.record));
        assert_eq!(store.counters().gets, gets);
    }
}

// =============================================================================
// TIER T2: FEED WINDOW AND SPINE
// =============================================================================

mod t2_feed_and_spine {
    use super::*;

    fn letter(c: char) -> Cid {
        Cid::parse(c.to_string()).expect("cid")
    }

    fn recent_items(feed: &Feed) -> Vec<Cid> {
        feed.recent.iter().map(|e| e.item.clone()).collect()
    }

    /// T2.1: The seven-item trace with a window of two.
    #[test]
    fn seven_item_trace() {
        let mut store = MemoryStore::new();
        let mut feed = Feed::make_empty("v0", 2).expect("feed");

        for c in ['a', 'b', 'c'] {
            feed = feed.append(&mut store, letter(c)).expect("append");
        }
        assert_eq!(recent_items(&feed), vec![letter('c'), letter('b'), letter('a')]);
        assert!(feed.older.is_empty());

        // d: window reaches 4, [a, b] is evicted.
        feed = feed.append(&mut store, letter('d')).expect("append");
        assert_eq!(recent_items(&feed), vec![letter('d'), letter('c')]);
        let levels = feed.older.levels();
        assert_eq!(levels.len(), 1);
        assert_eq!((levels[0].depth, levels[0].first_key, levels[0].last_key), (0, 0, 1));
        let tree = SearchSpineTree::load(&store, &levels[0].item).expect("tree");
        let SpineFirst::Batch(batch) = &tree.first else {
            panic!("expected an inline batch");
        };
        let batch_items: Vec<Cid> = batch.iter().map(|e| e.item.clone()).collect();
        assert_eq!(batch_items, vec![letter('a'), letter('b')]);

        // e, f: window reaches 4 again, [c, d] carries into depth 1.
        feed = feed.append(&mut store, letter('e')).expect("append");
        feed = feed.append(&mut store, letter('f')).expect("append");
        assert_eq!(recent_items(&feed), vec![letter('f'), letter('e')]);
        let levels = feed.older.levels();
        assert_eq!(levels.len(), 1);
        assert_eq!((levels[0].depth, levels[0].first_key, levels[0].last_key), (1, 0, 3));

        // g: no eviction.
        feed = feed.append(&mut store, letter('g')).expect("append");
        assert_eq!(recent_items(&feed), vec![letter('g'), letter('f'), letter('e')]);
        assert_eq!(feed.next_sequence_number, 7);
        assert_eq!(feed.evicted_count(), 4);
        assert_eq!(feed.older.covered(), Some((0, 3)));

        for (n, c) in ('a'..='g').enumerate() {
            assert_eq!(feed.get(&store, n as u64).expect("get"), Some(letter(c)));
        }
    }

    /// T2.2: Two trees exist after the trace: one per evicted batch.
    #[test]
    fn trace_writes_one_tree_per_batch() {
        let mut store = MemoryStore::new();
        let mut feed = Feed::make_empty("v0", 2).expect("feed");
        for c in 'a'..='g' {
            feed = feed.append(&mut store, letter(c)).expect("append");
        }
        assert_eq!(store.object_count(), 2);
    }
}

// =============================================================================
// TIER T3: ROOT PUBLICATION
// =============================================================================

mod t3_root_publication {
    use super::*;

    /// T3.1: Publishing stores the entity, appends it and moves the root.
    #[test]
    fn publish_updates_published_root() {
        let mut store = MemoryStore::new();
        let definition = EntityDefinition::new(
            "v0",
            EntityKind::Action,
            "Like",
            schema(&[("target", TypeTag::Thing)]),
        )
        .expect("definition");
        let like_type = definition.store(&mut store).expect("store");
        let profile = EntityDefinition::new(
            "v0",
            EntityKind::Thing,
            "Profile",
            schema(&[]),
        )
        .expect("definition");
        let profile_type = profile.store(&mut store).expect("store");

        let mut root = RootManager::load(&mut store, SchemaEngine::default(), FeedSettings::default())
            .expect("root");
        let before = store.resolve().expect("resolve");

        let someone = Entity::new("v0", profile_type.clone(), "t", PartValues::new());
        let outcome = root.publish_entity(&mut store, someone).expect("publish");
        let PublishOutcome::Published { entity: someone_cid, .. } = outcome else {
            panic!("profile rejected: {:?}", outcome);
        };

        let like = Entity::new(
            "v0",
            like_type.clone(),
            "t",
            values(&[("target", PartValue::text(someone_cid.as_str()))]),
        );
        let outcome = root.publish_entity(&mut store, like).expect("publish");
        assert!(outcome.is_published(), "{:?}", outcome);

        let after = store.resolve().expect("resolve").expect("root");
        assert_ne!(Some(after.clone()), before);
        let persisted = UserRoot::load(&store, &after).expect("root record");
        assert_eq!(persisted.feeds.len(), 2);
        assert!(persisted.feeds.contains_key(&like_type));
        assert!(persisted.feeds.contains_key(&profile_type));
    }
}
