//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::{BackendKind, Config};
use crate::ipfs::IpfsStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tessera_core::{
    Cid, Entity, EntityDefinition, FeedEntry, FileInfo, PublishOutcome, Record, Session,
    TesseraError, primitives::MAX_RECORD_SIZE,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a record file (the same bound the store enforces on read).
const MAX_RECORD_FILE_SIZE: u64 = MAX_RECORD_SIZE as u64;

/// Maximum size of a raw upload (500 MB).
const MAX_UPLOAD_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TesseraError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TesseraError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TesseraError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it
/// names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TesseraError> {
    let canonical = path.canonicalize().map_err(|e| {
        TesseraError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TesseraError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read an input file after path and size checks.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, TesseraError> {
    let validated_path = validate_file_path(path)?;
    validate_file_size(&validated_path, max_size)?;
    std::fs::read(&validated_path)
        .map_err(|e| TesseraError::Io(format!("Read file '{}': {}", path.display(), e)))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SESSION LOADING
// =============================================================================

/// Open a session on the configured backend, loading or initializing its root.
pub fn open_session(config: &Config) -> Result<Session, TesseraError> {
    let settings = config.feed_settings()?;

    let session = match config.store.backend {
        BackendKind::Memory => Session::in_memory(settings)?,
        BackendKind::Redb => Session::with_redb(&config.store.path, settings)?,
        BackendKind::Ipfs => Session::with_store(
            Box::new(IpfsStore::new(config.store.ipfs_binary.clone())),
            settings,
        )?,
    };

    Ok(session.with_max_attempts(config.publish.max_attempts))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), TesseraError> {
    let session = open_session(config)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    println!("Tessera Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", config.store.backend);
    if config.store.backend == BackendKind::Redb {
        println!("  Database: {:?}", config.store.path);
    }
    println!("  Window:   {}", config.feed.optimal_recent);
    println!();
    println!("Endpoints:");
    println!("  POST /definitions       - Store an entity definition");
    println!("  POST /file-infos        - Store a file info record");
    println!("  POST /entities/check    - Check an entity");
    println!("  POST /entities          - Publish an entity");
    println!("  GET  /feeds             - List feeds");
    println!("  GET  /feeds/{{type}}      - Feed entries");
    println!("  GET  /feeds/{{type}}/{{n}}  - One feed entry");
    println!("  GET  /objects/{{cid}}     - Raw object bytes");
    println!("  GET  /status            - Session status");
    println!("  GET  /health            - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show session status.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), TesseraError> {
    let session = open_session(config)?;
    let status = session.status();
    let root = status.root.as_ref().map(|cid| cid.to_string());

    if json_mode {
        print_json(&serde_json::json!({
            "backend": status.backend,
            "database": config.store.path.to_string_lossy(),
            "root": root,
            "feed_count": status.feeds,
            "entry_count": status.entries,
            "optimal_recent": session.settings().optimal_recent,
        }));
        return Ok(());
    }

    println!("Tessera Status");
    println!("==============");
    println!("Backend:  {}", status.backend);
    if config.store.backend == BackendKind::Redb {
        println!("Database: {:?}", config.store.path);
    }
    println!();
    println!("Root:     {}", root.as_deref().unwrap_or("(none)"));
    println!("Feeds:    {}", status.feeds);
    println!("Entries:  {}", status.entries);
    println!("Window:   {}", session.settings().optimal_recent);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new store and publish an empty root.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), TesseraError> {
    if config.store.backend == BackendKind::Redb && config.store.path.exists() {
        if !force {
            return Err(TesseraError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&config.store.path)
            .map_err(|e| TesseraError::Io(format!("Remove database: {}", e)))?;
    }

    let session = open_session(config)?;
    let root = session
        .status()
        .root
        .map(|cid| cid.to_string())
        .unwrap_or_default();

    match config.store.backend {
        BackendKind::Redb => println!("Initialized new redb database at {:?}", config.store.path),
        backend => println!("Initialized {} store", backend),
    }
    println!("Root: {}", root);

    Ok(())
}

// =============================================================================
// RECORD COMMANDS
// =============================================================================

/// Store an entity definition read from a file.
pub fn cmd_define(config: &Config, json_mode: bool, file: &Path) -> Result<(), TesseraError> {
    let definition = EntityDefinition::decode(&read_input(file, MAX_RECORD_FILE_SIZE)?)?;
    let mut session = open_session(config)?;
    let entity_type = session.define(&definition)?;

    if json_mode {
        print_json(&serde_json::json!({
            "entity_type": entity_type.to_string(),
            "name": definition.name,
            "kind": definition.kind.as_str(),
            "part_count": definition.parts.len(),
        }));
    } else {
        println!("Defined {} \"{}\"", definition.kind, definition.name);
        println!("Entity type: {}", entity_type);
    }
    Ok(())
}

/// Store a file info record read from a file.
pub fn cmd_file_info(config: &Config, json_mode: bool, file: &Path) -> Result<(), TesseraError> {
    let info = FileInfo::decode(&read_input(file, MAX_RECORD_FILE_SIZE)?)?;
    let mut session = open_session(config)?;
    let cid = session.store_file_info(&info)?;

    if json_mode {
        print_json(&serde_json::json!({ "cid": cid.to_string() }));
    } else {
        println!("Stored file info: {}", cid);
    }
    Ok(())
}

/// Store a raw file, then a file info record pointing at it.
pub fn cmd_upload(
    config: &Config,
    json_mode: bool,
    file: &Path,
    file_type: Option<&str>,
) -> Result<(), TesseraError> {
    let file_type = match file_type {
        Some(t) => t.to_string(),
        None => file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                TesseraError::Io(format!(
                    "Cannot infer a file type for '{}'; pass --file-type",
                    file.display()
                ))
            })?,
    };

    let bytes = read_input(file, MAX_UPLOAD_FILE_SIZE)?;
    let mut session = open_session(config)?;
    let raw_data_cid = session.put_raw(&bytes)?;
    let info = FileInfo::new(
        session.settings().protocol_version.clone(),
        file_type,
        bytes.len() as u64,
        raw_data_cid.clone(),
    );
    let cid = session.store_file_info(&info)?;

    tracing::info!(file = %file.display(), size = bytes.len(), "uploaded file");

    if json_mode {
        print_json(&serde_json::json!({
            "cid": cid.to_string(),
            "raw_data_cid": raw_data_cid.to_string(),
            "file_type": info.file_type,
            "file_size": info.file_size,
        }));
    } else {
        println!("Uploaded {} bytes ({})", bytes.len(), info.file_type);
        println!("Raw data:  {}", raw_data_cid);
        println!("File info: {}", cid);
    }
    Ok(())
}

// =============================================================================
// ENTITY COMMANDS
// =============================================================================

/// Check an entity without publishing it. Fails if the entity is invalid.
pub fn cmd_check(config: &Config, json_mode: bool, file: &Path) -> Result<(), TesseraError> {
    let entity = Entity::decode(&read_input(file, MAX_RECORD_FILE_SIZE)?)?;
    let session = open_session(config)?;
    let result = session.check_entity(&entity);

    if json_mode {
        print_json(&serde_json::json!({
            "valid": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        }));
    } else {
        match &result {
            Ok(()) => println!("Entity is valid for type {}", entity.entity_type),
            Err(e) => println!("Entity is invalid: {}", e),
        }
    }
    result
}

/// Publish an entity. A rejected entity is reported and fails the command.
pub fn cmd_publish(config: &Config, json_mode: bool, file: &Path) -> Result<(), TesseraError> {
    let entity = Entity::decode(&read_input(file, MAX_RECORD_FILE_SIZE)?)?;
    let entity_type = entity.entity_type.clone();
    let mut session = open_session(config)?;

    match session.publish_entity(entity)? {
        PublishOutcome::Published {
            entity,
            root,
            sequence_number,
        } => {
            if json_mode {
                print_json(&serde_json::json!({
                    "success": true,
                    "entity": entity.to_string(),
                    "entity_type": entity_type.to_string(),
                    "sequence_number": sequence_number,
                    "root": root.to_string(),
                }));
            } else {
                println!("Published entity {}", entity);
                println!("Feed {} #{}", entity_type, sequence_number);
                println!("Root: {}", root);
            }
            Ok(())
        }
        PublishOutcome::Rejected(e) => {
            if json_mode {
                print_json(&serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                }));
            } else {
                println!("Rejected: {}", e);
            }
            Err(e)
        }
    }
}

// =============================================================================
// FEED COMMANDS
// =============================================================================

fn entries_json(entries: &[FeedEntry]) -> serde_json::Value {
    entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "sequence_number": entry.sequence_number,
                "item": entry.item.to_string(),
            })
        })
        .collect()
}

/// Show a feed's entries, newest first.
pub fn cmd_feed(
    config: &Config,
    json_mode: bool,
    entity_type: &str,
    all: bool,
) -> Result<(), TesseraError> {
    let entity_type = Cid::parse(entity_type)?;
    let session = open_session(config)?;

    let Some(feed) = session.feed(&entity_type) else {
        return Err(TesseraError::MissingObject(entity_type));
    };
    let entries = if all {
        session.history(&entity_type)?
    } else {
        feed.recent.clone()
    };

    if json_mode {
        print_json(&serde_json::json!({
            "entity_type": entity_type.to_string(),
            "next_sequence_number": feed.next_sequence_number,
            "recent_count": feed.recent.len(),
            "evicted_count": feed.evicted_count(),
            "entries": entries_json(&entries),
        }));
        return Ok(());
    }

    println!("Feed {}", entity_type);
    println!("Entries: {}", feed.len());
    println!(
        "Recent:  {} (evicted: {})",
        feed.recent.len(),
        feed.evicted_count()
    );
    println!();
    for entry in &entries {
        println!("{:>8}  {}", entry.sequence_number, entry.item);
    }
    if !all && !feed.older.is_empty() {
        println!("{:>8}  (use --all for older entries)", "...");
    }

    Ok(())
}

/// Look up one feed entry and print its entity.
pub fn cmd_get(
    config: &Config,
    json_mode: bool,
    entity_type: &str,
    sequence: u64,
) -> Result<(), TesseraError> {
    let entity_type = Cid::parse(entity_type)?;
    let session = open_session(config)?;

    let Some(item) = session.lookup(&entity_type, sequence)? else {
        if json_mode {
            print_json(&serde_json::json!({ "found": false }));
        } else {
            println!("No entry #{} in feed {}", sequence, entity_type);
        }
        return Ok(());
    };
    let entity = session.load_entity(&item)?;

    if json_mode {
        print_json(&serde_json::json!({
            "found": true,
            "item": item.to_string(),
            "entity": serde_json::to_value(&*entity.record)
                .map_err(|e| TesseraError::Io(e.to_string()))?,
        }));
        return Ok(());
    }

    println!("Entry #{}: {}", sequence, item);
    println!("Datetime: {}", entity.record.datetime);
    for (name, value) in &entity.record.parts {
        println!("  {}: {}", name, value);
    }
    Ok(())
}

/// Write the raw bytes at an address to stdout.
pub fn cmd_cat(config: &Config, cid: &str) -> Result<(), TesseraError> {
    let cid = Cid::parse(cid)?;
    let session = open_session(config)?;
    let bytes = session.raw(&cid)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&bytes)
        .and_then(|()| stdout.flush())
        .map_err(|e| TesseraError::Io(format!("Write stdout: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn redb_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.store.path = dir.join("tessera.redb");
        config.feed.optimal_recent = 2;
        config
    }

    #[test]
    fn define_publish_and_read_back() {
        let temp = tempdir().unwrap();
        let config = redb_config(temp.path());

        let definition = temp.path().join("def.json");
        std::fs::write(
            &definition,
            r#"{"protocol_version":"v0","kind":"thing","name":"Note","parts":{"text":"string"}}"#,
        )
        .unwrap();
        cmd_define(&config, true, &definition).unwrap();

        let entity_type = EntityDefinition::decode(&std::fs::read(&definition).unwrap())
            .unwrap()
            .address()
            .unwrap();

        for n in 0..5 {
            let entity = temp.path().join(format!("note-{}.json", n));
            std::fs::write(
                &entity,
                format!(
                    r#"{{"protocol_version":"v0","entity_type":"{}","datetime":"t","parts":{{"text":"note {}"}}}}"#,
                    entity_type, n
                ),
            )
            .unwrap();
            cmd_check(&config, true, &entity).unwrap();
            cmd_publish(&config, true, &entity).unwrap();
        }

        let session = open_session(&config).unwrap();
        let feed = session.feed(&entity_type).unwrap();
        assert_eq!(feed.next_sequence_number, 5);
        assert_eq!(session.history(&entity_type).unwrap().len(), 5);
        drop(session);

        cmd_feed(&config, true, entity_type.as_str(), true).unwrap();
        cmd_get(&config, true, entity_type.as_str(), 0).unwrap();
    }

    #[test]
    fn rejected_publish_fails_command() {
        let temp = tempdir().unwrap();
        let config = redb_config(temp.path());

        let definition = temp.path().join("def.json");
        std::fs::write(
            &definition,
            r#"{"protocol_version":"v0","kind":"thing","name":"Count","parts":{"n":"integer"}}"#,
        )
        .unwrap();
        cmd_define(&config, true, &definition).unwrap();
        let entity_type = EntityDefinition::decode(&std::fs::read(&definition).unwrap())
            .unwrap()
            .address()
            .unwrap();

        let entity = temp.path().join("bad.json");
        std::fs::write(
            &entity,
            format!(
                r#"{{"protocol_version":"v0","entity_type":"{}","datetime":"t","parts":{{"n":"many"}}}}"#,
                entity_type
            ),
        )
        .unwrap();

        let result = cmd_publish(&config, true, &entity);
        assert!(matches!(result, Err(TesseraError::TypeMismatch { .. })));

        let session = open_session(&config).unwrap();
        assert!(session.feed(&entity_type).is_none());
    }

    #[test]
    fn init_refuses_existing_database() {
        let temp = tempdir().unwrap();
        let config = redb_config(temp.path());

        cmd_init(&config, false).unwrap();
        assert!(config.store.path.exists());
        assert!(cmd_init(&config, false).is_err());
        cmd_init(&config, true).unwrap();
    }

    #[test]
    fn upload_infers_file_type() {
        let temp = tempdir().unwrap();
        let config = redb_config(temp.path());
        let file = temp.path().join("avatar.PNG");
        std::fs::write(&file, b"\x89PNG").unwrap();

        cmd_upload(&config, true, &file, None).unwrap();

        let bare = temp.path().join("README");
        std::fs::write(&bare, b"hello").unwrap();
        assert!(cmd_upload(&config, true, &bare, None).is_err());
        cmd_upload(&config, true, &bare, Some("txt")).unwrap();
    }

    #[test]
    fn input_must_be_a_regular_file() {
        let temp = tempdir().unwrap();
        assert!(validate_file_path(temp.path()).is_err());
        assert!(validate_file_path(&temp.path().join("missing.json")).is_err());
    }
}
