//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Storage drivers block (file locks, redb transactions, spreadsheet HTTP
//! calls), so every command that touches them runs on the blocking pool.

use crate::api::{self, ApiSettings, AppState};
use crate::config::{CONFIG_TEMPLATE, Config};
use crate::storage::{Storage, journal_pending};
use crate::terminal;
use mindtype_core::{MindtypeError, SystemClock, Wizard, export_checksum};
use std::path::{Path, PathBuf};

// =============================================================================
// HELPERS
// =============================================================================

/// Run blocking storage work off the async runtime.
async fn blocking<T, F>(op: F) -> Result<T, MindtypeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MindtypeError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| MindtypeError::Io(format!("Blocking task failed: {}", e)))?
}

/// Validate output path for security.
///
/// For output files, we validate the parent directory exists and is a
/// directory, then rebuild the path from the canonical parent.
fn validate_output_path(path: &Path) -> Result<PathBuf, MindtypeError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Canonicalize parent to resolve ".." and symlinks
    let canonical_parent = parent.canonicalize().map_err(|e| {
        MindtypeError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(MindtypeError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| MindtypeError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config, host: &str, port: u16) -> Result<(), MindtypeError> {
    let storage = Storage::open(&config.storage)?;

    if let Some(fallback) = storage.fallback() {
        let pending = fallback.pending()?;
        if pending > 0 {
            tracing::warn!(
                pending,
                "Journal holds records not yet in the primary backend; run `mindtype flush`"
            );
        }
    }

    println!("Mindtype Typing Study Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", config.storage.backend);
    println!("  Data:     {:?}", config.storage.data);
    println!(
        "  Journal:  {}",
        if storage.fallback().is_some() { "enabled" } else { "disabled" }
    );
    println!("  Min age:  {}", config.study.min_age);
    println!();
    println!("Endpoints:");
    println!("  POST /sessions                - Start a participant session");
    println!("  POST /session/consent         - Demographics and consent");
    println!("  POST /session/questionnaire   - PHQ-9 answers");
    println!("  POST /session/task/start      - Start the current typing task");
    println!("  PUT  /session/task/transcript - Update the live transcript");
    println!("  POST /session/task/complete   - Finish the current typing task");
    println!("  POST /session/finish          - Save the record");
    println!("  GET  /admin/count             - Record count (admin)");
    println!("  GET  /admin/export            - CSV export (admin)");
    println!("  GET  /health                  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(
        storage.record_store(),
        ApiSettings::from_config(config),
        config.session_ttl(),
    );
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run one participant through the wizard on stdin/stdout.
pub async fn cmd_run(config: &Config) -> Result<(), MindtypeError> {
    let storage = Storage::open(&config.storage)?;
    let store = storage.record_store();
    let wizard_config = config.wizard_config();

    let outcome = blocking(move || {
        let mut wizard = Wizard::new(SystemClock, wizard_config);
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let outcome =
            terminal::run_wizard(&mut wizard, store.as_ref(), stdin.lock(), stdout.lock())?;
        wizard.close();
        Ok(outcome)
    })
    .await?;

    tracing::info!(durable = outcome.is_durable(), "Terminal session finished");
    if outcome.is_durable() {
        Ok(())
    } else {
        Err(MindtypeError::Persistence(outcome.message()))
    }
}

// =============================================================================
// COUNT COMMAND
// =============================================================================

/// Show the number of stored records.
pub async fn cmd_count(config: &Config, json_mode: bool) -> Result<(), MindtypeError> {
    let storage = Storage::open_readonly(&config.storage)?;
    let backend = storage.backend_name().to_string();
    let storage_config = config.storage.clone();

    let (count, pending) = blocking(move || {
        let count = storage.record_store().count()?;
        Ok((count, journal_pending(&storage_config)))
    })
    .await?;

    if json_mode {
        print_json(&serde_json::json!({
            "backend": backend,
            "data": config.storage.data.to_string_lossy(),
            "count": count,
            "journal_pending": pending,
        }));
        return Ok(());
    }

    println!("Mindtype Records");
    println!("================");
    println!("Backend: {}", backend);
    println!("Data:    {:?}", config.storage.data);
    println!();
    println!("Records:         {}", count);
    if let Some(pending) = pending {
        println!("Journal pending: {}", pending);
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export every stored record as CSV.
pub async fn cmd_export(config: &Config, output: &Path) -> Result<(), MindtypeError> {
    let validated_output = validate_output_path(output)?;
    let storage = Storage::open_readonly(&config.storage)?;

    let data = blocking(move || storage.record_store().export()).await?;
    let checksum = export_checksum(&data);

    std::fs::write(&validated_output, &data)
        .map_err(|e| MindtypeError::Io(format!("Write file: {}", e)))?;

    println!("Checksum: {}", checksum);
    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// FLUSH COMMAND
// =============================================================================

/// Replay journaled records into the primary backend.
pub async fn cmd_flush(config: &Config, json_mode: bool) -> Result<(), MindtypeError> {
    let storage = Storage::open(&config.storage)?;
    if storage.fallback().is_none() {
        return Err(MindtypeError::Config(format!(
            "no fallback journal for the {} backend",
            config.storage.backend
        )));
    }

    let report = blocking(move || match storage.fallback() {
        Some(fallback) => fallback.replay(),
        None => Ok(Default::default()),
    })
    .await?;

    tracing::info!(
        replayed = report.replayed,
        remaining = report.remaining,
        "Journal replay finished"
    );

    if json_mode {
        print_json(&serde_json::json!({
            "replayed": report.replayed,
            "remaining": report.remaining,
        }));
    } else {
        println!("Replayed:  {}", report.replayed);
        println!("Remaining: {}", report.remaining);
    }

    if report.remaining > 0 {
        return Err(MindtypeError::Persistence(format!(
            "{} record(s) still journaled; the primary backend is unavailable",
            report.remaining
        )));
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write the commented configuration template.
pub fn cmd_init(path: &Path, force: bool) -> Result<(), MindtypeError> {
    if path.exists() && !force {
        return Err(MindtypeError::Config(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    std::fs::write(path, CONFIG_TEMPLATE)
        .map_err(|e| MindtypeError::Io(format!("Write config: {}", e)))?;

    println!("Wrote configuration template to {:?}", path);
    Ok(())
}

// =============================================================================
// HASH-SECRET COMMAND
// =============================================================================

/// Print the BLAKE3 digest to configure as `server.admin_secret_hash`.
pub fn cmd_hash_secret(secret: &str, json_mode: bool) -> Result<(), MindtypeError> {
    if secret.is_empty() {
        return Err(MindtypeError::Validation(
            "admin secret must not be empty".to_string(),
        ));
    }

    let hash = api::hash_secret(secret);
    if json_mode {
        print_json(&serde_json::json!({ "admin_secret_hash": hash }));
    } else {
        println!("admin_secret_hash = \"{}\"", hash);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_in_current_dir_is_accepted() {
        let resolved = validate_output_path(Path::new("export.csv")).expect("valid");
        assert!(resolved.ends_with("export.csv"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn output_path_with_missing_parent_is_rejected() {
        let err = validate_output_path(Path::new("/definitely/not/here/export.csv"))
            .expect_err("missing parent");
        assert!(matches!(err, MindtypeError::Io(_)));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mindtype.toml");
        cmd_init(&path, false).expect("first init");
        assert!(cmd_init(&path, false).is_err());
        cmd_init(&path, true).expect("forced init");

        let text = std::fs::read_to_string(&path).expect("read");
        let config = Config::from_toml(&text).expect("template parses");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            cmd_hash_secret("", false),
            Err(MindtypeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn export_writes_header_for_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.storage.data = dir.path().join("responses.csv");
        config.storage.journal = None;

        let output = dir.path().join("out.csv");
        cmd_export(&config, &output).await.expect("export");

        let text = std::fs::read_to_string(&output).expect("read");
        assert!(text.starts_with("participant_id,"));
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn count_and_export_run_while_the_journal_is_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.storage.data = dir.path().join("responses.csv");
        config.storage.journal = Some(dir.path().join("journal.redb"));

        let server_storage = Storage::open(&config.storage).expect("server storage");

        cmd_count(&config, true).await.expect("count");
        let output = dir.path().join("out.csv");
        cmd_export(&config, &output).await.expect("export");
        assert!(output.exists());

        drop(server_storage);
    }

    #[tokio::test]
    async fn flush_without_journal_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.storage.data = dir.path().join("responses.csv");
        config.storage.journal = None;

        assert!(matches!(
            cmd_flush(&config, true).await,
            Err(MindtypeError::Config(_))
        ));
    }
}
