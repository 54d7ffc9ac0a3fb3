//! # Configuration
//!
//! Settings are read from a TOML file (`mindtype.toml` by default) and then
//! overridden by `MINDTYPE_*` environment variables. A missing file means
//! built-in defaults.
//!
//! ## Environment Variables
//!
//! - `MINDTYPE_BACKEND`: `csv`, `redb` or `sheet`
//! - `MINDTYPE_DATA`: path of the CSV file or redb database
//! - `MINDTYPE_JOURNAL`: path of the fallback journal (`off` disables it)
//! - `MINDTYPE_SHEET_ID`, `MINDTYPE_SHEET_TOKEN`: remote spreadsheet access
//! - `MINDTYPE_ADMIN_SECRET_HASH`: BLAKE3 hex digest of the admin secret
//! - `MINDTYPE_MIN_AGE`: youngest accepted participant age
//! - `MINDTYPE_RATE_LIMIT`: requests per second (0 disables)
//! - `MINDTYPE_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `MINDTYPE_SESSION_TTL`: idle seconds before a session is evicted
//! - `MINDTYPE_ADVISORY_PAUSE_MS`: high-distress advisory hold in milliseconds

use mindtype_core::MindtypeError;
use mindtype_core::primitives::{ADVISORY_PAUSE, DEFAULT_MIN_AGE, MAX_AGE};
use mindtype_core::wizard::WizardConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default config file name.
pub const DEFAULT_CONFIG_PATH: &str = "mindtype.toml";

/// Template written by `mindtype init`.
pub const CONFIG_TEMPLATE: &str = r#"# Mindtype configuration
#
# Every key can be overridden with a MINDTYPE_* environment variable.

[study]
# Youngest participant age accepted by the consent gate.
min_age = 18
# How long the high-distress advisory holds the wizard (milliseconds).
advisory_pause_ms = 3000

[storage]
# csv | redb | sheet
backend = "csv"
# CSV file or redb database path.
data = "responses.csv"
# Local journal that keeps records when the primary backend fails.
journal = "mindtype-journal.redb"

[storage.sheet]
# Spreadsheet id and OAuth bearer token (prefer MINDTYPE_SHEET_TOKEN).
id = ""
token = ""
tab = "Sheet1"

[server]
# Requests per second for participant routes (0 disables rate limiting).
rate_limit = 100
# Requests per minute for admin routes.
admin_rate_limit = 30
# Idle seconds before a participant session is evicted.
session_ttl_secs = 3600
# Comma-separated allowed origins, or "*". Unset means localhost only.
# cors_origins = "https://survey.example.org"
# BLAKE3 hex digest of the admin secret (see `mindtype hash-secret`).
# admin_secret_hash = ""
"#;

const fn default_min_age() -> u8 {
    DEFAULT_MIN_AGE
}

fn default_advisory_pause_ms() -> u64 {
    u64::try_from(ADVISORY_PAUSE.as_millis()).unwrap_or(3000)
}

fn default_data() -> PathBuf {
    PathBuf::from("responses.csv")
}

fn default_journal() -> Option<PathBuf> {
    Some(PathBuf::from("mindtype-journal.redb"))
}

fn default_tab() -> String {
    "Sheet1".to_string()
}

fn default_endpoint() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

const fn default_rate_limit() -> u32 {
    100
}

const fn default_admin_rate_limit() -> u32 {
    30
}

const fn default_session_ttl_secs() -> u64 {
    3600
}

// =============================================================================
// BACKEND
// =============================================================================

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local CSV file.
    #[default]
    Csv,
    /// Embedded redb record log.
    Redb,
    /// Remote spreadsheet.
    Sheet,
}

impl Backend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Csv => "csv",
            Backend::Redb => "redb",
            Backend::Sheet => "sheet",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = MindtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "file" => Ok(Backend::Csv),
            "redb" => Ok(Backend::Redb),
            "sheet" | "sheets" => Ok(Backend::Sheet),
            other => Err(MindtypeError::Config(format!(
                "unknown backend '{}'; use csv, redb or sheet",
                other
            ))),
        }
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Study tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_min_age")]
    pub min_age: u8,

    #[serde(default = "default_advisory_pause_ms")]
    pub advisory_pause_ms: u64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            min_age: default_min_age(),
            advisory_pause_ms: default_advisory_pause_ms(),
        }
    }
}

/// Remote spreadsheet access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub token: String,

    /// Worksheet (tab) the rows are appended to.
    #[serde(default = "default_tab")]
    pub tab: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            token: String::new(),
            tab: default_tab(),
            endpoint: default_endpoint(),
        }
    }
}

impl SheetConfig {
    /// Whether both the spreadsheet id and the token are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.id.is_empty() && !self.token.is_empty()
    }
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_data")]
    pub data: PathBuf,

    /// Fallback journal; `None` disables it.
    #[serde(default = "default_journal")]
    pub journal: Option<PathBuf>,

    #[serde(default)]
    pub sheet: SheetConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data: default_data(),
            journal: default_journal(),
            sheet: SheetConfig::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    #[serde(default = "default_admin_rate_limit")]
    pub admin_rate_limit: u32,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default)]
    pub cors_origins: Option<String>,

    #[serde(default)]
    pub admin_secret_hash: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            admin_rate_limit: default_admin_rate_limit(),
            session_ttl_secs: default_session_ttl_secs(),
            cors_origins: None,
            admin_secret_hash: None,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load the file at `path` (defaults if it does not exist), then apply
    /// `MINDTYPE_*` overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, MindtypeError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                return Err(MindtypeError::Config(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, MindtypeError> {
        toml::from_str(text).map_err(|e| MindtypeError::Config(e.to_string()))
    }

    /// Apply `MINDTYPE_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), MindtypeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MINDTYPE_BACKEND") {
            self.storage.backend = v.parse()?;
        }
        if let Some(v) = get("MINDTYPE_DATA") {
            self.storage.data = PathBuf::from(v);
        }
        if let Some(v) = get("MINDTYPE_JOURNAL") {
            self.storage.journal = match v.as_str() {
                "off" | "none" => None,
                _ => Some(PathBuf::from(v)),
            };
        }
        if let Some(v) = get("MINDTYPE_SHEET_ID") {
            self.storage.sheet.id = v;
        }
        if let Some(v) = get("MINDTYPE_SHEET_TOKEN") {
            self.storage.sheet.token = v;
        }
        if let Some(v) = get("MINDTYPE_ADMIN_SECRET_HASH") {
            self.server.admin_secret_hash = Some(v.trim().to_ascii_lowercase());
        }
        if let Some(v) = get("MINDTYPE_MIN_AGE") {
            self.study.min_age = parse_number("MINDTYPE_MIN_AGE", &v)?;
        }
        if let Some(v) = get("MINDTYPE_RATE_LIMIT") {
            self.server.rate_limit = parse_number("MINDTYPE_RATE_LIMIT", &v)?;
        }
        if let Some(v) = get("MINDTYPE_CORS_ORIGINS") {
            self.server.cors_origins = Some(v);
        }
        if let Some(v) = get("MINDTYPE_SESSION_TTL") {
            self.server.session_ttl_secs = parse_number("MINDTYPE_SESSION_TTL", &v)?;
        }
        if let Some(v) = get("MINDTYPE_ADVISORY_PAUSE_MS") {
            self.study.advisory_pause_ms = parse_number("MINDTYPE_ADVISORY_PAUSE_MS", &v)?;
        }
        Ok(())
    }

    /// Reject settings no deployment can run with.
    pub fn validate(&self) -> Result<(), MindtypeError> {
        if self.study.min_age > MAX_AGE {
            return Err(MindtypeError::Config(format!(
                "min_age {} exceeds maximum age {}",
                self.study.min_age, MAX_AGE
            )));
        }
        if self.server.session_ttl_secs == 0 {
            return Err(MindtypeError::Config(
                "session_ttl_secs must be positive".to_string(),
            ));
        }
        if let Some(hash) = &self.server.admin_secret_hash
            && (hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(MindtypeError::Config(
                "admin_secret_hash must be a 64-character BLAKE3 hex digest".to_string(),
            ));
        }
        Ok(())
    }

    /// Wizard tunables derived from the study section.
    #[must_use]
    pub fn wizard_config(&self) -> WizardConfig {
        WizardConfig {
            min_age: self.study.min_age,
            advisory_pause: Duration::from_millis(self.study.advisory_pause_ms),
        }
    }

    /// Idle timeout for participant sessions.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.server.session_ttl_secs)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, MindtypeError> {
    value
        .trim()
        .parse()
        .map_err(|_| MindtypeError::Config(format!("{} must be a number, got '{}'", key, value)))
}

// =============================================================================
// TESTS
// =============================================================================
