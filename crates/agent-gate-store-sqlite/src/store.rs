// crates/agent-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Trust Store
// Description: Durable TrustCache and AccountDirectory backed by SQLite WAL.
// Purpose: Persist trust records, account locks, and push tokens.
// Dependencies: agent-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`TrustCache`] and [`AccountDirectory`] on a single
//! `SQLite` connection. Trust records are stored as JSON snapshots keyed by
//! provider and agent; each store overwrites the previous snapshot. Loads
//! verify that the snapshot matches its key and fail closed on corruption.
//! Security posture: database contents are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use agent_gate_core::AccountDirectory;
use agent_gate_core::AccountState;
use agent_gate_core::AgentId;
use agent_gate_core::Clock;
use agent_gate_core::ProviderId;
use agent_gate_core::StoreError;
use agent_gate_core::SystemClock;
use agent_gate_core::TrustCache;
use agent_gate_core::TrustRecord;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum trust record snapshot size accepted by the store.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` trust store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored snapshot does not match its key or cannot be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Store(format!("version mismatch: {message}"))
            }
            SqliteStoreError::Corrupt(message) => Self::Invalid(format!("corrupt: {message}")),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error into a store error.
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed trust cache and account directory.
///
/// # Invariants
/// - All access is serialized through one connection mutex.
/// - Lock and unlock upsert the account row so locks issued before first
///   login still apply.
#[derive(Clone)]
pub struct SqliteTrustStore {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTrustStore {
    /// Opens (or creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the database
    /// cannot be opened, or the schema version is unsupported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Registers a push-notification token for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn register_push_token(
        &self,
        agent: &AgentId,
        token: &str,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT OR IGNORE INTO push_tokens (agent_id, token) VALUES (?1, ?2)",
                params![agent.as_str(), token],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Marks the agent as self-disqualified, creating the account if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the update fails.
    pub fn set_self_disqualified(
        &self,
        agent: &AgentId,
        disqualified: bool,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.guard()?;
        upsert_account(&guard, agent)?;
        guard
            .execute(
                "UPDATE accounts SET self_disqualified = ?2 WHERE agent_id = ?1",
                params![agent.as_str(), disqualified],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Returns a snapshot of the account, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn account(&self, agent: &AgentId) -> Result<Option<AccountState>, SqliteStoreError> {
        let guard = self.guard()?;
        let row: Option<(bool, Option<String>, bool)> = guard
            .query_row(
                "SELECT locked, lock_reason, self_disqualified FROM accounts WHERE agent_id = ?1",
                params![agent.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        let Some((locked, lock_reason, self_disqualified)) = row else {
            return Ok(None);
        };
        let mut statement = guard
            .prepare("SELECT token FROM push_tokens WHERE agent_id = ?1 ORDER BY token")
            .map_err(|err| db_err(&err))?;
        let push_tokens: BTreeSet<String> = statement
            .query_map(params![agent.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| db_err(&err))?
            .collect::<Result<_, _>>()
            .map_err(|err| db_err(&err))?;
        Ok(Some(AccountState {
            locked,
            lock_reason,
            self_disqualified,
            push_tokens,
        }))
    }

    /// Acquires the connection lock.
    fn guard(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite connection mutex poisoned".to_string()))
    }

    /// Sets the lock flag and reason, creating the account if needed.
    fn set_locked(
        &self,
        agent: &AgentId,
        locked: bool,
        reason: &str,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.guard()?;
        upsert_account(&guard, agent)?;
        guard
            .execute(
                "UPDATE accounts SET locked = ?2, lock_reason = ?3 WHERE agent_id = ?1",
                params![agent.as_str(), locked, reason],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Returns a boolean account column, `false` when the account is absent.
    fn account_flag(&self, agent: &AgentId, column: AccountFlag) -> Result<bool, SqliteStoreError> {
        let guard = self.guard()?;
        let sql = match column {
            AccountFlag::Locked => "SELECT locked FROM accounts WHERE agent_id = ?1",
            AccountFlag::SelfDisqualified => {
                "SELECT self_disqualified FROM accounts WHERE agent_id = ?1"
            }
        };
        let value: Option<bool> = guard
            .query_row(sql, params![agent.as_str()], |row| row.get(0))
            .optional()
            .map_err(|err| db_err(&err))?;
        Ok(value.unwrap_or(false))
    }
}

/// Boolean account columns.
#[derive(Debug, Clone, Copy)]
enum AccountFlag {
    /// `accounts.locked`.
    Locked,
    /// `accounts.self_disqualified`.
    SelfDisqualified,
}

// ============================================================================
// SECTION: TrustCache
// ============================================================================

impl TrustCache for SqliteTrustStore {
    fn load(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
    ) -> Result<Option<TrustRecord>, StoreError> {
        let guard = self.guard()?;
        let row: Option<(Vec<u8>, i64)> = guard
            .query_row(
                "SELECT record_json, fetched_at FROM trust_records
                 WHERE provider_id = ?1 AND agent_id = ?2",
                params![provider.as_str(), agent.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        let Some((bytes, fetched_at)) = row else {
            return Ok(None);
        };
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(SqliteStoreError::Corrupt(format!(
                "record_json exceeds size limit: {} bytes (max {MAX_RECORD_BYTES})",
                bytes.len()
            ))
            .into());
        }
        let record: TrustRecord = serde_json::from_slice(&bytes)
            .map_err(|err| SqliteStoreError::Corrupt(format!("record decode failed: {err}")))?;
        if record.fetched_at.as_unix_millis() != fetched_at {
            return Err(SqliteStoreError::Corrupt("fetched_at mismatch".to_string()).into());
        }
        Ok(Some(record))
    }

    fn store(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
        record: &TrustRecord,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|err| SqliteStoreError::Invalid(format!("record encode failed: {err}")))?;
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(SqliteStoreError::Invalid(format!(
                "record_json exceeds size limit: {} bytes (max {MAX_RECORD_BYTES})",
                bytes.len()
            ))
            .into());
        }
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO trust_records (provider_id, agent_id, record_json, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(provider_id, agent_id) DO UPDATE SET
                    record_json = excluded.record_json,
                    fetched_at = excluded.fetched_at",
                params![
                    provider.as_str(),
                    agent.as_str(),
                    bytes,
                    record.fetched_at.as_unix_millis()
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: AccountDirectory
// ============================================================================

impl AccountDirectory for SqliteTrustStore {
    fn is_known_agent(&self, agent: &AgentId) -> Result<bool, StoreError> {
        let guard = self.guard()?;
        let found: Option<i64> = guard
            .query_row(
                "SELECT 1 FROM accounts WHERE agent_id = ?1",
                params![agent.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        Ok(found.is_some())
    }

    fn bootstrap_first_login(&self, agent: &AgentId) -> Result<(), StoreError> {
        let guard = self.guard()?;
        upsert_account(&guard, agent)?;
        Ok(())
    }

    fn is_locked(&self, agent: &AgentId) -> Result<bool, StoreError> {
        Ok(self.account_flag(agent, AccountFlag::Locked)?)
    }

    fn is_self_disqualified(&self, agent: &AgentId) -> Result<bool, StoreError> {
        Ok(self.account_flag(agent, AccountFlag::SelfDisqualified)?)
    }

    fn lock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError> {
        Ok(self.set_locked(agent, true, reason)?)
    }

    fn unlock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError> {
        Ok(self.set_locked(agent, false, reason)?)
    }

    fn delete_account(&self, agent: &AgentId) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        tx.execute("DELETE FROM push_tokens WHERE agent_id = ?1", params![agent.as_str()])
            .map_err(|err| db_err(&err))?;
        tx.execute("DELETE FROM trust_records WHERE agent_id = ?1", params![agent.as_str()])
            .map_err(|err| db_err(&err))?;
        tx.execute("DELETE FROM accounts WHERE agent_id = ?1", params![agent.as_str()])
            .map_err(|err| db_err(&err))?;
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn revoke_all_push_tokens(&self, agent: &AgentId) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute("DELETE FROM push_tokens WHERE agent_id = ?1", params![agent.as_str()])
            .map_err(|err| db_err(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Inserts an empty account row when none exists.
fn upsert_account(connection: &Connection, agent: &AgentId) -> Result<(), SqliteStoreError> {
    connection
        .execute(
            "INSERT OR IGNORE INTO accounts (agent_id, locked, self_disqualified, created_at)
             VALUES (?1, 0, 0, ?2)",
            params![agent.as_str(), SystemClock.now().as_unix_millis()],
        )
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS trust_records (
                    provider_id TEXT NOT NULL,
                    agent_id TEXT NOT NULL,
                    record_json BLOB NOT NULL,
                    fetched_at INTEGER NOT NULL,
                    PRIMARY KEY (provider_id, agent_id)
                );
                CREATE TABLE IF NOT EXISTS accounts (
                    agent_id TEXT PRIMARY KEY,
                    locked INTEGER NOT NULL DEFAULT 0,
                    lock_reason TEXT,
                    self_disqualified INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS push_tokens (
                    agent_id TEXT NOT NULL,
                    token TEXT NOT NULL,
                    PRIMARY KEY (agent_id, token)
                );
                CREATE INDEX IF NOT EXISTS idx_trust_records_agent
                    ON trust_records (agent_id);",
            )
            .map_err(|err| db_err(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}
