//! SQLite persistence
//!
//! One database, three tables: users (identity + role), config (runtime
//! flags as key/value) and conversations (append-only message turns).
//!
//! The connection sits behind a mutex so a single `Arc<Store>` can be shared
//! between the Telegram dispatcher and the status API. Critical sections are
//! short single-row statements; nothing awaits while the lock is held.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{BotError, Result};
use crate::roles::Role;

/// A registered user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    /// Internal id, assigned on creation. This is the id that
    /// promote/demote take as argument.
    pub id: i64,
    /// Telegram user id. Unique, immutable.
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    /// Unix seconds.
    pub created_at: i64,
}

impl StoredUser {
    /// Best display name for chat messages: username, then first name,
    /// then the internal id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// Profile fields available on first contact.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// One stored conversation exchange unit.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: String, // "user" | "assistant" | "system"
    pub content: String,
    /// Unix milliseconds, assigned at insert.
    pub timestamp: i64,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL UNIQUE,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            -- At most one operator, ever. Together with the conditional
            -- insert in ensure_user this closes the first-contact race.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_single_operator
                ON users(role) WHERE role = 'operator';

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'system')),
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_chat_ts
                ON conversations(chat_id, timestamp DESC);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; continuing with the
        // connection is still sound for SQLite.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Users =====

    /// Fetch the user matching `telegram_id`, creating one on first contact.
    ///
    /// The very first user ever created becomes `operator`; everyone after
    /// that starts as `user`. Role assignment happens inside a single INSERT
    /// so two concurrent first contacts cannot both observe an empty table,
    /// and the partial unique index rejects a second operator outright.
    ///
    /// Returns the user plus whether it was created by this call.
    pub fn ensure_user(&self, telegram_id: i64, profile: &Profile) -> Result<(StoredUser, bool)> {
        let conn = self.lock();

        if let Some(user) = Self::query_user_by_telegram_id(&conn, telegram_id)? {
            return Ok((user, false));
        }

        let inserted = conn.execute(
            "INSERT INTO users (telegram_id, username, first_name, last_name, role)
             VALUES (?1, ?2, ?3, ?4,
                     CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user' ELSE 'operator' END)",
            params![
                telegram_id,
                profile.username,
                profile.first_name,
                profile.last_name
            ],
        );

        match inserted {
            Ok(_) => {}
            // Lost a race: either the same telegram_id arrived twice or the
            // operator slot was claimed between our EXISTS and the insert.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                if Self::query_user_by_telegram_id(&conn, telegram_id)?.is_none() {
                    conn.execute(
                        "INSERT INTO users (telegram_id, username, first_name, last_name, role)
                         VALUES (?1, ?2, ?3, ?4, 'user')",
                        params![
                            telegram_id,
                            profile.username,
                            profile.first_name,
                            profile.last_name
                        ],
                    )?;
                } else {
                    let user = Self::query_user_by_telegram_id(&conn, telegram_id)?
                        .ok_or(BotError::NotFound)?;
                    return Ok((user, false));
                }
            }
            Err(e) => return Err(e.into()),
        }

        let user =
            Self::query_user_by_telegram_id(&conn, telegram_id)?.ok_or(BotError::NotFound)?;
        debug!(
            "Registered user {} (telegram {}) as {}",
            user.id,
            telegram_id,
            user.role.as_str()
        );
        Ok((user, true))
    }

    /// Look up by internal id.
    pub fn get_user(&self, id: i64) -> Result<Option<StoredUser>> {
        let conn = self.lock();
        let user = conn
            .query_row(
                "SELECT id, telegram_id, username, first_name, last_name, role, created_at
                 FROM users WHERE id = ?1",
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up by Telegram user id.
    pub fn get_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<StoredUser>> {
        let conn = self.lock();
        Self::query_user_by_telegram_id(&conn, telegram_id)
    }

    pub fn user_count(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Change a user's role. `NotFound` when the internal id is absent.
    pub fn update_user_role(&self, id: i64, role: Role) -> Result<StoredUser> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE users SET role = ?2 WHERE id = ?1",
            params![id, role.as_str()],
        )?;
        if changed == 0 {
            return Err(BotError::NotFound);
        }
        conn.query_row(
            "SELECT id, telegram_id, username, first_name, last_name, role, created_at
             FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .map_err(Into::into)
    }

    pub fn list_users(&self) -> Result<Vec<StoredUser>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, telegram_id, username, first_name, last_name, role, created_at
             FROM users ORDER BY id",
        )?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn query_user_by_telegram_id(
        conn: &Connection,
        telegram_id: i64,
    ) -> Result<Option<StoredUser>> {
        let user = conn
            .query_row(
                "SELECT id, telegram_id, username, first_name, last_name, role, created_at
                 FROM users WHERE telegram_id = ?1",
                params![telegram_id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredUser> {
        let role: String = row.get(5)?;
        Ok(StoredUser {
            id: row.get(0)?,
            telegram_id: row.get(1)?,
            username: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            role: Role::parse(&role),
            created_at: row.get(6)?,
        })
    }

    // ===== Config =====

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        debug!("Config {} = {}", key, value);
        Ok(())
    }

    // ===== Conversation turns =====

    /// Append one turn. Turns are never mutated or deleted.
    pub fn append_turn(&self, chat_id: i64, role: &str, content: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO conversations (chat_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, role, content, timestamp],
        )?;
        Ok(())
    }

    /// Most-recent-first turns for a chat. Callers reverse for
    /// chronological prompt assembly.
    pub fn recent_turns(&self, chat_id: i64, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM conversations
             WHERE chat_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let turns = stmt
            .query_map(params![chat_id, limit as i64], |row| {
                Ok(ConversationTurn {
                    role: row.get(0)?,
                    content: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }
}
