use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{FoodEntry, NewFoodEntry, NewUser, User};
use crate::storage::{Storage, check_user_id, next_timestamp};

/// Durable store backed by a single `SQLite` connection.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// Raw `food_entries` row; `created_at` is parsed after the statement finishes.
type EntryColumns = (i64, i64, String, String, i64, String, i64, i64, String);

/// Fixed-width UTC timestamps so that text comparison orders them correctly.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = SqliteStorage {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SqliteStorage {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    age INTEGER NOT NULL,
                    gender TEXT NOT NULL,
                    daily_calorie_target INTEGER NOT NULL,
                    daily_protein_target INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    image_url TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    unit TEXT NOT NULL,
                    calories INTEGER NOT NULL,
                    protein INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_entries_user ON food_entries(user_id, created_at);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            age: row.get(1)?,
            gender: row.get(2)?,
            daily_calorie_target: row.get(3)?,
            daily_protein_target: row.get(4)?,
        })
    }

    fn read_user(conn: &Connection, id: i64) -> Result<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, age, gender, daily_calorie_target, daily_protein_target
                 FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn entry_columns(row: &Row<'_>) -> rusqlite::Result<EntryColumns> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn entry_from_columns(columns: EntryColumns) -> Result<FoodEntry> {
        let (id, user_id, image_url, food_name, quantity, unit, calories, protein, created_at) =
            columns;
        Ok(FoodEntry {
            id,
            user_id,
            image_url,
            food_name,
            quantity,
            unit,
            calories,
            protein,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

impl Storage for SqliteStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.lock();
        Self::read_user(&conn, id)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (age, gender, daily_calorie_target, daily_protein_target)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.age,
                user.gender,
                user.daily_calorie_target,
                user.daily_protein_target,
            ],
        )
        .context("failed to insert user")?;
        Ok(user.with_id(conn.last_insert_rowid()))
    }

    async fn update_user(&self, id: i64, user: NewUser) -> Result<User> {
        check_user_id(id)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (id, age, gender, daily_calorie_target, daily_protein_target)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                age = excluded.age,
                gender = excluded.gender,
                daily_calorie_target = excluded.daily_calorie_target,
                daily_protein_target = excluded.daily_protein_target",
            params![
                id,
                user.age,
                user.gender,
                user.daily_calorie_target,
                user.daily_protein_target,
            ],
        )
        .context("failed to update user")?;
        Ok(user.with_id(id))
    }

    async fn create_food_entry(&self, entry: NewFoodEntry) -> Result<FoodEntry> {
        let conn = self.lock();
        let last: Option<String> =
            conn.query_row("SELECT MAX(created_at) FROM food_entries", [], |row| {
                row.get(0)
            })?;
        let last = last.as_deref().map(parse_timestamp).transpose()?;
        let created_at = next_timestamp(last);

        conn.execute(
            "INSERT INTO food_entries
                (user_id, image_url, food_name, quantity, unit, calories, protein, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.user_id,
                entry.image_url,
                entry.food_name,
                entry.quantity,
                entry.unit,
                entry.calories,
                entry.protein,
                format_timestamp(created_at),
            ],
        )
        .context("failed to insert food entry")?;
        Ok(entry.with_id(conn.last_insert_rowid(), created_at))
    }

    async fn get_food_entries_by_user_id(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<FoodEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, image_url, food_name, quantity, unit, calories, protein, created_at
             FROM food_entries
             WHERE user_id = ?1 AND (?2 IS NULL OR created_at >= ?2)
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(
                params![user_id, since.map(format_timestamp)],
                Self::entry_columns,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::entry_from_columns).collect()
    }
}
