//! [`SqliteCatalog`] — the catalog source over a SQLite database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};

use eventpool_core::{CatalogSource, Choice, ChoiceId, Effect, Turn, TurnNumber};

use crate::error::SqliteCatalogError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS turns (
        turn_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_number INTEGER NOT NULL UNIQUE,
        event_text  TEXT NOT NULL,
        description TEXT
    );
    CREATE TABLE IF NOT EXISTS choices (
        choice_id   INTEGER PRIMARY KEY,
        turn_number INTEGER NOT NULL,
        text        TEXT NOT NULL,
        effects     TEXT NOT NULL,
        next_turn   INTEGER NOT NULL,
        category    TEXT,
        description TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_choices_turn_number ON choices (turn_number);
";

type SqlResult<T> = std::result::Result<T, SqliteCatalogError>;

// ---------------------------------------------------------------------------
// SqliteCatalog
// ---------------------------------------------------------------------------

/// Handle to a SQLite database holding the turn/choice catalog.
///
/// The connection sits behind a mutex so the handle can be shared with the
/// event cache; every read runs on `tokio`'s blocking pool.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use eventpool_core::{EventPoolConfig, EventSystem};
/// # use eventpool_sqlite::SqliteCatalog;
/// # async fn run() -> eventpool_core::Result<()> {
/// let catalog = SqliteCatalog::open("events.db")?;
/// let system = EventSystem::bootstrap(Arc::new(catalog), EventPoolConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at `path`.
    ///
    /// The schema is created if missing and WAL mode is enabled so readers
    /// don't block an import running from another process.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "Event catalog opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Open an in-memory catalog (useful for tests and fixtures).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::Database`] on SQLite failures.
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the underlying database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Upsert turns and choices in a single transaction.
    ///
    /// Turns are keyed by `turn_number` and choices by `choice_id`; existing
    /// rows are replaced. A turn without a `turn_id` gets one assigned.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::Encode`] if an effect fails to encode,
    /// or [`SqliteCatalogError::Database`] on SQLite failures. Nothing is
    /// written when either occurs.
    pub fn import(&self, turns: &[Turn], choices: &[Choice]) -> SqlResult<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut insert_turn = tx.prepare_cached(
                "INSERT OR REPLACE INTO turns (turn_id, turn_number, event_text, description)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for turn in turns {
                insert_turn.execute(params![
                    turn.turn_id,
                    turn.turn_number.0,
                    turn.event_text,
                    turn.description,
                ])?;
            }

            let mut insert_choice = tx.prepare_cached(
                "INSERT INTO choices
                    (choice_id, turn_number, text, effects, next_turn, category, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(choice_id) DO UPDATE SET
                    turn_number = excluded.turn_number,
                    text = excluded.text,
                    effects = excluded.effects,
                    next_turn = excluded.next_turn,
                    category = excluded.category,
                    description = excluded.description",
            )?;
            for choice in choices {
                let effects = serde_json::to_string(&choice.effects)?;
                insert_choice.execute(params![
                    choice.choice_id.0,
                    choice.turn_number.0,
                    choice.text,
                    effects,
                    choice.next_turn.0,
                    choice.category,
                    choice.description,
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            turns = turns.len(),
            choices = choices.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Imported event catalog"
        );
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> SqlResult<T>
    where
        F: FnOnce(&Connection) -> SqlResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&*conn.lock())).await?
    }
}

#[async_trait]
impl CatalogSource for SqliteCatalog {
    async fn fetch_all_turns(&self) -> eventpool_core::Result<Vec<Turn>> {
        Ok(self.blocking(read_turns).await?)
    }

    async fn fetch_all_choices(&self) -> eventpool_core::Result<Vec<Choice>> {
        Ok(self.blocking(read_choices).await?)
    }
}

// ---------------------------------------------------------------------------
// Row readers
// ---------------------------------------------------------------------------

fn read_turns(conn: &Connection) -> SqlResult<Vec<Turn>> {
    let start = Instant::now();
    let mut stmt = conn.prepare_cached(
        "SELECT turn_id, turn_number, event_text, description FROM turns ORDER BY turn_number",
    )?;
    let turns = stmt
        .query_map([], |row| {
            Ok(Turn {
                turn_id: row.get(0)?,
                turn_number: TurnNumber(row.get(1)?),
                event_text: row.get(2)?,
                description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(
        turns = turns.len(),
        elapsed_us = start.elapsed().as_micros(),
        "Read turns"
    );
    Ok(turns)
}

/// A `choices` row before its effects are decoded.
struct ChoiceRow {
    choice_id: u32,
    turn_number: u32,
    text: String,
    effects: String,
    next_turn: u32,
    category: Option<String>,
    description: Option<String>,
}

impl ChoiceRow {
    fn decode(self) -> SqlResult<Choice> {
        let effects: Effect =
            serde_json::from_str(&self.effects).map_err(|source| SqliteCatalogError::Effects {
                choice_id: self.choice_id,
                source,
            })?;
        Ok(Choice {
            choice_id: ChoiceId(self.choice_id),
            turn_number: TurnNumber(self.turn_number),
            text: self.text,
            effects,
            next_turn: TurnNumber(self.next_turn),
            category: self.category,
            description: self.description,
        })
    }
}

fn read_choices(conn: &Connection) -> SqlResult<Vec<Choice>> {
    let start = Instant::now();
    let mut stmt = conn.prepare_cached(
        "SELECT choice_id, turn_number, text, effects, next_turn, category, description
         FROM choices ORDER BY choice_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ChoiceRow {
                choice_id: row.get(0)?,
                turn_number: row.get(1)?,
                text: row.get(2)?,
                effects: row.get(3)?,
                next_turn: row.get(4)?,
                category: row.get(5)?,
                description: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let choices = rows
        .into_iter()
        .map(ChoiceRow::decode)
        .collect::<SqlResult<Vec<_>>>()?;

    debug!(
        choices = choices.len(),
        elapsed_us = start.elapsed().as_micros(),
        "Read choices"
    );
    Ok(choices)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
