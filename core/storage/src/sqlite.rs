//! SQLite-backed record store.
//!
//! Rusqlite is synchronous, so every statement runs on the blocking pool
//! behind a single shared connection.

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use cipherkeep_common::{Error, RecordId, Result, UserId};
use cipherkeep_vault::{CardPayload, LoginPayload};

use crate::records::{RecordStore, StoredFile, StoredUser, USERNAME_TAKEN};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS logins (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner INTEGER NOT NULL REFERENCES users(id),
        username TEXT NOT NULL,
        password TEXT NOT NULL,
        metainfo TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner INTEGER NOT NULL REFERENCES users(id),
        bank TEXT NOT NULL,
        number TEXT NOT NULL,
        date TEXT NOT NULL,
        cvv TEXT NOT NULL,
        metainfo TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner INTEGER NOT NULL REFERENCES users(id),
        path TEXT NOT NULL,
        name TEXT NOT NULL,
        metainfo TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_logins_owner ON logins(owner);
    CREATE INDEX IF NOT EXISTS idx_cards_owner ON cards(owner);
    CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner);
"#;

fn db_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

/// Turn the affected-row count of an UPDATE into the saved id.
fn updated(rows: usize, id: RecordId) -> Result<RecordId> {
    if rows == 0 {
        return Err(Error::NotFound(format!("record {} not found", id)));
    }
    Ok(id)
}

/// Record store persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Create or open a database.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        info!(path = %db_path.as_ref().display(), "Record database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Storage("database connection poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Storage(format!("database task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();

        self.run(move |conn| {
            match conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                params![username, password_hash],
            ) {
                Ok(_) => {
                    debug!(username = %username, "User created");
                    Ok(UserId::new(conn.last_insert_rowid()))
                }
                Err(e) if is_unique_violation(&e) => {
                    Err(Error::Conflict(USERNAME_TAKEN.to_string()))
                }
                Err(e) => Err(db_err(e)),
            }
        })
        .await
    }

    async fn find_user(&self, username: &str) -> Result<Option<StoredUser>> {
        let username = username.to_string();

        self.run(move |conn| {
            conn.query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                [&username],
                |row| {
                    Ok(StoredUser {
                        id: UserId::new(row.get(0)?),
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }

    async fn save_login(&self, owner: UserId, login: &LoginPayload) -> Result<RecordId> {
        let login = login.clone();

        self.run(move |conn| {
            if login.id.is_new() {
                conn.execute(
                    "INSERT INTO logins (owner, username, password, metainfo)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![owner.get(), login.username, login.password, login.metainfo],
                )
                .map_err(db_err)?;
                return Ok(RecordId::new(conn.last_insert_rowid()));
            }

            let rows = conn
                .execute(
                    "UPDATE logins SET username = ?1, password = ?2, metainfo = ?3
                     WHERE id = ?4 AND owner = ?5",
                    params![
                        login.username,
                        login.password,
                        login.metainfo,
                        login.id.get(),
                        owner.get()
                    ],
                )
                .map_err(db_err)?;
            updated(rows, login.id)
        })
        .await
    }

    async fn delete_login(&self, owner: UserId, id: RecordId) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM logins WHERE id = ?1 AND owner = ?2",
                params![id.get(), owner.get()],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn find_logins(&self, owner: UserId) -> Result<Vec<LoginPayload>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, username, password, metainfo FROM logins
                     WHERE owner = ?1 ORDER BY id DESC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map([owner.get()], |row| {
                    Ok(LoginPayload {
                        id: RecordId::new(row.get(0)?),
                        username: row.get(1)?,
                        password: row.get(2)?,
                        metainfo: row.get(3)?,
                    })
                })
                .map_err(db_err)?;

            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
        })
        .await
    }

    async fn save_card(&self, owner: UserId, card: &CardPayload) -> Result<RecordId> {
        let card = card.clone();

        self.run(move |conn| {
            if card.id.is_new() {
                conn.execute(
                    "INSERT INTO cards (owner, bank, number, date, cvv, metainfo)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        owner.get(),
                        card.bank,
                        card.number,
                        card.date,
                        card.cvv,
                        card.metainfo
                    ],
                )
                .map_err(db_err)?;
                return Ok(RecordId::new(conn.last_insert_rowid()));
            }

            let rows = conn
                .execute(
                    "UPDATE cards SET bank = ?1, number = ?2, date = ?3, cvv = ?4, metainfo = ?5
                     WHERE id = ?6 AND owner = ?7",
                    params![
                        card.bank,
                        card.number,
                        card.date,
                        card.cvv,
                        card.metainfo,
                        card.id.get(),
                        owner.get()
                    ],
                )
                .map_err(db_err)?;
            updated(rows, card.id)
        })
        .await
    }

    async fn delete_card(&self, owner: UserId, id: RecordId) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM cards WHERE id = ?1 AND owner = ?2",
                params![id.get(), owner.get()],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn find_cards(&self, owner: UserId) -> Result<Vec<CardPayload>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, bank, number, date, cvv, metainfo FROM cards
                     WHERE owner = ?1 ORDER BY id DESC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map([owner.get()], |row| {
                    Ok(CardPayload {
                        id: RecordId::new(row.get(0)?),
                        bank: row.get(1)?,
                        number: row.get(2)?,
                        date: row.get(3)?,
                        cvv: row.get(4)?,
                        metainfo: row.get(5)?,
                    })
                })
                .map_err(db_err)?;

            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
        })
        .await
    }

    async fn replace_file(
        &self,
        owner: UserId,
        file: &StoredFile,
    ) -> Result<(RecordId, Option<String>)> {
        let file = file.clone();

        self.run(move |conn| {
            if file.id.is_new() {
                conn.execute(
                    "INSERT INTO files (owner, path, name, metainfo) VALUES (?1, ?2, ?3, ?4)",
                    params![owner.get(), file.path, file.name, file.metainfo],
                )
                .map_err(db_err)?;
                return Ok((RecordId::new(conn.last_insert_rowid()), None));
            }

            let tx = conn.unchecked_transaction().map_err(db_err)?;
            let previous: Option<String> = tx
                .query_row(
                    "SELECT path FROM files WHERE id = ?1 AND owner = ?2",
                    params![file.id.get(), owner.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            let Some(previous) = previous else {
                return Err(Error::NotFound(format!("record {} not found", file.id)));
            };

            tx.execute(
                "UPDATE files SET path = ?1, name = ?2, metainfo = ?3
                 WHERE id = ?4 AND owner = ?5",
                params![file.path, file.name, file.metainfo, file.id.get(), owner.get()],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)?;

            Ok((file.id, Some(previous)))
        })
        .await
    }

    async fn update_file_note(&self, owner: UserId, id: RecordId, metainfo: &str) -> Result<()> {
        let metainfo = metainfo.to_string();

        self.run(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE files SET metainfo = ?1 WHERE id = ?2 AND owner = ?3",
                    params![metainfo, id.get(), owner.get()],
                )
                .map_err(db_err)?;
            updated(rows, id).map(|_| ())
        })
        .await
    }

    async fn find_file(&self, owner: UserId, id: RecordId) -> Result<Option<StoredFile>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, path, name, metainfo FROM files WHERE id = ?1 AND owner = ?2",
                params![id.get(), owner.get()],
                |row| {
                    Ok(StoredFile {
                        id: RecordId::new(row.get(0)?),
                        path: row.get(1)?,
                        name: row.get(2)?,
                        metainfo: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }

    async fn delete_file(&self, owner: UserId, id: RecordId) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM files WHERE id = ?1 AND owner = ?2",
                params![id.get(), owner.get()],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn find_files(&self, owner: UserId) -> Result<Vec<StoredFile>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, path, name, metainfo FROM files
                     WHERE owner = ?1 ORDER BY id DESC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map([owner.get()], |row| {
                    Ok(StoredFile {
                        id: RecordId::new(row.get(0)?),
                        path: row.get(1)?,
                        name: row.get(2)?,
                        metainfo: row.get(3)?,
                    })
                })
                .map_err(db_err)?;

            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
        })
        .await
    }
}
