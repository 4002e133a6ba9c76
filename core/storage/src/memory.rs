//! In-memory record store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use cipherkeep_common::{Error, RecordId, Result, UserId};
use cipherkeep_vault::{CardPayload, LoginPayload};

use crate::records::{RecordStore, StoredFile, StoredUser, USERNAME_TAKEN};

/// Rows of one record kind, keyed by id.
type Table<T> = BTreeMap<i64, (UserId, T)>;

#[derive(Default)]
struct Tables {
    next_user: i64,
    next_record: i64,
    users: HashMap<String, StoredUser>,
    logins: Table<LoginPayload>,
    cards: Table<CardPayload>,
    files: Table<StoredFile>,
}

/// Save `row` into `table`, assigning an id when it is new.
///
/// Ids are drawn from one counter shared by every record kind.
fn upsert<T>(
    table: &mut Table<T>,
    next_record: &mut i64,
    owner: UserId,
    id: RecordId,
    row: impl FnOnce(RecordId) -> T,
) -> Result<RecordId> {
    if id.is_new() {
        *next_record += 1;
        let id = RecordId::new(*next_record);
        table.insert(id.get(), (owner, row(id)));
        return Ok(id);
    }

    match table.get_mut(&id.get()) {
        Some(entry) if entry.0 == owner => {
            entry.1 = row(id);
            Ok(id)
        }
        _ => Err(Error::NotFound(format!("record {} not found", id))),
    }
}

fn remove<T>(table: &mut Table<T>, owner: UserId, id: RecordId) {
    if matches!(table.get(&id.get()), Some((o, _)) if *o == owner) {
        table.remove(&id.get());
    }
}

/// Rows of `owner`, newest first.
fn owned<T: Clone>(table: &Table<T>, owner: UserId) -> Vec<T> {
    table
        .values()
        .rev()
        .filter(|(o, _)| *o == owner)
        .map(|(_, row)| row.clone())
        .collect()
}

/// In-memory record store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(username) {
            return Err(Error::Conflict(USERNAME_TAKEN.to_string()));
        }

        tables.next_user += 1;
        let id = UserId::new(tables.next_user);
        tables.users.insert(
            username.to_string(),
            StoredUser {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(id)
    }

    async fn find_user(&self, username: &str) -> Result<Option<StoredUser>> {
        Ok(self.tables.read().await.users.get(username).cloned())
    }

    async fn save_login(&self, owner: UserId, login: &LoginPayload) -> Result<RecordId> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        upsert(&mut tables.logins, &mut tables.next_record, owner, login.id, |id| {
            LoginPayload { id, ..login.clone() }
        })
    }

    async fn delete_login(&self, owner: UserId, id: RecordId) -> Result<()> {
        remove(&mut self.tables.write().await.logins, owner, id);
        Ok(())
    }

    async fn find_logins(&self, owner: UserId) -> Result<Vec<LoginPayload>> {
        Ok(owned(&self.tables.read().await.logins, owner))
    }

    async fn save_card(&self, owner: UserId, card: &CardPayload) -> Result<RecordId> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        upsert(&mut tables.cards, &mut tables.next_record, owner, card.id, |id| {
            CardPayload { id, ..card.clone() }
        })
    }

    async fn delete_card(&self, owner: UserId, id: RecordId) -> Result<()> {
        remove(&mut self.tables.write().await.cards, owner, id);
        Ok(())
    }

    async fn find_cards(&self, owner: UserId) -> Result<Vec<CardPayload>> {
        Ok(owned(&self.tables.read().await.cards, owner))
    }

    async fn replace_file(
        &self,
        owner: UserId,
        file: &StoredFile,
    ) -> Result<(RecordId, Option<String>)> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let previous = if file.id.is_new() {
            None
        } else {
            tables
                .files
                .get(&file.id.get())
                .filter(|(o, _)| *o == owner)
                .map(|(_, stored)| stored.path.clone())
        };

        let id = upsert(&mut tables.files, &mut tables.next_record, owner, file.id, |id| {
            StoredFile { id, ..file.clone() }
        })?;
        Ok((id, previous))
    }

    async fn update_file_note(&self, owner: UserId, id: RecordId, metainfo: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.files.get_mut(&id.get()) {
            Some((o, stored)) if *o == owner => {
                stored.metainfo = metainfo.to_string();
                Ok(())
            }
            _ => Err(Error::NotFound(format!("record {} not found", id))),
        }
    }

    async fn find_file(&self, owner: UserId, id: RecordId) -> Result<Option<StoredFile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .get(&id.get())
            .filter(|(o, _)| *o == owner)
            .map(|(_, file)| file.clone()))
    }

    async fn delete_file(&self, owner: UserId, id: RecordId) -> Result<()> {
        remove(&mut self.tables.write().await.files, owner, id);
        Ok(())
    }

    async fn find_files(&self, owner: UserId) -> Result<Vec<StoredFile>> {
        Ok(owned(&self.tables.read().await.files, owner))
    }
}
