//! Record store trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cipherkeep_common::validation::is_blank;
use cipherkeep_common::{RecordId, Result, UserId, ValidationError};
use cipherkeep_vault::{CardPayload, FileEntry, LoginPayload};

use crate::blob::BlobPath;

/// Message reported when a sign-up collides with an existing account.
pub const USERNAME_TAKEN: &str = "username is already taken";

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub id: UserId,
    pub username: String,
    /// PHC string produced by the password hasher.
    pub password_hash: String,
}

/// Metadata row of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: RecordId,
    /// Location of the ciphertext in the blob store.
    pub path: String,
    /// Sealed file name.
    pub name: String,
    /// Sealed note.
    pub metainfo: String,
}

impl StoredFile {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if is_blank(&self.path) {
            return Err(ValidationError::FilePathEmpty);
        }
        if is_blank(&self.name) {
            return Err(ValidationError::FileNameEmpty);
        }
        if is_blank(&self.metainfo) {
            return Err(ValidationError::MetainfoEmpty);
        }
        Ok(())
    }

    /// Parsed blob location, if the row carries one.
    pub fn blob_path(&self) -> Result<Option<BlobPath>> {
        if is_blank(&self.path) {
            return Ok(None);
        }
        BlobPath::parse(&self.path).map(Some)
    }

    /// The listing form, without the storage path.
    pub fn to_entry(&self) -> FileEntry {
        FileEntry {
            id: self.id,
            name: self.name.clone(),
            metainfo: self.metainfo.clone(),
        }
    }
}

/// Persistence backend for accounts and their records.
///
/// Every record operation is scoped to an owner. A record belonging to
/// another owner is indistinguishable from a missing one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the store name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Register a new account.
    ///
    /// # Errors
    /// - `Error::Conflict` if the username is already taken
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId>;

    /// Look up an account by username.
    async fn find_user(&self, username: &str) -> Result<Option<StoredUser>>;

    /// Insert (id 0) or update a login.
    ///
    /// # Postconditions
    /// - Returns the id of the stored row
    ///
    /// # Errors
    /// - `Error::NotFound` when updating an id the owner does not have
    async fn save_login(&self, owner: UserId, login: &LoginPayload) -> Result<RecordId>;

    /// Delete a login. Deleting a missing login succeeds.
    async fn delete_login(&self, owner: UserId, id: RecordId) -> Result<()>;

    /// All logins of `owner`, newest first.
    async fn find_logins(&self, owner: UserId) -> Result<Vec<LoginPayload>>;

    /// Insert (id 0) or update a card.
    async fn save_card(&self, owner: UserId, card: &CardPayload) -> Result<RecordId>;

    /// Delete a card. Deleting a missing card succeeds.
    async fn delete_card(&self, owner: UserId, id: RecordId) -> Result<()>;

    /// All cards of `owner`, newest first.
    async fn find_cards(&self, owner: UserId) -> Result<Vec<CardPayload>>;

    /// Insert (id 0) or update a file row together with its blob path.
    ///
    /// The swap is atomic: two concurrent replacements of one row each get
    /// back a distinct previous path, so every displaced blob is reported
    /// exactly once.
    ///
    /// # Postconditions
    /// - Returns the row id and the path the row held before, `None` for
    ///   an insert
    ///
    /// # Errors
    /// - `Error::NotFound` when updating an id the owner does not have
    async fn replace_file(
        &self,
        owner: UserId,
        file: &StoredFile,
    ) -> Result<(RecordId, Option<String>)>;

    /// Change only the sealed note of a file row, keeping its blob.
    ///
    /// # Errors
    /// - `Error::NotFound` when the owner has no such row
    async fn update_file_note(&self, owner: UserId, id: RecordId, metainfo: &str) -> Result<()>;

    /// Look up a single file row.
    async fn find_file(&self, owner: UserId, id: RecordId) -> Result<Option<StoredFile>>;

    /// Delete a file row. Deleting a missing row succeeds.
    async fn delete_file(&self, owner: UserId, id: RecordId) -> Result<()>;

    /// All file rows of `owner`, newest first.
    async fn find_files(&self, owner: UserId) -> Result<Vec<StoredFile>>;
}
