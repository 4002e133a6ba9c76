//! HTTP client for the CipherKeep server.
//!
//! The client seals every sensitive field before a request body is built
//! and opens every field of a response record by record. The session
//! cookie set on sign-in lives in the client's cookie jar; the envelope
//! lives in the `VaultSession` handed to each call.

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use cipherkeep_common::{Error, RecordId, Result};
use cipherkeep_vault::wire::{
    API_CARDS, API_FILES, API_LOGINS, API_SIGNIN, API_SIGNUP, FORM_FILE, FORM_ID, FORM_METAINFO,
};
use cipherkeep_vault::{
    encode_field, open_all, Card, CardPayload, Credentials, ErrorResponse, FileRecord, Login,
    LoginPayload, SavedResponse, SealedRecord, VaultSession,
};

use crate::config::ClientConfig;

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

/// Map a non-success response onto the error taxonomy.
///
/// 401 is kept apart from every other status so the caller can force a
/// new sign-in instead of offering a retry.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string(),
    };

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT => Error::Conflict(message),
        s if s.is_server_error() => Error::Storage(message),
        _ => Error::Rejected(message),
    })
}

/// Final path component of a decrypted file name.
///
/// Names come from the server and must never steer the download outside
/// the target directory.
fn safe_file_name(name: &str) -> Result<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::InvalidInput(format!("unusable file name: {:?}", name)));
    }
    Ok(base)
}

/// Client for one server.
///
/// Cloning is cheap and clones share the cookie jar, so a clone handed to
/// a poller stays signed in with the original.
#[derive(Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    base: Url,
    cancel: CancellationToken,
}

impl SyncClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if the server URL does not parse
    /// - `Error::Transport` if the HTTP client cannot be built
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.server_url)
            .map_err(|e| Error::InvalidInput(format!("invalid server url: {}", e)))?;

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future calls when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token observed by every call of this client.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("invalid endpoint {}: {}", path, e)))
    }

    fn record_endpoint(&self, collection: &str, id: RecordId) -> Result<Url> {
        self.endpoint(&format!("{}/{}", collection, id))
    }

    /// Run `operation` unless the cancellation token fires first.
    async fn cancellable<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                debug!("Request cancelled");
                Err(Error::Transport("operation cancelled".to_string()))
            }
            result = operation => result,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        self.cancellable(async {
            let response = request.send().await.map_err(transport)?;
            check(response).await
        })
        .await
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.cancellable(async {
            let response = request.send().await.map_err(transport)?;
            check(response)
                .await?
                .json::<T>()
                .await
                .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
        })
        .await
    }

    async fn authenticate(&self, path: &str, credentials: &Credentials) -> Result<VaultSession> {
        credentials.validate()?;

        let request = self.http.post(self.endpoint(path)?).json(credentials);
        self.execute(request).await?;

        info!(username = %credentials.username, "Authenticated");
        VaultSession::unlock(credentials)
    }

    /// Register a new account and open a session for it.
    ///
    /// # Errors
    /// - `Error::Validation` for blank or oversized credentials
    /// - `Error::Conflict` if the username is taken
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<VaultSession> {
        self.authenticate(API_SIGNUP, credentials).await
    }

    /// Sign in to an existing account and open a session for it.
    ///
    /// # Errors
    /// - `Error::Validation` for blank or oversized credentials
    /// - `Error::Unauthorized` for a wrong username/password pair
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<VaultSession> {
        self.authenticate(API_SIGNIN, credentials).await
    }

    async fn save_sealed<P: Serialize>(&self, collection: &str, payload: &P) -> Result<RecordId> {
        let request = self.http.post(self.endpoint(collection)?).json(payload);
        let saved: SavedResponse = self.execute_json(request).await?;
        Ok(saved.id)
    }

    async fn delete_record(&self, collection: &str, id: RecordId) -> Result<()> {
        let request = self.http.delete(self.record_endpoint(collection, id)?);
        self.execute(request).await?;
        debug!(id = %id, collection, "Record deleted");
        Ok(())
    }

    async fn list_sealed<T: SealedRecord>(
        &self,
        session: &VaultSession,
        collection: &str,
    ) -> Result<Vec<Result<T>>>
    where
        T::Payload: DeserializeOwned,
    {
        let envelope = session.envelope()?;
        let request = self.http.get(self.endpoint(collection)?);
        let payloads: Vec<T::Payload> = self.execute_json(request).await?;
        Ok(open_all::<T>(&payloads, &envelope))
    }

    /// Seal and store a login. A new login receives its server id.
    pub async fn save_login(&self, session: &VaultSession, login: &mut Login) -> Result<()> {
        login.validate()?;
        let payload: LoginPayload = login.seal(&*session.envelope()?)?;

        login.id = self.save_sealed(API_LOGINS, &payload).await?;
        debug!(id = %login.id, "Login saved");
        Ok(())
    }

    /// Delete a login.
    pub async fn delete_login(&self, id: RecordId) -> Result<()> {
        self.delete_record(API_LOGINS, id).await
    }

    /// Fetch and open all logins.
    ///
    /// The outer error covers the request; each inner result covers one
    /// record.
    pub async fn list_logins(&self, session: &VaultSession) -> Result<Vec<Result<Login>>> {
        self.list_sealed::<Login>(session, API_LOGINS).await
    }

    /// Seal and store a card. A new card receives its server id.
    pub async fn save_card(&self, session: &VaultSession, card: &mut Card) -> Result<()> {
        card.validate()?;
        let payload: CardPayload = card.seal(&*session.envelope()?)?;

        card.id = self.save_sealed(API_CARDS, &payload).await?;
        debug!(id = %card.id, "Card saved");
        Ok(())
    }

    /// Delete a card.
    pub async fn delete_card(&self, id: RecordId) -> Result<()> {
        self.delete_record(API_CARDS, id).await
    }

    /// Fetch and open all cards.
    pub async fn list_cards(&self, session: &VaultSession) -> Result<Vec<Result<Card>>> {
        self.list_sealed::<Card>(session, API_CARDS).await
    }

    /// Upload a file record.
    ///
    /// With `content`, the local file is sealed and sent as the file part;
    /// an empty record name is taken from the local file name. Without
    /// `content`, only the note is re-sealed and the stored body and name
    /// stay as they are.
    pub async fn save_file(
        &self,
        session: &VaultSession,
        record: &mut FileRecord,
        content: Option<&Path>,
    ) -> Result<()> {
        record.validate()?;
        let envelope = session.envelope()?;

        let mut form = Form::new()
            .text(FORM_ID, record.id.to_string())
            .text(FORM_METAINFO, encode_field(&envelope, &record.note)?);

        if let Some(local) = content {
            if record.name.trim().is_empty() {
                record.name = local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }

            let sealer = envelope.clone();
            let source = local.to_path_buf();
            let ciphertext = tokio::task::spawn_blocking(move || {
                let file = std::fs::File::open(&source)?;
                sealer.seal_stream(BufReader::new(file))
            })
            .await
            .map_err(|e| Error::Crypto(format!("sealing task failed: {}", e)))??;

            debug!(size = ciphertext.len(), "File body sealed");
            let part = Part::bytes(ciphertext).file_name(encode_field(&envelope, &record.name)?);
            form = form.part(FORM_FILE, part);
        }

        let request = self.http.post(self.endpoint(API_FILES)?).multipart(form);
        let saved: SavedResponse = self.execute_json(request).await?;

        record.id = saved.id;
        info!(id = %record.id, "File saved");
        Ok(())
    }

    /// Fetch and open all file records.
    pub async fn list_files(&self, session: &VaultSession) -> Result<Vec<Result<FileRecord>>> {
        self.list_sealed::<FileRecord>(session, API_FILES).await
    }

    /// Download a file, open it, and write it to `dir`.
    ///
    /// # Postconditions
    /// - The plaintext is at `dir/<final component of record.name>`
    ///
    /// # Errors
    /// - `Error::Decode` if the body does not open with this session
    /// - `Error::InvalidInput` if the name has no usable final component
    pub async fn download_file(
        &self,
        session: &VaultSession,
        record: &FileRecord,
        dir: &Path,
    ) -> Result<PathBuf> {
        let envelope = session.envelope()?;
        let target = dir.join(safe_file_name(&record.name)?);

        let request = self.http.get(self.record_endpoint(API_FILES, record.id)?);
        let body = self
            .cancellable(async {
                let response = request.send().await.map_err(transport)?;
                check(response).await?.bytes().await.map_err(transport)
            })
            .await?;

        let mut plaintext = Vec::new();
        envelope
            .open_stream(&body[..], &mut plaintext)
            .map_err(|e| Error::Decode {
                id: record.id,
                reason: e.to_string(),
            })?;

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&target, &plaintext).await?;

        info!(id = %record.id, path = %target.display(), "File downloaded");
        Ok(target)
    }

    /// Delete a file and its stored body.
    pub async fn delete_file(&self, id: RecordId) -> Result<()> {
        self.delete_record(API_FILES, id).await
    }
}
