//! File records and their stored bodies.

use axum::body::Body;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use cipherkeep_common::{Error, RecordId, UserId, ValidationError};
use cipherkeep_storage::{BlobPath, StoredFile};
use cipherkeep_vault::wire::{FORM_FILE, FORM_ID, FORM_METAINFO};
use cipherkeep_vault::{FileEntry, SavedResponse};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

const FILE_NOT_EXIST: &str = "file not exist";

/// Fields of an upload form.
#[derive(Default)]
struct Upload {
    id: Option<String>,
    metainfo: String,
    file: Option<(String, Vec<u8>)>,
}

fn form_error(e: MultipartError) -> ApiError {
    ApiError::NotAcceptable(e.body_text())
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FORM_ID) => upload.id = Some(field.text().await.map_err(form_error)?),
            Some(FORM_METAINFO) => upload.metainfo = field.text().await.map_err(form_error)?,
            Some(FORM_FILE) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(form_error)?;
                upload.file = Some((name, data.to_vec()));
            }
            other => debug!(field = ?other, "Ignoring unknown form field"),
        }
    }

    Ok(upload)
}

async fn find_owned(state: &AppState, owner: UserId, id: RecordId) -> Result<StoredFile, ApiError> {
    state
        .store
        .find_file(owner, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(FILE_NOT_EXIST.to_string()))
}

/// Drop a blob whose row was never written. Failures only leave garbage.
async fn discard(state: &AppState, path: &BlobPath) {
    if let Err(e) = state.blobs.delete(path).await {
        warn!(path = %path, error = %e, "Could not discard blob");
    }
}

/// Create or update a file record.
///
/// A file part replaces the stored body and name; without one only the
/// note changes. The new body is written before the row is swapped, and
/// the body the swap displaced is removed afterwards, so a failed save
/// never loses the previous content and concurrent replacements leave
/// exactly one body behind.
pub async fn save_file(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SavedResponse>, ApiError> {
    let multipart = multipart.map_err(|rejection| ApiError::NotAcceptable(rejection.body_text()))?;
    let upload = read_upload(multipart).await?;

    let id = match upload.id.as_deref().map(str::trim) {
        None | Some("") => RecordId::NEW,
        Some(raw) => parse_id(raw)?,
    };

    let Some((name, data)) = upload.file else {
        return update_note(&state, owner, id, upload.metainfo).await;
    };

    let fresh = state.blobs.store(&data).await?;
    let file = StoredFile {
        id,
        path: fresh.to_string(),
        name,
        metainfo: upload.metainfo,
    };

    if let Err(e) = file.validate() {
        discard(&state, &fresh).await;
        return Err(e.into());
    }

    let (id, previous) = match state.store.replace_file(owner, &file).await {
        Ok(saved) => saved,
        Err(e) => {
            discard(&state, &fresh).await;
            return Err(match e {
                Error::NotFound(_) => ApiError::NotFound(FILE_NOT_EXIST.to_string()),
                other => other.into(),
            });
        }
    };

    if let Some(old) = previous.filter(|old| *old != file.path) {
        match BlobPath::parse(&old) {
            Ok(old) => discard(&state, &old).await,
            Err(e) => warn!(path = %old, error = %e, "Replaced row held an unusable path"),
        }
    }

    info!(owner = %owner, id = %id, size = data.len(), "File stored");
    Ok(Json(SavedResponse { id }))
}

/// Save a note-only change, keeping the stored body and name.
async fn update_note(
    state: &AppState,
    owner: UserId,
    id: RecordId,
    metainfo: String,
) -> Result<Json<SavedResponse>, ApiError> {
    if id.is_new() {
        return Err(ValidationError::FilePathEmpty.into());
    }

    let mut file = find_owned(state, owner, id).await?;
    file.metainfo = metainfo;
    file.validate()?;

    state.store.update_file_note(owner, id, &file.metainfo).await?;
    debug!(owner = %owner, id = %id, "File note updated");
    Ok(Json(SavedResponse { id }))
}

pub async fn list_files(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let files = state.store.find_files(owner).await?;
    Ok(Json(files.iter().map(StoredFile::to_entry).collect()))
}

/// Stream the stored ciphertext of a file.
pub async fn download_file(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let file = find_owned(&state, owner, id).await?;
    let path = file
        .blob_path()?
        .ok_or_else(|| ApiError::NotFound(FILE_NOT_EXIST.to_string()))?;

    let blob = state.blobs.get(&path).await?;
    debug!(owner = %owner, id = %id, "Streaming file");

    Ok((
        [(CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(blob)),
    ))
}

/// Delete a file body and then its row. Missing files are not an error.
pub async fn delete_file(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<(), ApiError> {
    let id = parse_id(&raw_id)?;

    let Some(file) = state.store.find_file(owner, id).await? else {
        return Ok(());
    };
    if let Some(path) = file.blob_path()? {
        state.blobs.delete(&path).await?;
    }
    state.store.delete_file(owner, id).await?;

    info!(owner = %owner, id = %id, "File deleted");
    Ok(())
}
