//! `/files/<name>` handlers.

use crate::http::response::{Response, StatusCode};
use crate::storage::{FileStore, StorageError};

const CREATED_MESSAGE: &str = "File created";

/// GET: the file's raw bytes as `application/octet-stream`.
pub async fn fetch(store: &FileStore, name: &str) -> Response {
    match store.read(name).await {
        Ok(contents) => {
            tracing::debug!(file = name, bytes = contents.len(), "serving file");
            Response::binary(contents)
        }
        Err(e) => failure(name, e),
    }
}

/// POST: stores `body` under `name`, replacing any existing file.
pub async fn create(store: &FileStore, name: &str, body: &[u8]) -> Response {
    match store.write(name, body).await {
        Ok(written) => {
            tracing::debug!(file = name, bytes = written, "file stored");
            Response::text(StatusCode::Created, CREATED_MESSAGE)
        }
        Err(e) => failure(name, e),
    }
}

fn failure(name: &str, err: StorageError) -> Response {
    match err {
        StorageError::InvalidPath(_) => {
            tracing::warn!(file = name, "rejected file path");
            Response::empty(StatusCode::BadRequest)
        }
        StorageError::NotFound(_) => Response::not_found(),
        StorageError::Io { .. } => {
            tracing::warn!(file = name, error = %err, "storage failure");
            Response::internal_error()
        }
    }
}
