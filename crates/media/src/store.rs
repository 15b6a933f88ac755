//! Storage-agnostic media store interface.

use async_trait::async_trait;
use selfie_core::asset::StoredAsset;

/// Content handed to [`MediaStore::upload`].
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Raw file bytes supplied by the caller.
    Bytes { data: Vec<u8>, file_name: String },
    /// A remote file the store fetches itself.
    RemoteUrl(String),
}

impl UploadSource {
    /// Short description for log fields (never the file contents).
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes { data, file_name } => format!("{file_name} ({} bytes)", data.len()),
            Self::RemoteUrl(url) => url.clone(),
        }
    }
}

/// Result of a delete call that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The id was unknown; treat as already cleaned up.
    NotFound,
}

/// Errors from the media store layer.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store returned a non-2xx status code.
    #[error("Media store error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The caller passed something the store cannot act on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected media store response: {0}")]
    Unexpected(String),
}

/// Upload and delete primitives of a remote media store.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `source` under `folder`, returning its public URL and id.
    async fn upload(&self, source: UploadSource, folder: &str) -> Result<StoredAsset, MediaError>;

    /// Delete an asset by storage id.
    ///
    /// Deleting an id that does not exist yields
    /// `Ok(DeleteOutcome::NotFound)`, never an error.
    async fn delete(&self, storage_id: &str) -> Result<DeleteOutcome, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_never_includes_bytes() {
        let src = UploadSource::Bytes {
            data: vec![0xff; 12],
            file_name: "me.jpg".into(),
        };
        assert_eq!(src.describe(), "me.jpg (12 bytes)");
    }

    #[test]
    fn api_error_display() {
        let err = MediaError::ApiError {
            status: 401,
            body: "bad preset".into(),
        };
        assert_eq!(err.to_string(), "Media store error (401): bad preset");
    }
}
