//! Cloudinary implementation of [`MediaStore`].
//!
//! Uploads go through an unsigned upload preset (multipart `file`,
//! `upload_preset`, `folder`). Deletes use the signed `destroy` endpoint,
//! which needs the account's API key and secret.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use selfie_core::asset::StoredAsset;

use crate::store::{DeleteOutcome, MediaError, MediaStore, UploadSource};

/// `result` value returned by `destroy` for a deleted asset.
const DESTROY_OK: &str = "ok";

/// `result` value returned by `destroy` for an unknown public id.
const DESTROY_NOT_FOUND: &str = "not found";

/// Connection settings for one Cloudinary account.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    /// Base API URL, e.g. `https://api.cloudinary.com`.
    pub api_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Unsigned upload preset used for every upload.
    pub upload_preset: String,
}

/// HTTP client for the Cloudinary image API.
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

/// Response body of the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

/// Response body of the destroy endpoint.
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a store reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{action}",
            self.config.api_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, capturing the body
    /// text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MediaError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(MediaError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Check the status, then parse the JSON body. A 2xx body of the wrong
    /// shape is [`MediaError::Unexpected`].
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, MediaError> {
        let text = Self::ensure_success(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| MediaError::Unexpected(format!("{e}: {text}")))
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, source: UploadSource, folder: &str) -> Result<StoredAsset, MediaError> {
        let description = source.describe();
        let file = match source {
            UploadSource::Bytes { data, file_name } => {
                if data.is_empty() {
                    return Err(MediaError::InvalidInput("upload is empty".to_string()));
                }
                Part::bytes(data).file_name(file_name)
            }
            UploadSource::RemoteUrl(url) => Part::text(url),
        };

        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", folder.to_string());

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = Self::decode(response).await?;

        tracing::info!(
            storage_id = %body.public_id,
            folder,
            source = %description,
            "Uploaded asset to Cloudinary",
        );

        Ok(StoredAsset {
            public_url: body.secure_url,
            storage_id: body.public_id,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<DeleteOutcome, MediaError> {
        if storage_id.trim().is_empty() {
            return Err(MediaError::InvalidInput("storage id is empty".to_string()));
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_destroy(storage_id, &timestamp, &self.config.api_secret);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", storage_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;
        let body: DestroyResponse = Self::decode(response).await?;

        match body.result.as_str() {
            DESTROY_OK => {
                tracing::info!(storage_id, "Deleted asset from Cloudinary");
                Ok(DeleteOutcome::Deleted)
            }
            DESTROY_NOT_FOUND => {
                tracing::debug!(storage_id, "Asset already absent from Cloudinary");
                Ok(DeleteOutcome::NotFound)
            }
            other => Err(MediaError::Unexpected(format!("destroy result '{other}'"))),
        }
    }
}

/// Signature for a `destroy` call: hex SHA-256 over the sorted, `&`-joined
/// parameters followed by the API secret.
///
/// The account must be configured for SHA-256 API signatures.
pub fn sign_destroy(public_id: &str, timestamp: &str, api_secret: &str) -> String {
    let to_sign = format!("public_id={public_id}&timestamp={timestamp}{api_secret}");
    format!("{:x}", Sha256::digest(to_sign.as_bytes()))
}
