//! Assets held by the remote media store.

use serde::Serialize;

/// A binary object held by the media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    /// Publicly reachable URL of the asset.
    pub public_url: String,
    /// Identifier used to delete the asset.
    pub storage_id: String,
}

/// Folder receiving re-hosted generation results, below the upload folder.
pub fn generated_folder(folder: &str) -> String {
    let base = folder.trim_end_matches('/');
    if base.is_empty() {
        "generated".to_string()
    } else {
        format!("{base}/generated")
    }
}
