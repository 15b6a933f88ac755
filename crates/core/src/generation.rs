//! Generation request types and input validation.
//!
//! A [`GenerationRequest`] pairs the public URL of the user's photo with
//! the fixed [`RenderingParameters`] sent to the prediction service.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prompt describing the composited selfie.
pub const DEFAULT_PROMPT: &str = "Merge this image with one realistic image of Elon Musk to create a \
hyper-realistic selfie where Elon Musk is standing next to the person in the image as if they are \
taking a selfie together outdoors. Make sure it looks like both are looking at the camera naturally \
with clear faces, good lighting, and no extra people.";

/// Negative prompt listing artifacts the model should avoid.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "multiple elon musk, duplicate faces, multiple people, \
distorted face, low quality, blurry, crowd, unrealistic background, AI artifacts, weird hand, \
double person, incorrect shadows, strange eyes, photo mismatch, cartoon style";

/// Identity-preservation strength for the face adapter.
pub const DEFAULT_IDENTITY_STRENGTH: f64 = 1.0;

/// Classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 9.0;

/// Number of denoising steps.
pub const DEFAULT_INFERENCE_STEPS: u32 = 35;

/// Maximum accepted length of a source image URL.
const MAX_URL_LEN: usize = 2048;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fixed model knobs sent with every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderingParameters {
    pub prompt: String,
    pub negative_prompt: String,
    pub identity_strength: f64,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
}

impl Default for RenderingParameters {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            identity_strength: DEFAULT_IDENTITY_STRENGTH,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
        }
    }
}

/// A request to render a selfie from an already-hosted source image.
///
/// Fields are private so a request can only be built through
/// [`GenerationRequest::new`], which validates the URL, and cannot be
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    source_image_url: String,
    parameters: RenderingParameters,
}

impl GenerationRequest {
    /// Build a request, rejecting URLs that are not absolute `http(s)` URLs.
    pub fn new(
        source_image_url: impl Into<String>,
        parameters: RenderingParameters,
    ) -> Result<Self, CoreError> {
        let source_image_url = source_image_url.into().trim().to_string();
        validate_image_url(&source_image_url)?;
        Ok(Self {
            source_image_url,
            parameters,
        })
    }

    pub fn source_image_url(&self) -> &str {
        &self.source_image_url
    }

    pub fn parameters(&self) -> &RenderingParameters {
        &self.parameters
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that an image URL is non-empty, bounded, and starts with `http`.
pub fn validate_image_url(url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Image URL must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_URL_LEN {
        return Err(CoreError::Validation(format!(
            "Image URL exceeds {MAX_URL_LEN} characters"
        )));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "Image URL must start with http:// or https://, got: '{trimmed}'"
        )));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "Image URL must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

/// Validate a media store identifier supplied by a client.
pub fn validate_storage_id(id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("publicId required".to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
