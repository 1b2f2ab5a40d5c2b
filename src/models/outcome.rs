use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
}

impl ImageEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }
}

/// Result of one submission. Exactly one variant is ever produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success {
        image_bytes: Vec<u8>,
        encoding: ImageEncoding,
    },
    Failure {
        error_message: String,
        status_code: u16,
    },
}

impl GenerationOutcome {
    pub fn success(image_bytes: Vec<u8>) -> Self {
        GenerationOutcome::Success {
            image_bytes,
            encoding: ImageEncoding::Jpeg,
        }
    }

    pub fn failure(error_message: impl Into<String>, status_code: u16) -> Self {
        GenerationOutcome::Failure {
            error_message: error_message.into(),
            status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success { .. })
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GenerationOutcome::Success { .. } => 200,
            GenerationOutcome::Failure { status_code, .. } => *status_code,
        }
    }

    /// Renders the outcome as the record the page consumes.
    pub fn to_response(&self) -> GenerationResponse {
        match self {
            GenerationOutcome::Success { image_bytes, .. } => GenerationResponse {
                image: Some(STANDARD.encode(image_bytes)),
                error: None,
            },
            GenerationOutcome::Failure { error_message, .. } => GenerationResponse {
                image: None,
                error: Some(error_message.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
