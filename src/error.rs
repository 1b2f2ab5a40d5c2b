use thiserror::Error;

/// Crate-level failures that happen outside a single generation request:
/// configuration, client construction, server startup.
#[derive(Debug, Error)]
pub enum FluxgenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Client error: {0}")]
    ClientError(String),
    #[error("Server error: {0}")]
    ServerError(String),
}

/// Rejections produced while turning raw form fields into a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Prompt is missing")]
    MissingPrompt,
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("Invalid step count: {0}")]
    InvalidNumSteps(String),
}

impl ValidationError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Failures reported by an image backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with a recognizable error body.
    #[error("{message}")]
    Service { message: String, status: Option<u16> },
    /// Anything else: transport failures, undecodable bodies.
    #[error("Unknown backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    pub fn service(message: impl Into<String>, status: u16) -> Self {
        BackendError::Service {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        BackendError::Unknown(detail.into())
    }
}

/// Transport errors carry the request URL, so they never become a `Service` message.
impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Unknown(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FluxgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert_eq!(ValidationError::MissingPrompt.status_code(), 400);
        assert_eq!(
            ValidationError::InvalidModel("nope".into()).status_code(),
            400
        );
        assert_eq!(
            ValidationError::InvalidModel("nope".into()).to_string(),
            "Invalid model: nope"
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::service("quota exceeded", 429);
        assert_eq!(err.to_string(), "quota exceeded");

        let err = BackendError::unknown("socket closed");
        assert_eq!(err.to_string(), "Unknown backend error: socket closed");
    }

    #[tokio::test]
    async fn test_reqwest_errors_with_status_stay_unknown() {
        use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = reqwest::get(format!("{}/accounts/secret-account/ai", server.uri()))
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err();
        assert!(err.status().is_some());

        assert!(matches!(BackendError::from(err), BackendError::Unknown(_)));
    }
}
