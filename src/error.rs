use thiserror::Error;

/// Failures from the model API collaborator.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Temporary unavailability or rate limiting; eligible for retry by callers.
    #[error("{message}")] Overloaded {
        status: u16,
        message: String,
    },
    #[error("{message}")] Api {
        status: u16,
        message: String,
    },
    #[error("Request to model API failed: {0}")] Transport(String),
    #[error("Model response did not contain any text")]
    MissingText,
    #[error("Invalid model client configuration: {0}")] Configuration(String),
}

/// Failures surfaced by the relay endpoint as a `{ error }` envelope.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")] Validation(String),
    #[error("{0}")] UpstreamOverloaded(String),
    #[error("{0}")] UpstreamOther(String),
}

impl From<LlmError> for RelayError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Overloaded { .. } => RelayError::UpstreamOverloaded(err.to_string()),
            other => RelayError::UpstreamOther(other.to_string()),
        }
    }
}

/// Failures seen by the pipeline when calling the relay over HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay answered with a non-success status and this message.
    #[error("{message}")] Status {
        status: u16,
        message: String,
    },
    #[error("{0}")] Connection(String),
    #[error("{0}")] Decode(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Status { status: 503, .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("A message is already being sent")]
    Busy,
}
