use emr_types::TypeError;

/// Failure classes exposed to transports.
///
/// Structurally invalid payloads share the upstream class with transport failures; the two
/// are only distinguished in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The caller must supply different input.
    ClientError,
    /// The service is missing credentials or configuration.
    Misconfigured,
    /// The extraction collaborator failed or returned something unusable.
    Upstream,
}

#[derive(Debug, thiserror::Error)]
pub enum EmrError {
    #[error("conversation is required")]
    InputMissing,
    #[error("missing extraction service credentials")]
    MissingCredentials,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("extraction service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("extraction response malformed: {reason}")]
    UpstreamMalformed {
        reason: String,
        /// Raw model output. Logged for diagnosis, never returned to end users.
        raw: String,
    },
    #[error("extraction payload shape invalid at {path}: {reason}")]
    ShapeInvalid {
        path: String,
        reason: String,
        /// Offending object. Logged for diagnosis, never returned to end users.
        payload: serde_json::Value,
    },
    #[error("invalid value: {0}")]
    InvalidValue(#[from] TypeError),
}

impl EmrError {
    pub fn class(&self) -> FailureClass {
        match self {
            EmrError::InputMissing | EmrError::InvalidValue(_) => FailureClass::ClientError,
            EmrError::MissingCredentials | EmrError::InvalidConfig(_) => {
                FailureClass::Misconfigured
            }
            EmrError::UpstreamUnavailable(_)
            | EmrError::UpstreamMalformed { .. }
            | EmrError::ShapeInvalid { .. } => FailureClass::Upstream,
        }
    }

    /// Message that is safe to show to an end user.
    ///
    /// Upstream failures collapse to one opaque sentence so model output never leaks.
    pub fn public_message(&self) -> &'static str {
        match self {
            EmrError::InputMissing => "conversation is required",
            EmrError::InvalidValue(_) => "invalid request",
            EmrError::MissingCredentials => "extraction service is not configured",
            EmrError::InvalidConfig(_) => "service configuration error",
            EmrError::UpstreamUnavailable(_)
            | EmrError::UpstreamMalformed { .. }
            | EmrError::ShapeInvalid { .. } => "draft generation failed, please retry",
        }
    }
}

pub type EmrResult<T> = std::result::Result<T, EmrError>;
