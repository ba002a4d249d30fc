use std::fmt;

use thiserror::Error;

use crate::event::HandlerErrorCode;

/// The underlying failure reported by the remote API.
///
/// `code` is the service error code (e.g. `KMSInvalidStateException`) when
/// the remote side returned one; transport failures carry only a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ApiFailure {}

/// Local error taxonomy. Every remote failure is translated into exactly one
/// variant, which keeps the operation that failed and the original cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KmsError {
    #[error("{operation}: resource not found ({cause})")]
    NotFound {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: resource already exists ({cause})")]
    AlreadyExists {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: invalid request ({cause})")]
    InvalidRequest {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: service limit exceeded ({cause})")]
    ServiceLimitExceeded {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    /// Unreachable under correct operation (e.g. a pagination marker the
    /// provider produced itself was rejected).
    #[error("{operation}: internal failure ({cause})")]
    InternalFailure {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: service internal error ({cause})")]
    ServiceInternalError {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: access denied ({cause})")]
    AccessDenied {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: throttled ({cause})")]
    Throttling {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: service error ({cause})")]
    GeneralServiceError {
        operation: String,
        #[source]
        cause: ApiFailure,
    },

    #[error("{operation}: resource did not stabilize ({cause})")]
    NotStabilized {
        operation: String,
        #[source]
        cause: ApiFailure,
    },
}

impl KmsError {
    /// Build the variant that corresponds to a handler error code.
    pub fn from_code(
        code: HandlerErrorCode,
        operation: impl Into<String>,
        cause: ApiFailure,
    ) -> Self {
        let operation = operation.into();
        match code {
            HandlerErrorCode::NotFound => Self::NotFound { operation, cause },
            HandlerErrorCode::AlreadyExists => Self::AlreadyExists { operation, cause },
            HandlerErrorCode::InvalidRequest => Self::InvalidRequest { operation, cause },
            HandlerErrorCode::ServiceLimitExceeded => {
                Self::ServiceLimitExceeded { operation, cause }
            }
            HandlerErrorCode::InternalFailure => Self::InternalFailure { operation, cause },
            HandlerErrorCode::ServiceInternalError => {
                Self::ServiceInternalError { operation, cause }
            }
            HandlerErrorCode::AccessDenied => Self::AccessDenied { operation, cause },
            HandlerErrorCode::Throttling => Self::Throttling { operation, cause },
            HandlerErrorCode::GeneralServiceException => {
                Self::GeneralServiceError { operation, cause }
            }
            HandlerErrorCode::NotStabilized => Self::NotStabilized { operation, cause },
        }
    }

    pub fn not_found(operation: impl Into<String>, cause: ApiFailure) -> Self {
        Self::from_code(HandlerErrorCode::NotFound, operation, cause)
    }

    pub fn invalid_request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_code(
            HandlerErrorCode::InvalidRequest,
            operation,
            ApiFailure::message(message),
        )
    }

    pub fn code(&self) -> HandlerErrorCode {
        match self {
            Self::NotFound { .. } => HandlerErrorCode::NotFound,
            Self::AlreadyExists { .. } => HandlerErrorCode::AlreadyExists,
            Self::InvalidRequest { .. } => HandlerErrorCode::InvalidRequest,
            Self::ServiceLimitExceeded { .. } => HandlerErrorCode::ServiceLimitExceeded,
            Self::InternalFailure { .. } => HandlerErrorCode::InternalFailure,
            Self::ServiceInternalError { .. } => HandlerErrorCode::ServiceInternalError,
            Self::AccessDenied { .. } => HandlerErrorCode::AccessDenied,
            Self::Throttling { .. } => HandlerErrorCode::Throttling,
            Self::GeneralServiceError { .. } => HandlerErrorCode::GeneralServiceException,
            Self::NotStabilized { .. } => HandlerErrorCode::NotStabilized,
        }
    }

    pub fn operation(&self) -> &str {
        let (operation, _) = self.parts();
        operation
    }

    pub fn cause(&self) -> &ApiFailure {
        let (_, cause) = self.parts();
        cause
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    fn parts(&self) -> (&str, &ApiFailure) {
        match self {
            Self::NotFound { operation, cause }
            | Self::AlreadyExists { operation, cause }
            | Self::InvalidRequest { operation, cause }
            | Self::ServiceLimitExceeded { operation, cause }
            | Self::InternalFailure { operation, cause }
            | Self::ServiceInternalError { operation, cause }
            | Self::AccessDenied { operation, cause }
            | Self::Throttling { operation, cause }
            | Self::GeneralServiceError { operation, cause }
            | Self::NotStabilized { operation, cause } => (operation, cause),
        }
    }
}
