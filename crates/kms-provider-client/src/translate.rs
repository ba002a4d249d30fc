//! Remote failure → local taxonomy.
//!
//! The mapping is keyed on the service error code, so it covers every KMS
//! operation the orchestrator calls. Transport-level failures (timeouts,
//! dispatch errors) carry no code and land in `GeneralServiceException`.

use aws_sdk_kms::error::{ProvideErrorMetadata, SdkError};
use kms_provider_core::{ApiFailure, HandlerErrorCode, KmsError};

pub const ACCESS_DENIED_ERROR_CODE: &str = "AccessDeniedException";
pub const VALIDATION_ERROR_CODE: &str = "ValidationException";
pub const THROTTLING_ERROR_CODE: &str = "ThrottlingException";
pub const INVALID_STATE_ERROR_CODE: &str = "KMSInvalidStateException";

pub fn classify(code: Option<&str>) -> HandlerErrorCode {
    match code {
        Some("AlreadyExistsException") => HandlerErrorCode::AlreadyExists,
        Some(
            "InvalidAliasNameException"
            | INVALID_STATE_ERROR_CODE
            | "InvalidArnException"
            | "MalformedPolicyDocumentException"
            | "UnsupportedOperationException"
            | "DisabledException"
            | "TagException"
            | VALIDATION_ERROR_CODE,
        ) => HandlerErrorCode::InvalidRequest,
        Some("LimitExceededException") => HandlerErrorCode::ServiceLimitExceeded,
        // Markers only ever come from a previous response.
        Some("InvalidMarkerException") => HandlerErrorCode::InternalFailure,
        Some("KMSInternalException" | "DependencyTimeoutException") => {
            HandlerErrorCode::ServiceInternalError
        }
        Some("NotFoundException") => HandlerErrorCode::NotFound,
        Some(ACCESS_DENIED_ERROR_CODE) => HandlerErrorCode::AccessDenied,
        Some(THROTTLING_ERROR_CODE) => HandlerErrorCode::Throttling,
        _ => HandlerErrorCode::GeneralServiceException,
    }
}

/// Translate an SDK failure, keeping the operation name and cause.
pub fn translate<E, R>(operation: &str, err: SdkError<E, R>) -> KmsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);
    let message = format_err_chain(&err);
    let kind = classify(code.as_deref());

    tracing::debug!(
        operation,
        code = code.as_deref().unwrap_or("none"),
        kind = ?kind,
        "translated remote failure"
    );
    KmsError::from_code(kind, operation, ApiFailure { code, message })
}

/// True for an InvalidRequest whose underlying cause is the key being in a
/// lifecycle state that forbids the operation.
pub fn is_invalid_state(err: &KmsError) -> bool {
    matches!(
        err,
        KmsError::InvalidRequest { cause, .. } if cause.has_code(INVALID_STATE_ERROR_CODE)
    )
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
