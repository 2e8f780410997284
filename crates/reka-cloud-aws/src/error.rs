//! AWS error classification
//!
//! SDK errors are classified by their `.code()` rather than by matching on
//! their Debug output.

use aws_sdk_ec2::error::ProvideErrorMetadata;
use reka_cloud::CloudError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Credentials missing or rejected
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound(_))
    }
}

const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchTagSet",
    "NoSuchTagSetError",
    "NotFound",
];

const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded", "SlowDown"];

const AUTH_CODES: &[&str] = &[
    "AuthFailure",
    "UnauthorizedOperation",
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Classify an AWS error from its code and message
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound(message),
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if AUTH_CODES.contains(&c) => AwsError::Unauthorized(message),
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify any SDK error that exposes error metadata
pub fn from_sdk<E>(err: E) -> AwsError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    match (err.code(), err.message()) {
        (None, None) => AwsError::Sdk {
            code: None,
            message: err.to_string(),
        },
        (code, message) => classify_aws_error(code, message),
    }
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Cloud(inner) => inner,
            other => CloudError::Backend(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert!(classify_aws_error(Some("NoSuchKey"), Some("gone")).is_not_found());
        assert!(matches!(
            classify_aws_error(Some("RequestLimitExceeded"), None),
            AwsError::Throttled
        ));
        assert!(matches!(
            classify_aws_error(Some("AuthFailure"), Some("bad creds")),
            AwsError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_aws_error(Some("InternalError"), Some("boom")),
            AwsError::Sdk { code: Some(c), .. } if c == "InternalError"
        ));
    }

    #[test]
    fn test_into_cloud_error() {
        let err: CloudError = AwsError::Throttled.into();
        assert!(matches!(err, CloudError::Backend(msg) if msg == "Rate limit exceeded"));

        let err: CloudError = AwsError::Cloud(CloudError::Timeout("slow".to_string())).into();
        assert!(matches!(err, CloudError::Timeout(_)));
    }
}
