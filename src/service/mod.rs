// src/service/mod.rs

pub mod anthropic;
pub mod response;

use crate::data_model::{CaptionText, ImagePayload};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use anthropic::AnthropicCaptionService;

/// How a failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Likely to succeed if tried again after a backoff.
    Transient,
    /// Retrying will not help.
    Fatal,
    /// Unknown cause: retried with a flat delay, fatal on the last attempt.
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    Timeout,
    Overloaded,
    RateLimited,
    Authentication,
    InvalidRequest,
    /// The service answered but without both captions.
    IncompletePayload,
    Unclassified,
}

impl ServiceErrorKind {
    pub fn class(&self) -> FailureClass {
        match self {
            ServiceErrorKind::Timeout
            | ServiceErrorKind::Overloaded
            | ServiceErrorKind::RateLimited => FailureClass::Transient,
            ServiceErrorKind::Authentication
            | ServiceErrorKind::InvalidRequest
            | ServiceErrorKind::IncompletePayload => FailureClass::Fatal,
            ServiceErrorKind::Unclassified => FailureClass::Unclassified,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == FailureClass::Fatal
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorKind::Timeout => "timeout",
            ServiceErrorKind::Overloaded => "overloaded",
            ServiceErrorKind::RateLimited => "rate_limited",
            ServiceErrorKind::Authentication => "authentication",
            ServiceErrorKind::InvalidRequest => "invalid_request",
            ServiceErrorKind::IncompletePayload => "incomplete_payload",
            ServiceErrorKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from a captioning service call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub detail: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, detail: impl Into<String>) -> Self {
        ServiceError {
            kind,
            detail: detail.into(),
        }
    }

    pub fn overloaded(detail: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Overloaded, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, detail)
    }

    pub fn incomplete(detail: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::IncompletePayload, detail)
    }
}

/// A remote captioner. Implementations own the wire format and must hand back
/// either validated captions or a classified error.
#[async_trait]
pub trait CaptionService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn caption(
        &self,
        image: &ImagePayload,
        prompt: &str,
    ) -> std::result::Result<CaptionText, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ServiceErrorKind::Overloaded.is_transient());
        assert!(ServiceErrorKind::RateLimited.is_transient());
        assert!(ServiceErrorKind::Timeout.is_transient());
        assert!(ServiceErrorKind::Authentication.is_fatal());
        assert!(ServiceErrorKind::IncompletePayload.is_fatal());
        assert_eq!(
            ServiceErrorKind::Unclassified.class(),
            FailureClass::Unclassified
        );
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::overloaded("HTTP 529");
        assert_eq!(err.to_string(), "overloaded: HTTP 529");
    }
}
