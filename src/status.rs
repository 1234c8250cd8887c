// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error classification into status codes and categories.
//!
//! Every call error is classified into a coarse [`StatusCategory`] and a
//! status code string. Both feed metrics labels (`statuscode`,
//! `statuscategory`) and the log provider's severity choice.
//!
//! Classification is a pluggable extraction function. The default probes
//! the error for the crate's own [`StatusError`] type; anything it doesn't
//! recognize is classified `UNKNOWN_ERROR` / `ServerError` rather than
//! failing closed.

use std::error::Error;
use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;

/// Status code applied to errors no extractor recognizes.
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// Status code for a successful call.
pub const OK: &str = "OK";

/// Coarse outcome classification used for metrics labels and log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusCategory {
    /// The call succeeded. Logged at info.
    Ok,
    /// The caller was at fault (bad request, not found...). Logged at warn.
    ClientError,
    /// The service was at fault. Logged at error.
    ServerError,
}

impl StatusCategory {
    /// Label value used in metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "CategoryOK",
            Self::ClientError => "CategoryClientError",
            Self::ServerError => "CategoryServerError",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived (code, category) pair for one call outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub code: String,
    pub category: StatusCategory,
}

impl Status {
    /// The status of a call that finished without error.
    pub fn ok() -> Self {
        Self {
            code: OK.to_string(),
            category: StatusCategory::Ok,
        }
    }

    /// The status of an unclassifiable error.
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_ERROR.to_string(),
            category: StatusCategory::ServerError,
        }
    }
}

/// An error carrying its own status classification.
///
/// Services that want precise `statuscode` labels return this (or convert
/// into it) instead of relying on the fallback classification.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct StatusError {
    pub code: String,
    pub category: StatusCategory,
    pub message: String,
}

impl StatusError {
    pub fn new(
        code: impl Into<String>,
        category: StatusCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            category,
            message: message.into(),
        }
    }

    /// Shorthand for a client-fault error.
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, StatusCategory::ClientError, message)
    }

    /// Shorthand for a server-fault error.
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, StatusCategory::ServerError, message)
    }
}

/// Maps an arbitrary error to a [`Status`].
pub type StatusExtractor = fn(&(dyn Error + 'static)) -> Status;

/// Default extraction: recognize [`StatusError`], otherwise unknown.
pub fn default_extractor(err: &(dyn Error + 'static)) -> Status {
    match err.downcast_ref::<StatusError>() {
        Some(se) => Status {
            code: se.code.clone(),
            category: se.category,
        },
        None => Status::unknown(),
    }
}

static EXTRACTOR: Lazy<RwLock<StatusExtractor>> = Lazy::new(|| RwLock::new(default_extractor));

/// Replace the process-global status extraction function.
///
/// Intended to be called once at startup, before any calls are traced.
pub fn set_status_extractor(extractor: StatusExtractor) {
    *EXTRACTOR.write().unwrap() = extractor;
}

/// Classify an error through the registered extractor.
pub fn status_of(err: &(dyn Error + 'static)) -> Status {
    (EXTRACTOR.read().unwrap())(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_error_defaults_to_server_fault() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let status = default_extractor(&err);
        assert_eq!(status.code, UNKNOWN_ERROR);
        assert_eq!(status.category, StatusCategory::ServerError);
    }

    #[test]
    fn test_status_error_self_classifies() {
        let err = StatusError::client("BadRequest", "missing field");
        let status = default_extractor(&err);
        assert_eq!(status.code, "BadRequest");
        assert_eq!(status.category, StatusCategory::ClientError);
    }

    #[test]
    fn test_status_error_display() {
        let err = StatusError::server("Timeout", "upstream timed out");
        assert_eq!(err.to_string(), "Timeout: upstream timed out");
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(StatusCategory::Ok.as_str(), "CategoryOK");
        assert_eq!(StatusCategory::ClientError.as_str(), "CategoryClientError");
        assert_eq!(StatusCategory::ServerError.as_str(), "CategoryServerError");
    }

    #[test]
    fn test_status_of_uses_registered_extractor() {
        // The default is in place unless a test swaps it; classify a plain
        // error and expect the unknown fallback.
        let err = std::fmt::Error;
        let status = status_of(&err);
        assert_eq!(status.code, UNKNOWN_ERROR);
    }
}
