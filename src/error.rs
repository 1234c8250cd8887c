// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the tracing core.
//!
//! Tracing is best-effort telemetry: runtime failures inside providers are
//! absorbed and logged through the crate's own diagnostics, never surfaced
//! to the instrumented caller. The one exception is initialization - a
//! provider that cannot start is a startup configuration problem callers
//! should treat as fatal.

use thiserror::Error;

/// Errors that can occur while initializing a tracer.
///
/// Repeat initialization is not an error; `Tracer::init` is idempotent,
/// so the only failure mode is a provider refusing to start.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("provider '{provider}' failed to initialize: {message}")]
    ProviderInit { provider: String, message: String },
}

impl TracerError {
    /// Create a provider initialization error.
    pub fn provider_init(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderInit {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Result type for tracer initialization paths.
pub type Result<T> = std::result::Result<T, TracerError>;
