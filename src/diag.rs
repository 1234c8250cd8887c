// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostics subscriber setup for host applications.
//!
//! The log provider and the crate's own soft-failure diagnostics emit
//! through `tracing`; this module wires up a sensible subscriber for hosts
//! that don't already have one. Call [`init`] once at startup and keep the
//! returned guard alive.

use std::io;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the diagnostics subscriber.
#[derive(Debug, Clone)]
pub struct DiagConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span events (enter/exit).
    pub include_span_events: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Custom filter directive (overrides default_level).
    pub filter_directive: Option<String>,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_target: true,
            ansi_colors: true,
            filter_directive: None,
        }
    }
}

impl DiagConfig {
    /// Verbose output for development.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            ..Self::default()
        }
    }

    /// Minimal output for production; span logs still flow at info.
    pub fn production() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_target: false,
            ansi_colors: false,
            filter_directive: Some("warn,calltrace=info".to_string()),
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }
}

/// Guard that flushes diagnostics on drop.
///
/// Keep this guard alive for the duration of your program.
pub struct DiagGuard {
    _private: (),
}

impl Drop for DiagGuard {
    fn drop(&mut self) {
        // Reserved for exporters that buffer; the fmt layer needs no flush.
    }
}

/// Initialize the diagnostics subscriber.
///
/// Should be called once at application startup; a second call fails
/// because the global subscriber is already set.
pub fn init(config: &DiagConfig) -> io::Result<DiagGuard> {
    let filter = match &config.filter_directive {
        Some(directive) => EnvFilter::try_new(directive)
            .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.default_level))),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.default_level))),
    };

    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_span_events(span_events)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(DiagGuard { _private: () })
}
