// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Calltrace - distributed call and span tracing core.
//!
//! Context-scoped call tracking with a pluggable, ordered set of trace
//! providers. Spans nest through an immutable execution [`context::Context`];
//! providers fan out in registration order on start operations and in
//! reverse order on end operations, so teardown brackets correctly.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`context`] - Immutable execution context with typed value scoping
//! - [`fields`] - Structured annotations and start-call arguments
//! - [`status`] - Error classification into codes and categories
//! - [`error`] - Tracer initialization errors
//! - [`call`] - Per-call records and the context-scoped call tracker
//! - [`metrics`] - Latency histogram sink interface and in-memory recorder
//! - [`tracer`] - Provider contract, composite dispatcher, tracer façade
//! - [`diag`] - Diagnostics subscriber setup for host applications
//!
//! # Example
//!
//! ```rust
//! use calltrace::context::Context;
//! use calltrace::fields::arg;
//! use calltrace::tracer::{Headers, SpanType, Tracer};
//!
//! let tracer = Tracer::with_default_providers();
//! tracer.init(&Context::background(), "billing").unwrap();
//!
//! let ctx = tracer.start_trace(&Context::background(), "handle_charge", &Headers::new());
//! let span_ctx = tracer.start_span(&ctx, "charge_card", SpanType::Outbound, &[arg("amount", 1200)]);
//! // ... do the work ...
//! tracer.end_span(&span_ctx, SpanType::Outbound);
//! tracer.end_trace(&ctx);
//! ```

pub mod call;
pub mod context;
pub mod diag;
pub mod error;
pub mod fields;
pub mod metrics;
pub mod status;
pub mod tracer;

// Re-export commonly used types at crate root
pub use call::{CallInfo, CallKind, CallOption, CallScope, CallTracker, CallType, ErrorInfo};
pub use context::Context;
pub use error::TracerError;
pub use fields::{arg, Field, FieldEmitter, StartCallArg};
pub use status::{Status, StatusCategory, StatusError};
pub use tracer::{global, Headers, SpanId, SpanType, TraceId, TraceInfo, TraceProvider, Tracer};
