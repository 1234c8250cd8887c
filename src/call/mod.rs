// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-call latency and state tracking.
//!
//! A [`CallInfo`] is the mutable record for one tracked unit of work - an
//! inbound HTTP or gRPC request, an outbound call, or an internal operation.
//! It carries the call name, timing, accumulated annotations, and the error
//! outcome, and knows how to route its latency to the right histogram family
//! and marshal itself into flat log fields.
//!
//! Records are shared via `Arc` and internally synchronized: the goroutine-
//! style owner drives the start/end lifecycle while any number of helper
//! threads may append annotations concurrently through
//! [`CallInfo::add_args`].

mod tracker;

pub use tracker::{CallScope, CallTracker};

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::fields::{Field, FieldEmitter, StartCallArg};
use crate::metrics::{HistogramFamily, LatencyLabels, LatencyRecorder};
use crate::status::{self, Status, StatusCategory};

/// Cost-center classification for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallKind {
    /// Work done on behalf of this service. The default.
    #[default]
    Internal,
    /// Work done on behalf of another party.
    External,
}

impl CallKind {
    /// Label value used in metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// Which latency histogram family a call reports to.
///
/// A call without a type reports no latency at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Http,
    Grpc,
    Outbound,
}

impl CallType {
    /// The histogram family this type routes to.
    pub fn family(&self) -> HistogramFamily {
        match self {
            Self::Http => HistogramFamily::HttpRequestHandled,
            Self::Grpc => HistogramFamily::GrpcRequestHandled,
            Self::Outbound => HistogramFamily::OutboundCallSeconds,
        }
    }

    /// Label value used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Grpc => "grpc",
            Self::Outbound => "outbound",
        }
    }
}

/// Error outcome captured for a call.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Display form of the original error.
    pub error: String,
    /// Status code (or `"panic"` for panics).
    pub kind: String,
    /// Coarse classification derived alongside the code.
    pub category: StatusCategory,
    /// Human-oriented message.
    pub message: String,
    /// Captured stack trace, present for panics.
    pub stack: Option<String>,
}

/// A call-configuring argument, distinguished from plain annotations by
/// capability probing (see [`crate::fields::StartCallArg`]).
#[derive(Debug, Clone)]
pub enum CallOption {
    /// Override the cost-center classification.
    Kind(CallKind),
    /// Set the latency histogram family.
    Type(CallType),
    /// When the work item was queued, for wait/total duration derivation.
    QueuedAt(DateTime<Utc>),
    /// When the work item was dequeued.
    DequeuedAt(DateTime<Utc>),
}

impl CallOption {
    /// Apply this option to a call record.
    pub fn apply(&self, info: &CallInfo) {
        match self {
            Self::Kind(kind) => info.set_kind(*kind),
            Self::Type(call_type) => info.set_call_type(*call_type),
            Self::QueuedAt(at) => info.set_queued_at(*at),
            Self::DequeuedAt(at) => info.set_dequeued_at(*at),
        }
    }
}

impl StartCallArg for CallOption {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Convenience constructor for an option argument.
pub fn opt(option: CallOption) -> Arc<dyn StartCallArg> {
    Arc::new(option)
}

#[derive(Debug, Default)]
struct CallState {
    name: String,
    kind: CallKind,
    call_type: Option<CallType>,
    started_at: Option<DateTime<Utc>>,
    started_instant: Option<Instant>,
    finished_at: Option<DateTime<Utc>>,
    queued_at: Option<DateTime<Utc>>,
    dequeued_at: Option<DateTime<Utc>>,
    service_seconds: f64,
    total_seconds: f64,
    wait_seconds: f64,
    error: Option<ErrorInfo>,
    closed: bool,
    latency_reported: bool,
    log_emitted: bool,
}

/// The mutable record for one tracked call.
///
/// All mutation goes through `&self`; timing and outcome are guarded by one
/// lock, annotations by another so concurrent [`CallInfo::add_args`] callers
/// never contend with the owner's lifecycle operations.
#[derive(Debug, Default)]
pub struct CallInfo {
    state: Mutex<CallState>,
    args: Mutex<Vec<Field>>,
}

impl CallInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin the call: records the name and the start timestamp.
    pub fn start(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.name = name.to_string();
        state.started_at = Some(Utc::now());
        state.started_instant = Some(Instant::now());
    }

    /// Finish the call and derive its durations.
    ///
    /// Idempotent: the first `end` closes the record, later calls no-op so
    /// a doubled span end never re-derives or re-reports anything. Safe to
    /// call without a preceding [`CallInfo::start`]; durations stay zero.
    pub fn end(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;

        let finished_at = Utc::now();
        state.finished_at = Some(finished_at);

        state.service_seconds = state
            .started_instant
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        state.total_seconds = match state.queued_at {
            Some(queued) => ((finished_at - queued).num_nanoseconds().unwrap_or(0) as f64
                / 1e9)
                .max(0.0),
            None => state.service_seconds,
        };

        state.wait_seconds = match (state.queued_at, state.dequeued_at) {
            (Some(queued), Some(dequeued)) => {
                ((dequeued - queued).num_nanoseconds().unwrap_or(0) as f64 / 1e9).max(0.0)
            }
            _ => 0.0,
        };
    }

    /// Append annotations. Safe to call from any number of threads.
    pub fn add_args<I: IntoIterator<Item = Field>>(&self, fields: I) {
        let mut args = self.args.lock().unwrap();
        args.extend(fields);
    }

    /// Record the call's error outcome. `None` clears any recorded error;
    /// the last writer wins.
    pub fn set_status(&self, err: Option<&(dyn Error + 'static)>) {
        let mut state = self.state.lock().unwrap();
        state.error = err.map(|e| {
            let Status { code, category } = status::status_of(e);
            ErrorInfo {
                error: e.to_string(),
                kind: code,
                category,
                message: e.to_string(),
                stack: None,
            }
        });
    }

    /// Record a panic as the call's outcome, with a captured stack trace.
    pub fn set_panic(&self, message: &str, stack: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.error = Some(ErrorInfo {
            error: message.to_string(),
            kind: "panic".to_string(),
            category: StatusCategory::ServerError,
            message: message.to_string(),
            stack: stack.or_else(|| Some(Backtrace::force_capture().to_string())),
        });
    }

    /// Report this call's latency to `recorder`, routed by call type.
    ///
    /// No-ops for untyped calls, for calls that have not ended, and on any
    /// call after the first successful report.
    pub fn report_latency(&self, app: &str, recorder: &dyn LatencyRecorder) {
        let (family, labels, seconds) = {
            let mut state = self.state.lock().unwrap();
            if !state.closed || state.latency_reported {
                return;
            }
            let family = match state.call_type {
                Some(call_type) => call_type.family(),
                None => return,
            };
            state.latency_reported = true;

            let status = match &state.error {
                Some(info) => Status {
                    code: info.kind.clone(),
                    category: info.category,
                },
                None => Status::ok(),
            };
            let labels = LatencyLabels {
                app: app.to_string(),
                call: state.name.clone(),
                statuscode: status.code,
                statuscategory: status.category,
                kind: state.kind.as_str().to_string(),
            };
            (family, labels, state.service_seconds)
        };
        recorder.observe(family, labels, seconds);
    }

    /// Emit timing, annotations, and error outcome as flat log fields.
    pub fn marshal_fields(&self, emitter: &mut dyn FieldEmitter) {
        let state = self.state.lock().unwrap();

        emitter.emit("call", Value::from(state.name.clone()));
        emitter.emit("call_kind", Value::from(state.kind.as_str()));
        if let Some(call_type) = state.call_type {
            emitter.emit("call_type", Value::from(call_type.as_str()));
        }
        if let Some(started) = state.started_at {
            emitter.emit("started_at", Value::from(started.to_rfc3339()));
        }
        if state.closed {
            emitter.emit("duration_seconds", json_f64(state.service_seconds));
            emitter.emit("total_seconds", json_f64(state.total_seconds));
            if state.wait_seconds > 0.0 {
                emitter.emit("wait_seconds", json_f64(state.wait_seconds));
            }
        }

        for field in self.args.lock().unwrap().iter() {
            emitter.emit(&field.key, field.value.clone());
        }

        if let Some(info) = &state.error {
            emitter.emit("error", Value::from(info.error.clone()));
            emitter.emit("error_kind", Value::from(info.kind.clone()));
            emitter.emit("error_category", Value::from(info.category.as_str()));
            if let Some(stack) = &info.stack {
                emitter.emit("error_stack", Value::from(stack.clone()));
            }
        }
    }

    // Accessors. Each takes the state lock briefly; none are held across
    // user code.

    pub fn name(&self) -> String {
        self.state.lock().unwrap().name.clone()
    }

    pub fn kind(&self) -> CallKind {
        self.state.lock().unwrap().kind
    }

    pub fn call_type(&self) -> Option<CallType> {
        self.state.lock().unwrap().call_type
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().finished_at
    }

    /// Wall-clock seconds between start and end. Zero until the call ends.
    pub fn service_seconds(&self) -> f64 {
        self.state.lock().unwrap().service_seconds
    }

    pub fn total_seconds(&self) -> f64 {
        self.state.lock().unwrap().total_seconds
    }

    pub fn wait_seconds(&self) -> f64 {
        self.state.lock().unwrap().wait_seconds
    }

    pub fn error_info(&self) -> Option<ErrorInfo> {
        self.state.lock().unwrap().error.clone()
    }

    /// The call's derived status: its error classification, or OK.
    pub fn status(&self) -> Status {
        match &self.state.lock().unwrap().error {
            Some(info) => Status {
                code: info.kind.clone(),
                category: info.category,
            },
            None => Status::ok(),
        }
    }

    /// Number of accumulated annotations.
    pub fn arg_count(&self) -> usize {
        self.args.lock().unwrap().len()
    }

    pub(crate) fn set_kind(&self, kind: CallKind) {
        self.state.lock().unwrap().kind = kind;
    }

    pub(crate) fn set_call_type(&self, call_type: CallType) {
        self.state.lock().unwrap().call_type = Some(call_type);
    }

    pub(crate) fn set_queued_at(&self, at: DateTime<Utc>) {
        self.state.lock().unwrap().queued_at = Some(at);
    }

    pub(crate) fn set_dequeued_at(&self, at: DateTime<Utc>) {
        self.state.lock().unwrap().dequeued_at = Some(at);
    }

    /// First-time claim for the one structured log event per call.
    pub(crate) fn claim_log_emit(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.log_emitted {
            false
        } else {
            state.log_emitted = true;
            true
        }
    }
}

fn json_f64(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
