// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log-on-span-end provider.
//!
//! Emits one structured event per finished call span, carrying the trace
//! identity, the call's timing, accumulated annotations, and the error
//! outcome. Severity follows the status category: OK at info, client
//! errors at warn, server errors at error.
//!
//! Must be registered *before* the call-tracking provider: reverse-order
//! teardown then closes the call before this provider reads its final
//! state. A presend hook, when installed, may rewrite the flattened field
//! set just before emission (redaction, enrichment).

use std::sync::Mutex;

use serde_json::Value;

use crate::call::CallInfo;
use crate::context::Context;
use crate::fields::{FieldEmitter, MapEmitter};
use crate::status::StatusCategory;
use crate::tracer::provider::{PresendHook, PresendHookControl, TraceProvider};
use crate::tracer::providers::propagation::SpanState;
use crate::tracer::span::SpanType;

/// Emits a structured log event when call spans end.
#[derive(Default)]
pub struct LogProvider {
    presend: Mutex<Option<PresendHook>>,
}

impl LogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, category: StatusCategory, call: &str, fields: serde_json::Map<String, Value>) {
        let mut fields = fields;
        if let Some(hook) = self.presend.lock().unwrap().as_ref() {
            hook(&mut fields);
        }
        let payload = Value::Object(fields).to_string();

        match category {
            StatusCategory::Ok => {
                tracing::info!(target: "calltrace::span", call, fields = %payload, "call finished")
            }
            StatusCategory::ClientError => {
                tracing::warn!(target: "calltrace::span", call, fields = %payload, "call finished")
            }
            StatusCategory::ServerError => {
                tracing::error!(target: "calltrace::span", call, fields = %payload, "call finished")
            }
        }
    }
}

impl TraceProvider for LogProvider {
    fn name(&self) -> &'static str {
        "log"
    }

    fn end_span(&self, ctx: &Context, span_type: SpanType) {
        if !span_type.is_call() {
            return;
        }
        let Some(info) = ctx.value::<CallInfo>() else {
            return;
        };
        // One event per call, even if the span is ended twice.
        if !info.claim_log_emit() {
            return;
        }

        let mut emitter = MapEmitter::new();
        if let Some(span) = ctx.value::<SpanState>() {
            emitter.emit("trace_id", Value::from(span.trace_id().to_string()));
            emitter.emit("span_id", Value::from(span.span_id().to_string()));
            if let Some(parent) = span.parent_id() {
                emitter.emit("parent_id", Value::from(parent.to_string()));
            }
        }
        emitter.emit("span_type", Value::from(span_type.as_str()));
        info.marshal_fields(&mut emitter);

        self.emit(info.status().category, &info.name(), emitter.into_map());
    }

    fn end_trace(&self, ctx: &Context) {
        let Some(span) = ctx.value::<SpanState>() else {
            return;
        };
        let root = span.root();
        let fields = root.fields();
        if fields.is_empty() {
            tracing::debug!(target: "calltrace::trace", trace = root.name(), trace_id = %root.trace_id(), "trace finished");
            return;
        }

        let mut emitter = MapEmitter::new();
        for field in &fields {
            emitter.emit(&field.key, field.value.clone());
        }
        let payload = Value::Object(emitter.into_map()).to_string();
        tracing::info!(target: "calltrace::trace", trace = root.name(), trace_id = %root.trace_id(), fields = %payload, "trace finished");
    }

    fn presend_hook_control(&self) -> Option<&dyn PresendHookControl> {
        Some(self)
    }
}

impl PresendHookControl for LogProvider {
    fn set_presend_hook(&self, hook: PresendHook) {
        *self.presend.lock().unwrap() = Some(hook);
    }
}
