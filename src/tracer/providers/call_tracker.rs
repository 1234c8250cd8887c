// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Call-tracking provider.
//!
//! Bridges the span lifecycle to [`CallTracker`]: every call-like span gets
//! a [`CallInfo`] record scoped to the span's context, with the span type
//! fixing the latency bucket. Pure tracing spans pass through untouched.

use std::error::Error;
use std::sync::Arc;

use crate::call::{CallInfo, CallOption, CallTracker};
use crate::context::Context;
use crate::fields::{Field, StartCallArg};
use crate::tracer::provider::TraceProvider;
use crate::tracer::span::SpanType;
use crate::tracer::TraceInfo;

/// Tracks call-like spans as [`CallInfo`] records.
#[derive(Debug, Default)]
pub struct CallTrackerProvider {
    tracker: CallTracker,
}

impl CallTrackerProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceProvider for CallTrackerProvider {
    fn name(&self) -> &'static str {
        "call_tracker"
    }

    fn start_span(
        &self,
        ctx: Context,
        name: &str,
        span_type: SpanType,
        args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        if !span_type.is_call() {
            return ctx;
        }

        let call_ctx = self.tracker.start_call(&ctx, name, args);
        if let Some(call_type) = span_type.call_type() {
            if let Some(info) = self.tracker.info(&call_ctx) {
                CallOption::Type(call_type).apply(&info);
            }
        }
        call_ctx
    }

    fn end_span(&self, ctx: &Context, span_type: SpanType) {
        if !span_type.is_call() {
            return;
        }
        // CallInfo::end is idempotent, so a doubled end_span is harmless.
        self.tracker.end_call(ctx);
    }

    fn add_span_info(&self, ctx: &Context, span_type: SpanType, fields: &[Field]) {
        if !span_type.is_call() {
            return;
        }
        if let Some(info) = self.tracker.info(ctx) {
            info.add_args(fields.iter().cloned());
        }
    }

    fn set_span_status(
        &self,
        ctx: &Context,
        span_type: SpanType,
        err: Option<&(dyn Error + 'static)>,
    ) {
        if !span_type.is_call() {
            return;
        }
        if let Some(info) = self.tracker.info(ctx) {
            info.set_status(err);
        }
    }

    fn current_info(&self, ctx: &Context, info: &mut TraceInfo) {
        if info.call.is_none() {
            info.call = self.tracker.info(ctx);
        }
    }
}

/// Shortcut for the nearest-enclosing call record in a context.
pub fn current_call(ctx: &Context) -> Option<Arc<CallInfo>> {
    ctx.value::<CallInfo>()
}
