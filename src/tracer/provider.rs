// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The pluggable trace provider contract.
//!
//! A provider implements whichever subset of the trace/span lifecycle it
//! cares about; every method has a safe no-op default, so a provider is the
//! null object until it overrides something. Optional capabilities
//! (sampling control, presend hooks) are probed through `Option`-returning
//! methods rather than being part of the base contract - providers that
//! don't support them are silently skipped.

use std::error::Error;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::fields::{Field, StartCallArg};
use crate::tracer::propagation::Headers;
use crate::tracer::span::SpanType;
use crate::tracer::TraceInfo;

/// Mutates the flattened field set of a span just before it is emitted.
pub type PresendHook = Arc<dyn Fn(&mut serde_json::Map<String, Value>) + Send + Sync>;

/// Optional capability: adjust sampling for the current trace.
pub trait SampleControl: Send + Sync {
    /// Pin the current trace to full sampling.
    fn force_trace(&self, ctx: &Context);

    /// Override the current trace's inverse sample rate (1-in-`rate`).
    fn set_sample_rate(&self, ctx: &Context, rate: u32);
}

/// Optional capability: install a presend hook.
pub trait PresendHookControl: Send + Sync {
    fn set_presend_hook(&self, hook: PresendHook);
}

/// One pluggable implementation of the tracing capability contract.
///
/// Context-returning methods thread the context: each provider's output
/// becomes the next provider's input, so a provider that layers state makes
/// it visible to every provider registered after it.
pub trait TraceProvider: Send + Sync {
    /// Short name used in diagnostics and init-failure attribution.
    fn name(&self) -> &'static str;

    /// One-time setup. A failure aborts tracer initialization.
    fn init(&self, _ctx: &Context, _service: &str) -> Result<()> {
        Ok(())
    }

    /// Release resources. Called exactly once per successful `init`.
    fn close(&self, _ctx: &Context) {}

    /// Begin a trace, optionally resuming a propagated parent from
    /// `headers`.
    fn start_trace(&self, ctx: Context, _name: &str, _headers: &Headers) -> Context {
        ctx
    }

    /// Finalize the trace.
    fn end_trace(&self, _ctx: &Context) {}

    /// Attach metadata to the trace root.
    fn add_trace_info(&self, _ctx: &Context, _fields: &[Field]) {}

    /// Begin a child unit of work.
    fn start_span(
        &self,
        ctx: Context,
        _name: &str,
        _span_type: SpanType,
        _args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        ctx
    }

    /// Finalize a span.
    fn end_span(&self, _ctx: &Context, _span_type: SpanType) {}

    /// Attach metadata to the current span.
    fn add_span_info(&self, _ctx: &Context, _span_type: SpanType, _fields: &[Field]) {}

    /// Record the current span's error outcome.
    fn set_span_status(
        &self,
        _ctx: &Context,
        _span_type: SpanType,
        _err: Option<&(dyn Error + 'static)>,
    ) {
    }

    /// Contribute this provider's portion of the current trace identity.
    ///
    /// Providers must not overwrite fields another provider populated
    /// unless they exclusively own that field.
    fn current_info(&self, _ctx: &Context, _info: &mut TraceInfo) {}

    /// Add outbound propagation headers for the current span.
    fn current_headers(&self, _ctx: &Context, _headers: &mut Headers) {}

    /// Probe for the sampling-control capability.
    fn sample_control(&self) -> Option<&dyn SampleControl> {
        None
    }

    /// Probe for the presend-hook capability.
    fn presend_hook_control(&self) -> Option<&dyn PresendHookControl> {
        None
    }
}
