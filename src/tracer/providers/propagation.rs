// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace identity, propagation, and sampling provider.
//!
//! This provider models the exporter-collaborator capability: it owns the
//! trace/span identity carried in the context, resumes propagated parents
//! from incoming headers, serializes outbound context, and makes the
//! sampling decision. Actually shipping spans to a backend is an external
//! concern layered on top of the state this provider maintains.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::fields::{Field, StartCallArg};
use crate::tracer::propagation::{Headers, SpanId, TraceId, WireContext};
use crate::tracer::provider::{SampleControl, TraceProvider};
use crate::tracer::sampling;
use crate::tracer::span::SpanType;
use crate::tracer::TraceInfo;

/// Trace-scoped state shared by every span of one trace.
///
/// Sampling knobs are atomics so `force_trace` / `set_sample_rate` can act
/// through the immutable context.
#[derive(Debug)]
pub struct TraceRoot {
    name: String,
    trace_id: TraceId,
    sample_rate: AtomicU32,
    forced: AtomicBool,
    fields: Mutex<Vec<Field>>,
}

impl TraceRoot {
    fn new(name: &str, trace_id: TraceId, sample_rate: u32, forced: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            trace_id,
            sample_rate: AtomicU32::new(sample_rate.max(1)),
            forced: AtomicBool::new(forced),
            fields: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn is_forced(&self) -> bool {
        self.forced.load(Ordering::Relaxed)
    }

    /// Snapshot of the trace-level metadata accumulated so far.
    pub fn fields(&self) -> Vec<Field> {
        self.fields.lock().unwrap().clone()
    }

    fn add_fields(&self, fields: &[Field]) {
        self.fields.lock().unwrap().extend_from_slice(fields);
    }
}

/// Span-scoped identity layered onto the context per span.
#[derive(Debug, Clone)]
pub struct SpanState {
    trace_id: TraceId,
    span_id: SpanId,
    parent_id: Option<SpanId>,
    root: Arc<TraceRoot>,
}

impl SpanState {
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    pub fn root(&self) -> &Arc<TraceRoot> {
        &self.root
    }
}

/// Provider owning trace identity, header propagation, and sampling.
#[derive(Debug)]
pub struct PropagationProvider {
    default_sample_rate: u32,
}

impl PropagationProvider {
    pub fn new() -> Self {
        Self {
            default_sample_rate: 1,
        }
    }

    /// Sample 1-in-`rate` traces by default (propagated parents keep the
    /// sender's rate).
    pub fn with_sample_rate(rate: u32) -> Self {
        Self {
            default_sample_rate: rate.max(1),
        }
    }

    /// The sampling decision for the current trace.
    ///
    /// Deterministic per trace id; forced traces always sample.
    pub fn sampled(&self, ctx: &Context) -> bool {
        match ctx.value::<SpanState>() {
            Some(span) => {
                span.root.is_forced()
                    || sampling::should_sample(span.trace_id, span.root.sample_rate())
            }
            None => false,
        }
    }
}

impl Default for PropagationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceProvider for PropagationProvider {
    fn name(&self) -> &'static str {
        "propagation"
    }

    fn start_trace(&self, ctx: Context, name: &str, headers: &Headers) -> Context {
        let (wire, forced) = WireContext::extract(headers);

        let (trace_id, parent_id, sample_rate) = match wire {
            Some(wire) => (wire.trace_id, Some(wire.parent_id), wire.sample_rate),
            None => (TraceId::generate(), None, self.default_sample_rate),
        };

        let root = TraceRoot::new(name, trace_id, sample_rate, forced);
        let span = SpanState {
            trace_id,
            span_id: SpanId::generate(),
            parent_id,
            root: root.clone(),
        };

        ctx.with_shared(root).with_value(span)
    }

    fn add_trace_info(&self, ctx: &Context, fields: &[Field]) {
        if let Some(span) = ctx.value::<SpanState>() {
            span.root.add_fields(fields);
        }
    }

    fn start_span(
        &self,
        ctx: Context,
        name: &str,
        _span_type: SpanType,
        _args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        let span = match ctx.value::<SpanState>() {
            Some(parent) => SpanState {
                trace_id: parent.trace_id,
                span_id: SpanId::generate(),
                parent_id: Some(parent.span_id),
                root: parent.root.clone(),
            },
            None => {
                // Span without an enclosing trace: start an implicit one so
                // the span still gets identity.
                tracing::debug!(span = name, "span started outside a trace");
                let trace_id = TraceId::generate();
                SpanState {
                    trace_id,
                    span_id: SpanId::generate(),
                    parent_id: None,
                    root: TraceRoot::new(name, trace_id, self.default_sample_rate, false),
                }
            }
        };
        ctx.with_value(span)
    }

    fn current_info(&self, ctx: &Context, info: &mut TraceInfo) {
        if let Some(span) = ctx.value::<SpanState>() {
            // Identity fields are owned by this provider; populate only
            // what is still unset.
            if info.trace_id.is_none() {
                info.trace_id = Some(span.trace_id);
            }
            if info.span_id.is_none() {
                info.span_id = Some(span.span_id);
            }
            if info.parent_id.is_none() {
                info.parent_id = span.parent_id;
            }
        }
    }

    fn current_headers(&self, ctx: &Context, headers: &mut Headers) {
        if let Some(span) = ctx.value::<SpanState>() {
            let wire = WireContext {
                trace_id: span.trace_id,
                parent_id: span.span_id,
                sample_rate: span.root.sample_rate(),
            };
            wire.inject(span.root.is_forced(), headers);
        }
    }

    fn sample_control(&self) -> Option<&dyn SampleControl> {
        Some(self)
    }
}

impl SampleControl for PropagationProvider {
    fn force_trace(&self, ctx: &Context) {
        if let Some(span) = ctx.value::<SpanState>() {
            span.root.forced.store(true, Ordering::Relaxed);
            span.root.sample_rate.store(1, Ordering::Relaxed);
        }
    }

    fn set_sample_rate(&self, ctx: &Context, rate: u32) {
        if let Some(span) = ctx.value::<SpanState>() {
            span.root.sample_rate.store(rate.max(1), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_trace(provider: &PropagationProvider) -> Context {
        provider.start_trace(Context::background(), "req", &Headers::new())
    }

    #[test]
    fn test_fresh_trace_has_root_identity() {
        let provider = PropagationProvider::new();
        let ctx = start_trace(&provider);

        let span = ctx.value::<SpanState>().unwrap();
        assert!(span.parent_id().is_none());
        assert_eq!(span.trace_id(), span.root().trace_id());
        assert_eq!(span.root().name(), "req");
    }

    #[test]
    fn test_child_span_parents_onto_enclosing() {
        let provider = PropagationProvider::new();
        let trace_ctx = start_trace(&provider);
        let root_span = trace_ctx.value::<SpanState>().unwrap();

        let span_ctx = provider.start_span(trace_ctx, "child", SpanType::Sync, &[]);
        let child = span_ctx.value::<SpanState>().unwrap();

        assert_eq!(child.trace_id(), root_span.trace_id());
        assert_eq!(child.parent_id(), Some(root_span.span_id()));
        assert_ne!(child.span_id(), root_span.span_id());
    }

    #[test]
    fn test_headers_round_trip_resumes_parent() {
        let provider = PropagationProvider::new();
        let ctx = start_trace(&provider);
        let origin = ctx.value::<SpanState>().unwrap();

        let mut headers = Headers::new();
        provider.current_headers(&ctx, &mut headers);

        // A downstream process resumes from those headers.
        let remote = PropagationProvider::new();
        let remote_ctx = remote.start_trace(Context::background(), "remote", &headers);
        let resumed = remote_ctx.value::<SpanState>().unwrap();

        assert_eq!(resumed.trace_id(), origin.trace_id());
        assert_eq!(resumed.parent_id(), Some(origin.span_id()));
    }

    #[test]
    fn test_force_header_pins_sampling() {
        let provider = PropagationProvider::with_sample_rate(1_000_000);
        let ctx = start_trace(&provider);
        provider.force_trace(&ctx);

        assert!(provider.sampled(&ctx));

        let mut headers = Headers::new();
        provider.current_headers(&ctx, &mut headers);
        let remote = PropagationProvider::new();
        let remote_ctx = remote.start_trace(Context::background(), "remote", &headers);
        assert!(remote.sampled(&remote_ctx));
    }

    #[test]
    fn test_set_sample_rate_overrides_trace() {
        let provider = PropagationProvider::new();
        let ctx = start_trace(&provider);
        provider.set_sample_rate(&ctx, 50);

        let span = ctx.value::<SpanState>().unwrap();
        assert_eq!(span.root().sample_rate(), 50);
    }

    #[test]
    fn test_trace_info_fields_not_overwritten() {
        let provider = PropagationProvider::new();
        let ctx = start_trace(&provider);

        let pinned = TraceId::from_u128(7);
        let mut info = TraceInfo {
            trace_id: Some(pinned),
            ..TraceInfo::default()
        };
        provider.current_info(&ctx, &mut info);

        assert_eq!(info.trace_id, Some(pinned));
        assert!(info.span_id.is_some());
    }

    #[test]
    fn test_add_trace_info_accumulates_on_root() {
        let provider = PropagationProvider::new();
        let ctx = start_trace(&provider);
        provider.add_trace_info(&ctx, &[Field::new("tenant", "acme")]);

        let span = ctx.value::<SpanState>().unwrap();
        let fields = span.root().fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].key, "tenant");
    }

    #[test]
    fn test_span_outside_trace_gets_implicit_identity() {
        let provider = PropagationProvider::new();
        let ctx = provider.start_span(Context::background(), "orphan", SpanType::Sync, &[]);
        let span = ctx.value::<SpanState>().unwrap();
        assert!(span.parent_id().is_none());
    }
}
