// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The tracer façade: provider composition and the trace/span lifecycle.
//!
//! A [`Tracer`] owns an ordered set of [`TraceProvider`]s fixed at
//! construction and delegates every lifecycle operation to the composite
//! dispatcher - forward order on start operations, reverse on end
//! operations. The tracer itself holds no per-call state; everything lives
//! in the execution [`Context`] and inside each provider.
//!
//! ```rust,ignore
//! use calltrace::context::Context;
//! use calltrace::tracer::{Tracer, SpanType};
//!
//! let tracer = Tracer::with_default_providers();
//! tracer.init(&Context::background(), "billing")?;
//!
//! let ctx = tracer.start_trace(&Context::background(), "handle_charge", &headers);
//! let span_ctx = tracer.start_span(&ctx, "charge_card", SpanType::Outbound, &[]);
//! // ... work ...
//! tracer.end_span(&span_ctx, SpanType::Outbound);
//! tracer.end_trace(&ctx);
//! ```

mod composite;
pub mod propagation;
pub mod provider;
pub mod providers;
pub mod sampling;
mod span;

pub use composite::ProviderSet;
pub use propagation::{Headers, SpanId, TraceId, FORCE_TRACE_HEADER, TRACE_CONTEXT_HEADER};
pub use provider::{PresendHook, PresendHookControl, SampleControl, TraceProvider};
pub use span::SpanType;

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::call::CallInfo;
use crate::context::Context;
use crate::error::Result;
use crate::fields::{Field, StartCallArg};
use providers::{CallTrackerProvider, LatencyProvider, LogProvider, PropagationProvider};

/// A consistent snapshot of the current trace identity.
///
/// Always fully constructed - fields are `None` rather than the struct
/// being absent, so callers never need a nil check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceInfo {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub parent_id: Option<SpanId>,
    /// The nearest-enclosing call record, if a call-tracking provider is
    /// registered and a call is in scope.
    #[serde(skip)]
    pub call: Option<Arc<CallInfo>>,
}

/// Composes providers and exposes the trace/span lifecycle.
pub struct Tracer {
    providers: ProviderSet,
    initialized: AtomicBool,
}

impl Tracer {
    /// Start building a tracer with an explicit provider stack.
    pub fn builder() -> TracerBuilder {
        TracerBuilder {
            providers: Vec::new(),
        }
    }

    /// A tracer with the standard provider stack (propagation, log,
    /// latency, call tracking) in the canonical order.
    pub fn with_default_providers() -> Self {
        Self::builder()
            .with_provider(Arc::new(PropagationProvider::new()))
            .with_provider(Arc::new(LogProvider::new()))
            .with_provider(Arc::new(LatencyProvider::new()))
            .with_provider(Arc::new(CallTrackerProvider::new()))
            .build()
    }

    /// Initialize all providers for `service`.
    ///
    /// Idempotent: repeat calls after a successful init are no-ops. On
    /// failure every already-initialized provider is closed before the
    /// error is returned.
    pub fn init(&self, ctx: &Context, service: &str) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            tracing::debug!(service, "tracer already initialized");
            return Ok(());
        }
        self.providers.init(ctx, service)?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Close all providers, in reverse registration order.
    pub fn close(&self, ctx: &Context) {
        if self.initialized.swap(false, Ordering::AcqRel) {
            self.providers.close(ctx);
        }
    }

    /// Begin a trace, resuming a propagated parent found in `headers`.
    pub fn start_trace(&self, ctx: &Context, name: &str, headers: &Headers) -> Context {
        self.providers.start_trace(ctx, name, headers)
    }

    /// Finalize the trace.
    pub fn end_trace(&self, ctx: &Context) {
        self.providers.end_trace(ctx);
    }

    /// Attach metadata to the trace root.
    pub fn add_trace_info(&self, ctx: &Context, fields: &[Field]) {
        self.providers.add_trace_info(ctx, fields);
    }

    /// Begin a child unit of work.
    pub fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        span_type: SpanType,
        args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        self.providers.start_span(ctx, name, span_type, args)
    }

    /// Finalize a span. Safe to call twice; providers guard re-entry.
    pub fn end_span(&self, ctx: &Context, span_type: SpanType) {
        self.providers.end_span(ctx, span_type);
    }

    /// Attach metadata to the current span.
    pub fn add_span_info(&self, ctx: &Context, span_type: SpanType, fields: &[Field]) {
        self.providers.add_span_info(ctx, span_type, fields);
    }

    /// Record the current span's error outcome.
    pub fn set_span_status(
        &self,
        ctx: &Context,
        span_type: SpanType,
        err: Option<&(dyn Error + 'static)>,
    ) {
        self.providers.set_span_status(ctx, span_type, err);
    }

    /// The current trace identity, aggregated across providers.
    pub fn info(&self, ctx: &Context) -> TraceInfo {
        let mut info = TraceInfo::default();
        self.providers.current_info(ctx, &mut info);
        info
    }

    /// Outbound propagation headers for the current span.
    pub fn headers(&self, ctx: &Context) -> Headers {
        let mut headers = Headers::new();
        self.providers.current_headers(ctx, &mut headers);
        headers
    }

    /// Pin the current trace to full sampling, where supported.
    pub fn force_trace(&self, ctx: &Context) {
        self.providers.force_trace(ctx);
    }

    /// Override the current trace's inverse sample rate, where supported.
    pub fn set_current_sample_rate(&self, ctx: &Context, rate: u32) {
        self.providers.set_sample_rate(ctx, rate);
    }

    /// Install a presend hook on every provider supporting one.
    pub fn set_presend_hook(&self, hook: PresendHook) {
        self.providers.set_presend_hook(hook);
    }
}

/// Builds a [`Tracer`] from providers in registration order.
///
/// Order is significant: start operations run first-to-last, end
/// operations last-to-first.
pub struct TracerBuilder {
    providers: Vec<Arc<dyn TraceProvider>>,
}

impl TracerBuilder {
    pub fn with_provider(mut self, provider: Arc<dyn TraceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> Tracer {
        Tracer {
            providers: ProviderSet::new(self.providers),
            initialized: AtomicBool::new(false),
        }
    }
}

static GLOBAL_TRACER: Lazy<Tracer> = Lazy::new(Tracer::with_default_providers);

/// The process-global tracer with the default provider stack.
///
/// Constructed eagerly on first use; callers still initialize it
/// explicitly with [`Tracer::init`].
pub fn global() -> &'static Tracer {
    &GLOBAL_TRACER
}
