// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ordered fan-out of lifecycle operations across providers.
//!
//! The central invariant is the ordering duality: start-side operations run
//! in registration (forward) order with each provider's output context
//! feeding the next, while end-side operations (`end_trace`, `end_span`,
//! `close`, init rollback) run in reverse. That bracket discipline means
//! the first provider's setup is the last torn down, so providers that
//! depend on earlier providers' state see it fully populated when they act.

use std::error::Error;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::fields::{Field, StartCallArg};
use crate::tracer::propagation::Headers;
use crate::tracer::provider::{PresendHook, TraceProvider};
use crate::tracer::span::SpanType;
use crate::tracer::TraceInfo;

/// An ordered, immutable set of providers.
pub struct ProviderSet {
    providers: Vec<Arc<dyn TraceProvider>>,
}

impl ProviderSet {
    pub fn new(providers: Vec<Arc<dyn TraceProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Initialize providers in order.
    ///
    /// If one fails, every provider initialized before it is closed in
    /// reverse order before the error is returned - no partial provider
    /// state leaks.
    pub fn init(&self, ctx: &Context, service: &str) -> Result<()> {
        for (idx, provider) in self.providers.iter().enumerate() {
            if let Err(err) = provider.init(ctx, service) {
                for initialized in self.providers[..idx].iter().rev() {
                    initialized.close(ctx);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Close all providers in reverse order.
    pub fn close(&self, ctx: &Context) {
        for provider in self.providers.iter().rev() {
            provider.close(ctx);
        }
    }

    pub fn start_trace(&self, ctx: &Context, name: &str, headers: &Headers) -> Context {
        self.providers
            .iter()
            .fold(ctx.clone(), |ctx, p| p.start_trace(ctx, name, headers))
    }

    pub fn end_trace(&self, ctx: &Context) {
        for provider in self.providers.iter().rev() {
            provider.end_trace(ctx);
        }
    }

    pub fn add_trace_info(&self, ctx: &Context, fields: &[Field]) {
        for provider in &self.providers {
            provider.add_trace_info(ctx, fields);
        }
    }

    pub fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        span_type: SpanType,
        args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        self.providers
            .iter()
            .fold(ctx.clone(), |ctx, p| p.start_span(ctx, name, span_type, args))
    }

    pub fn end_span(&self, ctx: &Context, span_type: SpanType) {
        for provider in self.providers.iter().rev() {
            provider.end_span(ctx, span_type);
        }
    }

    pub fn add_span_info(&self, ctx: &Context, span_type: SpanType, fields: &[Field]) {
        for provider in &self.providers {
            provider.add_span_info(ctx, span_type, fields);
        }
    }

    pub fn set_span_status(
        &self,
        ctx: &Context,
        span_type: SpanType,
        err: Option<&(dyn Error + 'static)>,
    ) {
        for provider in &self.providers {
            provider.set_span_status(ctx, span_type, err);
        }
    }

    pub fn current_info(&self, ctx: &Context, info: &mut TraceInfo) {
        for provider in &self.providers {
            provider.current_info(ctx, info);
        }
    }

    pub fn current_headers(&self, ctx: &Context, headers: &mut Headers) {
        for provider in &self.providers {
            provider.current_headers(ctx, headers);
        }
    }

    /// Forward `force_trace` to every provider with sampling control.
    pub fn force_trace(&self, ctx: &Context) {
        for provider in &self.providers {
            if let Some(control) = provider.sample_control() {
                control.force_trace(ctx);
            }
        }
    }

    /// Forward a sample-rate override to every provider with sampling
    /// control.
    pub fn set_sample_rate(&self, ctx: &Context, rate: u32) {
        for provider in &self.providers {
            if let Some(control) = provider.sample_control() {
                control.set_sample_rate(ctx, rate);
            }
        }
    }

    /// Install a presend hook on every provider supporting one.
    pub fn set_presend_hook(&self, hook: PresendHook) {
        for provider in &self.providers {
            if let Some(control) = provider.presend_hook_control() {
                control.set_presend_hook(hook.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TracerError;
    use std::sync::Mutex;

    /// Records the order in which its lifecycle methods run.
    struct RecordingProvider {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_init: bool,
    }

    impl RecordingProvider {
        fn new(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                tag,
                log,
                fail_init: false,
            })
        }

        fn failing(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                tag,
                log,
                fail_init: true,
            })
        }

        fn record(&self, op: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.tag, op));
        }
    }

    impl TraceProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn init(&self, _ctx: &Context, _service: &str) -> Result<()> {
            if self.fail_init {
                return Err(TracerError::provider_init(self.tag, "forced failure"));
            }
            self.record("init");
            Ok(())
        }

        fn close(&self, _ctx: &Context) {
            self.record("close");
        }

        fn start_span(
            &self,
            ctx: Context,
            _name: &str,
            _span_type: SpanType,
            _args: &[Arc<dyn StartCallArg>],
        ) -> Context {
            self.record("start_span");
            ctx
        }

        fn end_span(&self, _ctx: &Context, _span_type: SpanType) {
            self.record("end_span");
        }
    }

    #[test]
    fn test_start_forward_end_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ProviderSet::new(vec![
            RecordingProvider::new("a", log.clone()),
            RecordingProvider::new("b", log.clone()),
        ]);

        let ctx = Context::background();
        let ctx = set.start_span(&ctx, "s", SpanType::Sync, &[]);
        set.end_span(&ctx, SpanType::Sync);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start_span", "b:start_span", "b:end_span", "a:end_span"]
        );
    }

    #[test]
    fn test_init_failure_rolls_back_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ProviderSet::new(vec![
            RecordingProvider::new("a", log.clone()),
            RecordingProvider::failing("b", log.clone()),
            RecordingProvider::new("c", log.clone()),
        ]);

        let err = set.init(&Context::background(), "svc").unwrap_err();
        assert!(matches!(err, TracerError::ProviderInit { .. }));

        // #1 initialized and was closed exactly once; #3 never touched.
        assert_eq!(*log.lock().unwrap(), vec!["a:init", "a:close"]);
    }

    #[test]
    fn test_init_rollback_multiple_predecessors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ProviderSet::new(vec![
            RecordingProvider::new("a", log.clone()),
            RecordingProvider::new("b", log.clone()),
            RecordingProvider::failing("c", log.clone()),
        ]);

        assert!(set.init(&Context::background(), "svc").is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:init", "b:init", "b:close", "a:close"]
        );
    }

    #[test]
    fn test_close_runs_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ProviderSet::new(vec![
            RecordingProvider::new("a", log.clone()),
            RecordingProvider::new("b", log.clone()),
        ]);

        set.close(&Context::background());
        assert_eq!(*log.lock().unwrap(), vec!["b:close", "a:close"]);
    }
}
