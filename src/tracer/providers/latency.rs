// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Latency-reporting provider.
//!
//! When a call-like span ends, reports the closed call's latency to the
//! configured [`LatencyRecorder`]. Must be registered *before* the
//! call-tracking provider so that reverse-order teardown closes the call
//! first; an unclosed call reports nothing.

use std::sync::{Arc, RwLock};

use crate::call::CallInfo;
use crate::context::Context;
use crate::error::Result;
use crate::metrics::{self, LatencyRecorder};
use crate::tracer::provider::TraceProvider;
use crate::tracer::span::SpanType;

/// Reports finished call latency to a metrics recorder.
pub struct LatencyProvider {
    service: RwLock<String>,
    recorder: RwLock<Option<Arc<dyn LatencyRecorder>>>,
}

impl LatencyProvider {
    /// Report through the process-global recorder.
    pub fn new() -> Self {
        Self {
            service: RwLock::new(String::new()),
            recorder: RwLock::new(None),
        }
    }

    /// Report through a specific recorder instead of the global one.
    pub fn with_recorder(recorder: Arc<dyn LatencyRecorder>) -> Self {
        Self {
            service: RwLock::new(String::new()),
            recorder: RwLock::new(Some(recorder)),
        }
    }

    fn recorder(&self) -> Arc<dyn LatencyRecorder> {
        self.recorder
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(metrics::global_recorder)
    }
}

impl Default for LatencyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceProvider for LatencyProvider {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn init(&self, _ctx: &Context, service: &str) -> Result<()> {
        *self.service.write().unwrap() = service.to_string();
        Ok(())
    }

    fn end_span(&self, ctx: &Context, span_type: SpanType) {
        if !span_type.is_call() {
            return;
        }
        if let Some(info) = ctx.value::<CallInfo>() {
            let service = self.service.read().unwrap().clone();
            info.report_latency(&service, self.recorder().as_ref());
        }
    }
}
