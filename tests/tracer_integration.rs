// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end tests for the tracer façade with the full provider stack.

use std::sync::{Arc, Mutex};

use calltrace::context::Context;
use calltrace::error::TracerError;
use calltrace::fields::arg;
use calltrace::metrics::{HistogramFamily, MemoryRecorder};
use calltrace::status::{StatusCategory, UNKNOWN_ERROR};
use calltrace::tracer::providers::{
    CallTrackerProvider, LatencyProvider, LogProvider, PropagationProvider,
};
use calltrace::tracer::{Headers, SpanType, TraceProvider, Tracer};

/// The canonical stack with an inspectable recorder.
fn tracer_with_recorder() -> anyhow::Result<(Tracer, Arc<MemoryRecorder>)> {
    let recorder = Arc::new(MemoryRecorder::new());
    let tracer = Tracer::builder()
        .with_provider(Arc::new(PropagationProvider::new()))
        .with_provider(Arc::new(LogProvider::new()))
        .with_provider(Arc::new(LatencyProvider::with_recorder(recorder.clone())))
        .with_provider(Arc::new(CallTrackerProvider::new()))
        .build();
    tracer.init(&Context::background(), "testapp")?;
    Ok((tracer, recorder))
}

#[test]
fn http_span_with_error_reports_one_http_sample() -> anyhow::Result<()> {
    let (tracer, recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(&trace_ctx, "get_user", SpanType::InboundHttp, &[]);

    let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    tracer.set_span_status(&span_ctx, SpanType::InboundHttp, Some(&err));

    tracer.end_span(&span_ctx, SpanType::InboundHttp);
    tracer.end_trace(&trace_ctx);

    assert_eq!(recorder.family_count(HistogramFamily::HttpRequestHandled), 1);
    assert_eq!(recorder.family_count(HistogramFamily::GrpcRequestHandled), 0);
    assert_eq!(recorder.family_count(HistogramFamily::OutboundCallSeconds), 0);

    let series = recorder.family_series(HistogramFamily::HttpRequestHandled);
    let (labels, metrics) = &series[0];
    assert_eq!(metrics.count, 1);
    assert_eq!(labels.app, "testapp");
    assert_eq!(labels.call, "get_user");
    assert_eq!(labels.statuscode, UNKNOWN_ERROR);
    assert_eq!(labels.statuscategory, StatusCategory::ServerError);
    Ok(())
}

#[test]
fn double_end_span_reports_once() -> anyhow::Result<()> {
    let (tracer, recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(&trace_ctx, "call", SpanType::InboundGrpc, &[]);
    tracer.end_span(&span_ctx, SpanType::InboundGrpc);
    tracer.end_span(&span_ctx, SpanType::InboundGrpc);

    assert_eq!(recorder.family_count(HistogramFamily::GrpcRequestHandled), 1);
    Ok(())
}

#[test]
fn generic_call_reports_no_latency() -> anyhow::Result<()> {
    let (tracer, recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(&trace_ctx, "reindex", SpanType::GenericCall, &[]);
    tracer.end_span(&span_ctx, SpanType::GenericCall);

    for family in [
        HistogramFamily::HttpRequestHandled,
        HistogramFamily::GrpcRequestHandled,
        HistogramFamily::OutboundCallSeconds,
    ] {
        assert_eq!(recorder.family_count(family), 0);
    }
    // But the call itself was tracked and timed.
    let info = tracer.info(&span_ctx);
    let call = info.call.unwrap();
    assert!(call.is_closed());
    assert!(call.service_seconds() >= 0.0);
    Ok(())
}

#[test]
fn nested_spans_share_trace_and_parent_correctly() -> anyhow::Result<()> {
    let (tracer, _recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let root = tracer.info(&trace_ctx);

    let outer_ctx = tracer.start_span(&trace_ctx, "outer", SpanType::GenericCall, &[]);
    let outer = tracer.info(&outer_ctx);
    let inner_ctx = tracer.start_span(&outer_ctx, "inner", SpanType::GenericCall, &[]);
    let inner = tracer.info(&inner_ctx);

    assert_eq!(outer.trace_id, root.trace_id);
    assert_eq!(inner.trace_id, root.trace_id);
    assert_eq!(outer.parent_id, root.span_id);
    assert_eq!(inner.parent_id, outer.span_id);

    std::thread::sleep(std::time::Duration::from_millis(5));
    tracer.end_span(&inner_ctx, SpanType::GenericCall);

    // Ending the inner span leaves the outer call open and retrievable.
    let outer_call = tracer.info(&outer_ctx).call.unwrap();
    assert!(!outer_call.is_closed());
    assert_eq!(outer_call.name(), "outer");

    tracer.end_span(&outer_ctx, SpanType::GenericCall);
    tracer.end_trace(&trace_ctx);

    for ctx in [&outer_ctx, &inner_ctx] {
        let seconds = tracer.info(ctx).call.unwrap().service_seconds();
        assert!((0.0..=0.1).contains(&seconds), "got {seconds}");
    }
    // The original background context carries no call at all.
    assert!(tracer.info(&Context::background()).call.is_none());
    Ok(())
}

#[test]
fn headers_round_trip_continues_the_trace() -> anyhow::Result<()> {
    let (tracer, _recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(&trace_ctx, "outbound", SpanType::Outbound, &[]);
    let origin = tracer.info(&span_ctx);

    let headers = tracer.headers(&span_ctx);

    // A downstream service resumes from the propagated headers.
    let (downstream, _recorder) = tracer_with_recorder()?;
    let remote_ctx = downstream.start_trace(&Context::background(), "remote", &headers);
    let resumed = downstream.info(&remote_ctx);

    assert_eq!(resumed.trace_id, origin.trace_id);
    assert_eq!(resumed.parent_id, origin.span_id);
    Ok(())
}

#[test]
fn force_trace_survives_propagation() -> anyhow::Result<()> {
    let (tracer, _recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    tracer.set_current_sample_rate(&trace_ctx, 1_000_000);
    tracer.force_trace(&trace_ctx);

    let headers = tracer.headers(&trace_ctx);
    assert!(headers.contains_key("x-force-trace"));
    assert!(headers.contains_key("x-trace-context"));
    Ok(())
}

#[test]
fn provider_init_failure_rolls_back_and_surfaces_error() {
    struct TouchyProvider {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
        tag: &'static str,
    }

    impl TraceProvider for TouchyProvider {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn init(&self, _ctx: &Context, _service: &str) -> Result<(), TracerError> {
            if self.fail {
                return Err(TracerError::provider_init(self.tag, "nope"));
            }
            self.log.lock().unwrap().push("init");
            Ok(())
        }

        fn close(&self, _ctx: &Context) {
            self.log.lock().unwrap().push("close");
        }
    }

    let first_log = Arc::new(Mutex::new(Vec::new()));
    let third_log = Arc::new(Mutex::new(Vec::new()));
    let tracer = Tracer::builder()
        .with_provider(Arc::new(TouchyProvider {
            log: first_log.clone(),
            fail: false,
            tag: "first",
        }))
        .with_provider(Arc::new(TouchyProvider {
            log: Arc::default(),
            fail: true,
            tag: "second",
        }))
        .with_provider(Arc::new(TouchyProvider {
            log: third_log.clone(),
            fail: false,
            tag: "third",
        }))
        .build();

    let err = tracer.init(&Context::background(), "testapp").unwrap_err();
    assert!(err.to_string().contains("second"));

    // First provider: initialized then closed exactly once. Third: untouched.
    assert_eq!(*first_log.lock().unwrap(), vec!["init", "close"]);
    assert!(third_log.lock().unwrap().is_empty());
}

#[test]
fn span_args_and_info_accumulate() -> anyhow::Result<()> {
    let (tracer, _recorder) = tracer_with_recorder()?;

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(
        &trace_ctx,
        "get_user",
        SpanType::InboundHttp,
        &[arg("user_id", 7)],
    );
    tracer.add_span_info(
        &span_ctx,
        SpanType::InboundHttp,
        &[calltrace::Field::new("cache", "miss")],
    );

    let call = tracer.info(&span_ctx).call.unwrap();
    assert_eq!(call.arg_count(), 2);
    Ok(())
}

#[tokio::test]
async fn async_span_may_outlive_the_trace() -> anyhow::Result<()> {
    let (tracer, recorder) = tracer_with_recorder()?;
    let tracer = Arc::new(tracer);

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    // The async span's work detaches from the request lifecycle.
    let span_ctx = tracer.start_span(&trace_ctx, "flush_audit", SpanType::GenericCall, &[]);

    let background = {
        let tracer = tracer.clone();
        let span_ctx = span_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            tracer.end_span(&span_ctx, SpanType::GenericCall);
        })
    };

    // The trace finishes before the async span does.
    tracer.end_trace(&trace_ctx);
    background.await?;

    let call = tracer.info(&span_ctx).call.unwrap();
    assert!(call.is_closed());
    // Late ends are accepted and recorded, not rejected.
    assert!(call.service_seconds() > 0.0);
    let _ = recorder;
    Ok(())
}

#[tokio::test]
async fn late_async_span_end_is_accepted() -> anyhow::Result<()> {
    let (tracer, recorder) = tracer_with_recorder()?;
    let tracer = Arc::new(tracer);

    let trace_ctx = tracer.start_trace(&Context::background(), "req", &Headers::new());
    let span_ctx = tracer.start_span(&trace_ctx, "publish_events", SpanType::Async, &[]);
    let started = tracer.info(&span_ctx);
    assert!(started.trace_id.is_some());
    assert!(started.span_id.is_some());
    // Async spans carry trace identity but are not calls.
    assert!(started.call.is_none());

    let background = {
        let tracer = tracer.clone();
        let span_ctx = span_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            tracer.end_span(&span_ctx, SpanType::Async);
        })
    };

    tracer.end_trace(&trace_ctx);
    background.await?;

    // The late end is absorbed; identity is still resolvable afterwards
    // and no latency sample is emitted for a non-call span.
    let after = tracer.info(&span_ctx);
    assert_eq!(after.trace_id, started.trace_id);
    assert_eq!(after.span_id, started.span_id);
    for family in [
        HistogramFamily::HttpRequestHandled,
        HistogramFamily::GrpcRequestHandled,
        HistogramFamily::OutboundCallSeconds,
    ] {
        assert_eq!(recorder.family_count(family), 0);
    }
    Ok(())
}
