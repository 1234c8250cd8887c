// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span kind classification.

use serde::Serialize;

use crate::call::CallType;

/// The kind of unit of work a span represents.
///
/// Call-like spans (`is_call()`) get call tracking and latency reporting;
/// pure tracing spans (`Sync`, `Async`) only exist for the trace tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    /// A synchronous tracing-only span.
    Sync,
    /// An asynchronous tracing-only span; may outlive its parent span and
    /// even the owning trace.
    Async,
    /// An inbound HTTP request.
    InboundHttp,
    /// An inbound gRPC request.
    InboundGrpc,
    /// An outbound call to another service.
    Outbound,
    /// A tracked call with no latency bucket of its own.
    GenericCall,
}

impl SpanType {
    /// True for spans that are tracked as calls.
    pub fn is_call(&self) -> bool {
        !matches!(self, Self::Sync | Self::Async)
    }

    /// The latency bucket for this span kind, if any.
    pub fn call_type(&self) -> Option<CallType> {
        match self {
            Self::InboundHttp => Some(CallType::Http),
            Self::InboundGrpc => Some(CallType::Grpc),
            Self::Outbound => Some(CallType::Outbound),
            Self::Sync | Self::Async | Self::GenericCall => None,
        }
    }

    /// Label value used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::InboundHttp => "inbound_http",
            Self::InboundGrpc => "inbound_grpc",
            Self::Outbound => "outbound",
            Self::GenericCall => "call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_call_predicate() {
        assert!(!SpanType::Sync.is_call());
        assert!(!SpanType::Async.is_call());
        assert!(SpanType::InboundHttp.is_call());
        assert!(SpanType::InboundGrpc.is_call());
        assert!(SpanType::Outbound.is_call());
        assert!(SpanType::GenericCall.is_call());
    }

    #[test]
    fn test_call_type_mapping() {
        assert_eq!(SpanType::InboundHttp.call_type(), Some(CallType::Http));
        assert_eq!(SpanType::InboundGrpc.call_type(), Some(CallType::Grpc));
        assert_eq!(SpanType::Outbound.call_type(), Some(CallType::Outbound));
        // Generic calls are tracked but report to no latency bucket.
        assert_eq!(SpanType::GenericCall.call_type(), None);
        assert_eq!(SpanType::Sync.call_type(), None);
    }
}
