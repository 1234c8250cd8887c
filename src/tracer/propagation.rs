// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace identity and cross-process context propagation.
//!
//! Every trace has a 128-bit [`TraceId`] shared by all of its spans; every
//! span has a 64-bit [`SpanId`]. The serialized span context travels
//! between processes in the `x-trace-context` header:
//!
//! ```text
//! x-trace-context: v1;trace_id=<32 hex>;parent_id=<16 hex>;sample_rate=<n>
//! ```
//!
//! A secondary `x-force-trace` header requests full sampling for the
//! request. Parsing is tolerant: anything malformed falls back to starting
//! a fresh trace rather than erroring.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

/// Header carrying the serialized span context.
pub const TRACE_CONTEXT_HEADER: &str = "x-trace-context";

/// Header requesting full sampling for this request.
pub const FORCE_TRACE_HEADER: &str = "x-force-trace";

/// Propagation headers, conceptually HTTP/gRPC metadata.
pub type Headers = HashMap<String, Vec<String>>;

/// Fetch the first value of a header, case-sensitively by the lowercase key.
pub fn header_value<'a>(headers: &'a Headers, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|v| v.first()).map(String::as_str)
}

/// 128-bit trace identifier, shared by all spans of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generate a random trace id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for TraceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 64-bit span identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a random span id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_u128() as u64)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for SpanId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The wire form of a span context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireContext {
    pub trace_id: TraceId,
    /// The sender's span id; the receiver's root span parents onto it.
    pub parent_id: SpanId,
    /// Inverse sample rate in effect for the trace (1 = always).
    pub sample_rate: u32,
}

impl WireContext {
    /// Serialize to the `x-trace-context` value format.
    pub fn encode(&self) -> String {
        format!(
            "v1;trace_id={};parent_id={};sample_rate={}",
            self.trace_id, self.parent_id, self.sample_rate
        )
    }

    /// Parse an `x-trace-context` value. Returns `None` for anything
    /// malformed or from an unknown version.
    pub fn decode(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        if parts.next() != Some("v1") {
            return None;
        }

        let mut trace_id = None;
        let mut parent_id = None;
        let mut sample_rate = 1u32;
        for part in parts {
            let (key, val) = part.split_once('=')?;
            match key {
                "trace_id" => trace_id = TraceId::from_str(val).ok(),
                "parent_id" => parent_id = SpanId::from_str(val).ok(),
                "sample_rate" => sample_rate = val.parse().ok()?,
                // Unknown keys from newer peers are skipped.
                _ => {}
            }
        }

        Some(Self {
            trace_id: trace_id?,
            parent_id: parent_id?,
            sample_rate,
        })
    }

    /// Extract a wire context and force-trace flag from incoming headers.
    pub fn extract(headers: &Headers) -> (Option<Self>, bool) {
        let wire = header_value(headers, TRACE_CONTEXT_HEADER).and_then(Self::decode);
        let forced = header_value(headers, FORCE_TRACE_HEADER)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        (wire, forced)
    }

    /// Write this context (and the force flag) into outgoing headers.
    pub fn inject(&self, forced: bool, headers: &mut Headers) {
        headers.insert(TRACE_CONTEXT_HEADER.to_string(), vec![self.encode()]);
        if forced {
            headers.insert(FORCE_TRACE_HEADER.to_string(), vec!["1".to_string()]);
        }
    }
}
