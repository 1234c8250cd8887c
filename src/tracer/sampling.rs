// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deterministic hash-based trace sampling.
//!
//! The decision is a pure function of the trace id and the inverse sample
//! rate, so every service observing the same trace makes the same call -
//! a distributed trace is either kept everywhere or dropped everywhere.

use sha2::{Digest, Sha256};

use crate::tracer::propagation::TraceId;

/// Decide whether a trace should be sampled at 1-in-`rate`.
///
/// Rate 0 and 1 both mean "always". The decision hashes the trace id, so
/// it is stable across processes and repeat evaluations.
pub fn should_sample(trace_id: TraceId, rate: u32) -> bool {
    if rate <= 1 {
        return true;
    }
    let digest = Sha256::digest(trace_id.to_string().as_bytes());
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    value % rate == 0
}
