// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Concrete trace provider implementations.
//!
//! The default stack, in registration order:
//!
//! 1. [`PropagationProvider`] - trace identity, headers, sampling
//! 2. [`LogProvider`] - structured event per finished call span
//! 3. [`LatencyProvider`] - histogram observation per finished call
//! 4. [`CallTrackerProvider`] - the call records themselves
//!
//! Registration order matters because teardown runs in reverse: the call
//! tracker closes the call first, then latency reads the closed record,
//! then the log provider emits its final state.

pub mod call_tracker;
pub mod latency;
pub mod log;
pub mod propagation;

pub use call_tracker::{current_call, CallTrackerProvider};
pub use latency::LatencyProvider;
pub use log::LogProvider;
pub use propagation::{PropagationProvider, SpanState, TraceRoot};
