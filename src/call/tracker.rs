// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Context-scoped call tracking.
//!
//! The tracker layers one [`CallInfo`] per call frame onto the execution
//! [`Context`]. Nesting is implicit: starting a call inside another call's
//! context shadows the outer record, and [`CallTracker::info`] always
//! resolves the nearest-enclosing one. Ending the inner call leaves the
//! outer context untouched, so concurrent and nested call trees never need
//! coordination.
//!
//! Cleanup runs on all exit paths. [`CallTracker::in_call`] brackets a
//! closure, converts an unwind into a `"panic"` error outcome on the record,
//! and re-raises the original payload unchanged. [`CallScope`] is the RAII
//! variant for callers who cannot use a closure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::call::CallInfo;
use crate::call::CallOption;
use crate::context::Context;
use crate::fields::{Field, StartCallArg};

/// Tracks calls scoped to an execution context.
///
/// Stateless; all per-call state lives in the context and the shared
/// [`CallInfo`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallTracker;

impl CallTracker {
    pub fn new() -> Self {
        Self
    }

    /// Start a call and return the derived context carrying it.
    ///
    /// Each argument is probed for the option capability: [`CallOption`]s
    /// configure the record, plain [`Field`]s become annotations.
    pub fn start_call(
        &self,
        ctx: &Context,
        name: &str,
        args: &[Arc<dyn StartCallArg>],
    ) -> Context {
        let info = Arc::new(CallInfo::new());
        info.start(name);

        for arg in args {
            if let Some(option) = arg.as_any().downcast_ref::<CallOption>() {
                option.apply(&info);
            } else if let Some(field) = arg.as_any().downcast_ref::<Field>() {
                info.add_args([field.clone()]);
            } else {
                tracing::debug!(call = name, "ignoring unrecognized start_call argument");
            }
        }

        ctx.with_shared(info)
    }

    /// The nearest-enclosing call record, or `None` outside any call.
    pub fn info(&self, ctx: &Context) -> Option<Arc<CallInfo>> {
        ctx.value::<CallInfo>()
    }

    /// End the current call.
    ///
    /// A missing record is a caller bug but never a crash: tracing must not
    /// take down the code it instruments, so this degrades to a debug log.
    pub fn end_call(&self, ctx: &Context) {
        match self.info(ctx) {
            Some(info) => info.end(),
            None => tracing::debug!("end_call without a call in scope"),
        }
    }

    /// Run `body` inside a new call frame, ending the call on every exit
    /// path.
    ///
    /// If `body` panics, the panic value is recorded on the call
    /// (`kind = "panic"`, with a captured stack trace) and then re-raised
    /// unchanged, so callers observe exactly the payload they would without
    /// tracing.
    pub fn in_call<T>(
        &self,
        ctx: &Context,
        name: &str,
        args: &[Arc<dyn StartCallArg>],
        body: impl FnOnce(&Context) -> T,
    ) -> T {
        let call_ctx = self.start_call(ctx, name, args);
        // The record is guaranteed present: start_call just layered it.
        let info = self.info(&call_ctx).expect("call record just created");

        match panic::catch_unwind(AssertUnwindSafe(|| body(&call_ctx))) {
            Ok(value) => {
                info.end();
                value
            }
            Err(payload) => {
                info.set_panic(&panic_message(payload.as_ref()), None);
                info.end();
                panic::resume_unwind(payload);
            }
        }
    }

    /// Start a call whose end is tied to a guard's drop.
    ///
    /// The guard ends the call when dropped; if the thread is unwinding at
    /// that point the record is marked as panicked first. Unlike
    /// [`CallTracker::in_call`] the panic *value* is not observable from a
    /// destructor, only the fact of the panic.
    pub fn start_scoped(
        &self,
        ctx: &Context,
        name: &str,
        args: &[Arc<dyn StartCallArg>],
    ) -> CallScope {
        let call_ctx = self.start_call(ctx, name, args);
        let info = self.info(&call_ctx).expect("call record just created");
        CallScope {
            ctx: call_ctx,
            info,
        }
    }
}

/// RAII guard ending a tracked call on drop.
#[derive(Debug)]
pub struct CallScope {
    ctx: Context,
    info: Arc<CallInfo>,
}

impl CallScope {
    /// The context carrying this call, for starting nested work.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The call record, for annotations and status.
    pub fn info(&self) -> &Arc<CallInfo> {
        &self.info
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        if std::thread::panicking() && self.info.error_info().is_none() {
            self.info.set_panic("panic during call", None);
        }
        self.info.end();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
