// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Immutable execution context with typed value scoping.
//!
//! A [`Context`] is a persistent key/value scope threaded through every call
//! and span operation. Deriving a child context with [`Context::with_value`]
//! layers one typed value over the parent without mutating it, so concurrent
//! call trees sharing an ancestor are isolated without any locking.
//!
//! Keys are capability types: a value of type `T` is stored and looked up by
//! `TypeId::of::<T>()`, and lookup resolves the *nearest-enclosing* layer.
//! This is how nested calls find their implicit parent - the tracker layers
//! a new call record per frame and `value::<T>()` always sees the innermost.
//!
//! ```rust
//! use calltrace::context::Context;
//!
//! #[derive(Debug, PartialEq)]
//! struct RequestId(u64);
//!
//! let root = Context::background();
//! let ctx = root.with_value(RequestId(7));
//! assert_eq!(ctx.value::<RequestId>().unwrap().0, 7);
//! assert!(root.value::<RequestId>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// One layer of the context chain.
struct Layer {
    parent: Option<Context>,
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
}

/// An immutable, cheaply clonable execution context.
///
/// Cloning a `Context` is an `Arc` bump; derived contexts share their
/// ancestry. A `Context` and its children may cross thread boundaries.
#[derive(Clone)]
pub struct Context {
    head: Option<Arc<Layer>>,
}

impl Context {
    /// The empty root context.
    pub fn background() -> Self {
        Self { head: None }
    }

    /// Derive a child context carrying `value`, keyed by its type.
    ///
    /// The parent is untouched; lookups on the child resolve this value
    /// for `T`, shadowing any `T` stored in an enclosing layer.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        self.with_shared(Arc::new(value))
    }

    /// Like [`Context::with_value`] but layers an already-shared value.
    ///
    /// Used when the same record must be visible both through the context
    /// and through a handle the caller retains (e.g. a call record).
    pub fn with_shared<T: Any + Send + Sync>(&self, value: Arc<T>) -> Self {
        Self {
            head: Some(Arc::new(Layer {
                parent: Some(self.clone()),
                key: TypeId::of::<T>(),
                value,
            })),
        }
    }

    /// Look up the nearest-enclosing value of type `T`, if any.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let want = TypeId::of::<T>();
        let mut cursor = self.head.as_ref();
        while let Some(layer) = cursor {
            if layer.key == want {
                // Key equality guarantees the downcast succeeds.
                return layer.value.clone().downcast::<T>().ok();
            }
            cursor = layer.parent.as_ref().and_then(|p| p.head.as_ref());
        }
        None
    }

    /// True if this is the empty root context.
    pub fn is_background(&self) -> bool {
        self.head.is_none()
    }

    /// Number of layers above the root. Mainly useful in tests.
    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.head.as_ref();
        while let Some(layer) = cursor {
            n += 1;
            cursor = layer.parent.as_ref().and_then(|p| p.head.as_ref());
        }
        n
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("depth", &self.depth()).finish()
    }
}
