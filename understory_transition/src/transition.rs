// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handle to one in-flight native view transition.

use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::TransitionError;

/// A lifecycle awaitable of a native transition. Clones share the outcome.
pub type Lifecycle = Shared<LocalBoxFuture<'static, Result<(), TransitionError>>>;

/// Handle returned by [`ViewTransitionApi::start`](crate::host::ViewTransitionApi::start).
///
/// Exposes the three lifecycle awaitables of the native primitive and its skip
/// operation. The driver owns the handle for the duration of one transition
/// and lends clones to listeners through
/// [`TransitionEvent`](crate::events::TransitionEvent); nothing retains it
/// once the transition has finished.
#[derive(Clone)]
pub struct TransitionHandle {
    ready: Lifecycle,
    update_callback_done: Lifecycle,
    finished: Lifecycle,
    skip: Rc<dyn Fn()>,
}

impl core::fmt::Debug for TransitionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransitionHandle")
            .field("ready", &self.ready.peek())
            .field("update_callback_done", &self.update_callback_done.peek())
            .field("finished", &self.finished.peek())
            .finish_non_exhaustive()
    }
}

impl TransitionHandle {
    /// Assemble a handle from the native primitive's awaitables.
    pub fn new(
        ready: impl Future<Output = Result<(), TransitionError>> + 'static,
        update_callback_done: impl Future<Output = Result<(), TransitionError>> + 'static,
        finished: impl Future<Output = Result<(), TransitionError>> + 'static,
        skip: impl Fn() + 'static,
    ) -> Self {
        Self {
            ready: ready.boxed_local().shared(),
            update_callback_done: update_callback_done.boxed_local().shared(),
            finished: finished.boxed_local().shared(),
            skip: Rc::new(skip),
        }
    }

    /// Resolves once the pseudo-element tree is built and the animation is about to run.
    pub fn ready(&self) -> Lifecycle {
        self.ready.clone()
    }

    /// Resolves once the update callback has completed.
    pub fn update_callback_done(&self) -> Lifecycle {
        self.update_callback_done.clone()
    }

    /// Resolves once the animation has finished and the new view is interactive.
    pub fn finished(&self) -> Lifecycle {
        self.finished.clone()
    }

    /// Skip the animation; the update callback still runs.
    pub fn skip_transition(&self) {
        (self.skip)();
    }
}
