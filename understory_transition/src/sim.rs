// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless host for tests, benchmarks and demos.
//!
//! ## Overview
//!
//! Every host trait has an in-memory implementation here, and [`SimHost`]
//! bundles them with a [`LocalPool`] so that a whole navigation can be stepped
//! through deterministically:
//!
//! ```
//! use understory_transition::navigation::NavigationType;
//! use understory_transition::root::TransitionRoot;
//! use understory_transition::sim::SimHost;
//!
//! let mut host = SimHost::new();
//! let root = TransitionRoot::new(host.environment());
//! let transitions = root.setup();
//! transitions.classes(vec!["highlight".to_owned()], false);
//!
//! let mut nav = host.navigate(NavigationType::Link, "/", "/about");
//! host.run_until_stalled();
//! assert!(nav.is_unblocked());
//! assert!(host.document.has_class("highlight"));
//!
//! nav.complete();
//! host.run_until_stalled();
//! host.transitions.finish();
//! host.run_until_stalled();
//! assert!(!host.document.has_class("highlight"));
//! # drop(transitions);
//! ```
//!
//! The simulated primitive runs the update callback when its
//! `update_callback_done` awaitable is first polled, resolves `ready` right
//! after it, and resolves `finished` only when [`SimTransitionApi::finish`] is
//! called (or the transition is skipped), so tests can observe the
//! in-transition phase.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use kurbo::Rect;

use crate::error::{HostError, NavigationError, TransitionError};
use crate::host::{
    Environment, NavigateHandler, NavigateRegistration, NavigationHost, RootClassList,
    TransitionTarget, UpdateCallback, ViewTransitionApi, Viewport,
};
use crate::navigation::{Navigation, NavigationTarget, NavigationType};
use crate::transition::TransitionHandle;

#[derive(Default)]
struct RouterState {
    handlers: Vec<(u64, NavigateHandler)>,
    next_handler: u64,
    after: Vec<Box<dyn FnOnce()>>,
    settling: bool,
}

/// Simulated router.
///
/// [`after_navigate`](NavigationHost::after_navigate) queues its callback
/// until [`settle`](Self::settle) is called, and refuses with
/// [`HostError::Reentrant`] when called from inside a queued callback.
#[derive(Clone, Default)]
pub struct SimNavigationHost {
    state: Rc<RefCell<RouterState>>,
}

impl core::fmt::Debug for SimNavigationHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimNavigationHost")
            .field("handlers", &self.handler_count())
            .field("queued_after_navigate", &self.queued_count())
            .finish_non_exhaustive()
    }
}

impl SimNavigationHost {
    /// Create a router with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a navigation: run every interceptor handler and collect the
    /// delays they request.
    pub fn navigate(&self, navigation: Navigation) -> LocalBoxFuture<'static, ()> {
        let handlers: Vec<NavigateHandler> = self
            .state
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        let delays: Vec<_> = handlers
            .iter()
            .filter_map(|handler| handler(navigation.clone()))
            .collect();
        futures::future::join_all(delays).map(|_| ()).boxed_local()
    }

    /// Run every queued after-navigate callback. Returns how many ran.
    pub fn settle(&self) -> usize {
        let queued = {
            let mut state = self.state.borrow_mut();
            state.settling = true;
            core::mem::take(&mut state.after)
        };
        let ran = queued.len();
        for callback in queued {
            callback();
        }
        self.state.borrow_mut().settling = false;
        ran
    }

    /// Number of installed interceptor handlers.
    pub fn handler_count(&self) -> usize {
        self.state.borrow().handlers.len()
    }

    /// Number of after-navigate callbacks waiting for [`settle`](Self::settle).
    pub fn queued_count(&self) -> usize {
        self.state.borrow().after.len()
    }
}

impl NavigationHost for SimNavigationHost {
    fn on_navigate(&self, handler: NavigateHandler) -> NavigateRegistration {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_handler;
            state.next_handler += 1;
            state.handlers.push((id, handler));
            id
        };
        let state: Weak<RefCell<RouterState>> = Rc::downgrade(&self.state);
        Box::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().handlers.retain(|(h, _)| *h != id);
            }
        })
    }

    fn after_navigate(&self, callback: Box<dyn FnOnce()>) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.settling {
            return Err(HostError::Reentrant);
        }
        state.after.push(callback);
        Ok(())
    }
}

struct InFlight {
    finish: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct PrimitiveState {
    unsupported: bool,
    refuse_next: Option<TransitionError>,
    started: usize,
    in_flight: Vec<Rc<RefCell<InFlight>>>,
}

/// Simulated native view transition primitive.
#[derive(Clone, Default)]
pub struct SimTransitionApi {
    state: Rc<RefCell<PrimitiveState>>,
}

impl core::fmt::Debug for SimTransitionApi {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimTransitionApi")
            .field("supported", &!state.unsupported)
            .field("started", &state.started)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl SimTransitionApi {
    /// A primitive that is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// A primitive that reports itself unavailable.
    pub fn unsupported() -> Self {
        let api = Self::default();
        api.state.borrow_mut().unsupported = true;
        api
    }

    /// Make the next [`start`](ViewTransitionApi::start) fail with `error`.
    pub fn refuse_next(&self, error: TransitionError) {
        self.state.borrow_mut().refuse_next = Some(error);
    }

    /// Number of transitions started so far.
    pub fn started(&self) -> usize {
        self.state.borrow().started
    }

    /// Number of transitions whose `finished` awaitable is still open.
    pub fn in_flight(&self) -> usize {
        self.state
            .borrow()
            .in_flight
            .iter()
            .filter(|t| t.borrow().finish.is_some())
            .count()
    }

    /// Let every in-flight animation finish. Returns how many were released.
    pub fn finish(&self) -> usize {
        let in_flight = core::mem::take(&mut self.state.borrow_mut().in_flight);
        let mut released = 0;
        for transition in in_flight {
            if let Some(tx) = transition.borrow_mut().finish.take() {
                let _ = tx.send(());
                released += 1;
            }
        }
        released
    }
}

impl ViewTransitionApi for SimTransitionApi {
    fn is_supported(&self) -> bool {
        !self.state.borrow().unsupported
    }

    fn start(&self, update: UpdateCallback) -> Result<TransitionHandle, TransitionError> {
        let (tx, rx) = oneshot::channel();
        let transition = Rc::new(RefCell::new(InFlight { finish: Some(tx) }));
        {
            let mut state = self.state.borrow_mut();
            if let Some(error) = state.refuse_next.take() {
                return Err(error);
            }
            state.started += 1;
            state.in_flight.push(Rc::clone(&transition));
        }

        let skipped = Rc::new(Cell::new(false));
        let update_done: Shared<LocalBoxFuture<'static, Result<(), TransitionError>>> =
            async move { update().await }.boxed_local().shared();

        let ready = {
            let update_done = update_done.clone();
            let skipped = Rc::clone(&skipped);
            async move {
                update_done.await?;
                if skipped.get() {
                    Err(TransitionError::Skipped)
                } else {
                    Ok(())
                }
            }
        };
        let finished = {
            let update_done = update_done.clone();
            async move {
                update_done.await?;
                // A dropped sender means the primitive itself went away.
                let _ = rx.await;
                Ok(())
            }
        };
        let skip = {
            let weak = Rc::downgrade(&transition);
            move || {
                skipped.set(true);
                if let Some(transition) = weak.upgrade()
                    && let Some(tx) = transition.borrow_mut().finish.take()
                {
                    let _ = tx.send(());
                }
            }
        };
        Ok(TransitionHandle::new(ready, update_done, finished, skip))
    }
}

/// Simulated document root class list.
#[derive(Clone, Debug, Default)]
pub struct SimDocument {
    classes: Rc<RefCell<BTreeSet<String>>>,
}

impl SimDocument {
    /// Whether the root currently has `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.borrow().contains(class)
    }

    /// Current classes, sorted.
    pub fn classes(&self) -> Vec<String> {
        self.classes.borrow().iter().cloned().collect()
    }
}

impl RootClassList for SimDocument {
    fn add_classes(&self, classes: &[String]) {
        self.classes.borrow_mut().extend(classes.iter().cloned());
    }

    fn remove_classes(&self, classes: &[String]) {
        let mut current = self.classes.borrow_mut();
        for class in classes {
            current.remove(class);
        }
    }
}

#[derive(Debug)]
struct ElementState {
    name: Option<String>,
    bounds: Rect,
    writes: usize,
}

/// Simulated element. Clones refer to the same element.
#[derive(Clone, Debug)]
pub struct SimElement {
    state: Rc<RefCell<ElementState>>,
}

impl SimElement {
    /// Element laid out at `bounds` (viewport-relative).
    pub fn new(bounds: Rect) -> Self {
        Self {
            state: Rc::new(RefCell::new(ElementState {
                name: None,
                bounds,
                writes: 0,
            })),
        }
    }

    /// Current transition identifier.
    pub fn transition_name(&self) -> Option<String> {
        self.state.borrow().name.clone()
    }

    /// Move the element.
    pub fn set_bounds(&self, bounds: Rect) {
        self.state.borrow_mut().bounds = bounds;
    }

    /// How many times the identifier was written (set or cleared).
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }
}

impl TransitionTarget for SimElement {
    fn set_transition_name(&self, name: Option<&str>) {
        let mut state = self.state.borrow_mut();
        state.name = name.map(str::to_owned);
        state.writes += 1;
    }

    fn bounding_rect(&self) -> Rect {
        self.state.borrow().bounds
    }
}

/// Simulated window.
#[derive(Clone, Debug)]
pub struct SimViewport {
    rect: Rc<Cell<Rect>>,
}

impl SimViewport {
    /// Unscrolled window of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            rect: Rc::new(Cell::new(Rect::new(0.0, 0.0, width, height))),
        }
    }

    /// Scroll vertically to `y`.
    pub fn scroll_to(&self, y: f64) {
        let rect = self.rect.get();
        self.rect
            .set(Rect::new(rect.x0, y, rect.x1, y + rect.height()));
    }
}

impl Viewport for SimViewport {
    fn visible_rect(&self) -> Rect {
        self.rect.get()
    }
}

/// A navigation started with [`SimHost::navigate`].
pub struct PendingNavigation {
    navigation: Navigation,
    delay: Shared<LocalBoxFuture<'static, ()>>,
    completer: Option<oneshot::Sender<Result<(), NavigationError>>>,
}

impl core::fmt::Debug for PendingNavigation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingNavigation")
            .field("navigation", &self.navigation)
            .field("settled", &self.completer.is_none())
            .finish_non_exhaustive()
    }
}

impl PendingNavigation {
    /// The descriptor handed to the interceptor.
    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    /// Whether every interceptor delay has resolved, so the router may render.
    pub fn is_unblocked(&self) -> bool {
        self.delay.clone().now_or_never().is_some()
    }

    /// Resolve the navigation's completion signal successfully.
    pub fn complete(&mut self) {
        self.settle(Ok(()));
    }

    /// Resolve the navigation's completion signal with `error`.
    pub fn fail(&mut self, error: NavigationError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, result: Result<(), NavigationError>) {
        if let Some(tx) = self.completer.take() {
            let _ = tx.send(result);
        }
    }
}

/// All simulated collaborators plus the executor that drives them.
pub struct SimHost {
    /// Router.
    pub navigation: SimNavigationHost,
    /// Native primitive.
    pub transitions: SimTransitionApi,
    /// Document root.
    pub document: SimDocument,
    /// Window.
    pub viewport: SimViewport,
    pool: LocalPool,
}

impl core::fmt::Debug for SimHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimHost")
            .field("navigation", &self.navigation)
            .field("transitions", &self.transitions)
            .field("document", &self.document)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Host with the primitive available and an 800x600 window.
    pub fn new() -> Self {
        Self::with_transitions(SimTransitionApi::new())
    }

    /// Host using the given primitive.
    pub fn with_transitions(transitions: SimTransitionApi) -> Self {
        Self {
            navigation: SimNavigationHost::new(),
            transitions,
            document: SimDocument::default(),
            viewport: SimViewport::new(800.0, 600.0),
            pool: LocalPool::new(),
        }
    }

    /// Environment handing out these collaborators.
    pub fn environment(&self) -> Environment {
        Environment {
            navigation: Rc::new(self.navigation.clone()),
            transitions: Rc::new(self.transitions.clone()),
            root: Rc::new(self.document.clone()),
            viewport: Rc::new(self.viewport.clone()),
            spawner: Rc::new(self.pool.spawner()),
        }
    }

    /// Start a navigation from `from` to `to`. Its completion signal stays
    /// open until [`PendingNavigation::complete`] or
    /// [`PendingNavigation::fail`].
    pub fn navigate(&self, kind: NavigationType, from: &str, to: &str) -> PendingNavigation {
        let (tx, rx) = oneshot::channel::<Result<(), NavigationError>>();
        let navigation = Navigation::new(
            kind,
            Some(NavigationTarget::new(from)),
            Some(NavigationTarget::new(to)),
            async move { rx.await.unwrap_or(Err(NavigationError::Cancelled)) },
        );
        let delay = self.navigation.navigate(navigation.clone()).shared();
        PendingNavigation {
            navigation,
            delay,
            completer: Some(tx),
        }
    }

    /// Run spawned work until nothing can make progress.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Run the router's after-navigate callbacks, then spawned work.
    pub fn settle(&mut self) -> usize {
        let ran = self.navigation.settle();
        self.pool.run_until_stalled();
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn after_navigate_refuses_reentrant_use() {
        let host = SimNavigationHost::new();
        let inner = host.clone();
        let nested = Rc::new(Cell::new(None));
        let nested_in = Rc::clone(&nested);
        host.after_navigate(Box::new(move || {
            nested_in.set(Some(inner.after_navigate(Box::new(|| {}))));
        }))
        .unwrap();
        assert_eq!(host.queued_count(), 1);
        assert_eq!(host.settle(), 1);
        assert_eq!(nested.take(), Some(Err(HostError::Reentrant)));
        assert_eq!(host.queued_count(), 0);
    }

    #[test]
    fn registration_removes_the_handler() {
        let host = SimNavigationHost::new();
        let unregister = host.on_navigate(Rc::new(|_| None));
        assert_eq!(host.handler_count(), 1);
        unregister();
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn primitive_runs_update_then_waits_for_finish() {
        let api = SimTransitionApi::new();
        let ran = Rc::new(Cell::new(false));
        let ran_in = Rc::clone(&ran);
        let handle = api
            .start(Box::new(move || {
                async move {
                    ran_in.set(true);
                    Ok(())
                }
                .boxed_local()
            }))
            .unwrap();
        assert!(!ran.get());
        assert_eq!(block_on(handle.ready()), Ok(()));
        assert!(ran.get());
        assert!(handle.finished().now_or_never().is_none());
        assert_eq!(api.finish(), 1);
        assert_eq!(block_on(handle.finished()), Ok(()));
    }

    #[test]
    fn skipping_rejects_ready_and_finishes() {
        let api = SimTransitionApi::new();
        let handle = api
            .start(Box::new(|| async { Ok(()) }.boxed_local()))
            .unwrap();
        handle.skip_transition();
        assert_eq!(block_on(handle.ready()), Err(TransitionError::Skipped));
        assert_eq!(block_on(handle.finished()), Ok(()));
    }

    #[test]
    fn refused_start_and_viewport_scroll() {
        let api = SimTransitionApi::new();
        api.refuse_next(TransitionError::Aborted("busy".into()));
        assert!(api.start(Box::new(|| async { Ok(()) }.boxed_local())).is_err());
        assert_eq!(api.started(), 0);
        assert!(!SimTransitionApi::unsupported().is_supported());

        let viewport = SimViewport::new(800.0, 600.0);
        viewport.scroll_to(400.0);
        assert_eq!(viewport.visible_rect(), Rect::new(0.0, 400.0, 800.0, 1000.0));
    }
}
