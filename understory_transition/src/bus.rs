// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed publish/subscribe bus over the navigation lifecycle.
//!
//! ## Overview
//!
//! [`EventBus`] is a cheap, cloneable handle to a shared
//! [registry](crate::registry). Listeners are registered per
//! [`LifecycleEvent`] and receive that event's payload by reference.
//!
//! ## Emission
//!
//! [`EventBus::emit`] snapshots the active listeners of the kind, then
//! invokes them in activation order without holding any borrow of the
//! registry, so callbacks are free to register, deregister, or emit.
//!
//! - A listener registered during an emission is not invoked by it.
//! - A listener removed by an earlier callback of the same emission is skipped.
//! - A listener that returns an error or panics is logged and recorded in the
//!   [`EmitReport`]; its siblings still run.
//! - One-shot listeners (`AUTO_CLEAN`) are removed after their invocation,
//!   whatever its outcome.
//!
//! Panic isolation relies on unwinding. Targets built with `panic = "abort"`,
//! which includes `wasm32-unknown-unknown`, abort on a listener panic; only
//! returned errors are isolated there.
//!
//! ## Phase
//!
//! While a transition is in flight ([`EventBus::begin_transition`] until
//! [`EventBus::end_transition`]), registrations without
//! [`SubscribeOptions::REGISTER_DURING_TRANSITION`] are queued and only
//! become active once the transition has finished.
//!
//! ```
//! use understory_transition::bus::EventBus;
//! use understory_transition::events::BeforeNavigation;
//! use understory_transition::registry::SubscribeOptions;
//!
//! let bus = EventBus::new();
//! bus.begin_transition();
//! let id = bus.register::<BeforeNavigation, _>(|_| {}, SubscribeOptions::empty());
//! assert_eq!(bus.listener_count(id.kind()), 0);
//! assert_eq!(bus.end_transition(), 1);
//! assert_eq!(bus.listener_count(id.kind()), 1);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use crate::error::{IntoListenerResult, ListenerFailure};
use crate::events::{EventKind, LifecycleEvent};
use crate::registry::{
    EntryState, Listener, Phase, Registry, Snapshot, SubscribeOptions, SubscriptionId,
};

/// Outcome of one listener invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerOutcome {
    /// The subscription that was invoked.
    pub id: SubscriptionId,
    /// What happened.
    pub result: Result<(), ListenerFailure>,
}

/// Per-listener outcomes of one [`EventBus::emit`] call.
///
/// A [`ListenerFailure::Panicked`] outcome is only ever recorded where panics
/// unwind; see the [module docs](self).
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use = "the report carries listener failures"]
pub struct EmitReport {
    kind: EventKind,
    outcomes: Vec<ListenerOutcome>,
}

impl EmitReport {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            outcomes: Vec::new(),
        }
    }

    /// The emitted kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Outcomes in invocation order.
    pub fn outcomes(&self) -> &[ListenerOutcome] {
        &self.outcomes
    }

    /// Number of listeners the emission reached.
    pub fn invoked(&self) -> usize {
        self.outcomes.len()
    }

    /// Failed invocations.
    pub fn failures(&self) -> impl Iterator<Item = (SubscriptionId, &ListenerFailure)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.id, e)))
    }

    /// True if every reached listener succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Shared handle to the listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.registry.try_borrow() {
            Ok(registry) => f.debug_tuple("EventBus").field(&*registry).finish(),
            Err(_) => f.debug_tuple("EventBus").field(&"<emitting>").finish(),
        }
    }
}

/// Non-owning handle to an [`EventBus`].
///
/// Listeners that need to (de)register further listeners hold one of these,
/// since a strong handle stored inside the registry would keep it alive forever.
#[derive(Clone, Debug, Default)]
pub struct WeakEventBus {
    registry: Weak<RefCell<Registry>>,
}

impl WeakEventBus {
    /// Upgrade to a strong handle if the bus is still alive.
    pub fn upgrade(&self) -> Option<EventBus> {
        self.registry.upgrade().map(|registry| EventBus { registry })
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a non-owning handle.
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Register `callback` for `E`.
    ///
    /// The listener is active immediately, unless a transition is in flight
    /// and `options` lacks [`SubscribeOptions::REGISTER_DURING_TRANSITION`]:
    /// then it is queued and activated once the transition ends. The returned
    /// id is valid right away in both cases.
    ///
    /// [`SubscribeOptions::AUTO_WRAP`] is ignored here; see
    /// [`ViewTransitions::register`](crate::root::ViewTransitions::register).
    pub fn register<E, R>(
        &self,
        callback: impl FnMut(&E::Payload) -> R + 'static,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        E: LifecycleEvent,
        R: IntoListenerResult + 'static,
    {
        let id = self.reserve::<E, R>(callback, options.contains(SubscribeOptions::AUTO_CLEAN));
        self.settle(id, options.contains(SubscribeOptions::REGISTER_DURING_TRANSITION));
        id
    }

    /// Reserve a pending subscription without activating it.
    pub(crate) fn reserve<E, R>(
        &self,
        mut callback: impl FnMut(&E::Payload) -> R + 'static,
        auto_clean: bool,
    ) -> SubscriptionId
    where
        E: LifecycleEvent,
        R: IntoListenerResult + 'static,
    {
        let listener: Listener = Rc::new(RefCell::new(
            move |payload: &(dyn Any + 'static)| match payload.downcast_ref::<E::Payload>() {
                Some(payload) => callback(payload).into_listener_result(),
                // The registry only hands a listener payloads of its own kind.
                None => Ok(()),
            },
        ));
        let id = self
            .registry
            .borrow_mut()
            .reserve(E::KIND, listener, auto_clean);
        trace!(event = %E::KIND, ?id, auto_clean, "reserved listener");
        id
    }

    /// Activate a pending subscription, or queue it if a transition is in
    /// flight and `during_transition` is false. Returns `None` for removed ids.
    pub(crate) fn settle(&self, id: SubscriptionId, during_transition: bool) -> Option<EntryState> {
        let state = self.registry.borrow_mut().settle(id, during_transition);
        match state {
            Some(EntryState::Pending) => {
                trace!(event = %id.kind(), ?id, "listener queued until the transition ends");
            }
            Some(EntryState::Active) => trace!(event = %id.kind(), ?id, "listener active"),
            None => trace!(event = %id.kind(), ?id, "listener removed before activation"),
        }
        state
    }

    /// Remove a subscription, whatever its state. Unknown or stale ids are a
    /// no-op and return false.
    pub fn deregister(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.borrow_mut().remove(id);
        if removed {
            trace!(event = %id.kind(), ?id, "listener removed");
        }
        removed
    }

    /// Invoke every active listener of `E` with `payload`.
    pub fn emit<E: LifecycleEvent>(&self, payload: &E::Payload) -> EmitReport {
        let kind = E::KIND;
        let snapshot = self.registry.borrow().snapshot(kind);
        trace!(event = %kind, listeners = snapshot.len(), "emitting");

        let mut report = EmitReport::new(kind);
        for Snapshot {
            id,
            listener,
            auto_clean,
        } in snapshot
        {
            if !self.registry.borrow().is_active(id) {
                continue;
            }
            let result = invoke(&listener, payload);
            if auto_clean {
                self.registry.borrow_mut().remove(id);
            }
            if let Err(failure) = &result {
                error!(event = %kind, ?id, error = %failure, "listener failed");
            }
            report.outcomes.push(ListenerOutcome { id, result });
        }
        report
    }

    /// Enter the in-transition phase.
    pub fn begin_transition(&self) {
        if self.registry.borrow_mut().begin_transition() {
            debug!("transition started");
        } else {
            debug!("transition started while another is in flight");
        }
    }

    /// Leave the in-transition phase and activate every queued registration
    /// in the order it was made. Returns how many were activated.
    pub fn end_transition(&self) -> usize {
        let activated = self.registry.borrow_mut().end_transition();
        debug!(activated, "transition ended");
        activated
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.registry.borrow().phase()
    }

    /// True while a transition is in flight.
    pub fn is_transitioning(&self) -> bool {
        self.phase() == Phase::InTransition
    }

    /// State of a subscription, `None` once it has been removed.
    pub fn state(&self, id: SubscriptionId) -> Option<EntryState> {
        self.registry.borrow().state(id)
    }

    /// Number of active listeners for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry.borrow().active_count(kind)
    }

    /// Number of registrations queued until the current transition ends.
    pub fn pending_count(&self) -> usize {
        self.registry.borrow().deferred_count()
    }
}

fn invoke(listener: &Listener, payload: &(dyn Any + 'static)) -> Result<(), ListenerFailure> {
    let Ok(mut callback) = listener.try_borrow_mut() else {
        return Err(ListenerFailure::Busy);
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| (*callback)(payload))) {
        Ok(result) => result.map_err(ListenerFailure::from),
        Err(panic) => Err(ListenerFailure::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ListenerError, NavigationError};
    use crate::events::{
        AfterNavigationComplete, BeforeNavigation, BeforeStartViewTransition, NavigationEvent,
    };
    use crate::navigation::{Navigation, NavigationType};
    use std::cell::Cell;

    fn payload() -> NavigationEvent {
        NavigationEvent {
            navigation: Navigation::new(NavigationType::Link, None, None, async {
                Ok::<(), NavigationError>(())
            }),
        }
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnMut(&NavigationEvent) + 'static) {
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        (count, move |_: &NavigationEvent| inner.set(inner.get() + 1))
    }

    #[test]
    fn one_shot_listener_runs_exactly_once() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        let id = bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::AUTO_CLEAN);
        for _ in 0..5 {
            let _ = bus.emit::<BeforeNavigation>(&payload());
        }
        assert_eq!(count.get(), 1);
        assert_eq!(bus.state(id), None);
        assert_eq!(bus.listener_count(EventKind::BeforeNavigation), 0);
    }

    #[test]
    fn persistent_listener_runs_every_time() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::empty());
        for _ in 0..3 {
            let report = bus.emit::<BeforeNavigation>(&payload());
            assert_eq!(report.invoked(), 1);
        }
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn listeners_only_see_their_own_kind() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        bus.register::<AfterNavigationComplete, _>(cb, SubscribeOptions::empty());
        let report = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(report.invoked(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn deregistering_unknown_ids_is_a_noop() {
        let bus = EventBus::new();
        let other = EventBus::new();
        let foreign = other.register::<BeforeNavigation, _>(|_| {}, SubscribeOptions::empty());
        assert!(!bus.deregister(foreign));
        let id = bus.register::<BeforeNavigation, _>(|_| {}, SubscribeOptions::empty());
        assert!(bus.deregister(id));
        assert!(!bus.deregister(id));
    }

    #[test]
    fn same_closure_registered_twice_gets_distinct_handles() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let make = || {
            let count = Rc::clone(&count);
            move |_: &NavigationEvent| count.set(count.get() + 1)
        };
        let a = bus.register::<BeforeNavigation, _>(make(), SubscribeOptions::empty());
        let b = bus.register::<BeforeNavigation, _>(make(), SubscribeOptions::AUTO_CLEAN);
        assert_ne!(a, b);
        assert!(bus.deregister(a));
        let _ = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn failing_listener_does_not_stop_siblings() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        let failing = bus.register::<BeforeNavigation, _>(
            |_| Err::<(), _>("listener exploded"),
            SubscribeOptions::AUTO_CLEAN,
        );
        bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::empty());

        let report = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 1);
        assert!(!report.is_ok());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, failing);
        assert_eq!(failures[0].1.to_string(), "listener returned an error: listener exploded");
        // One-shot even though it failed.
        assert_eq!(bus.state(failing), None);
    }

    #[test]
    #[cfg(panic = "unwind")]
    fn panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        bus.register::<BeforeNavigation, _>(
            |_: &NavigationEvent| -> Result<(), ListenerError> {
                panic!("listener panicked on purpose")
            },
            SubscribeOptions::empty(),
        );
        bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::empty());

        let report = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 1);
        assert_eq!(
            report.outcomes()[0].result,
            Err(ListenerFailure::Panicked("listener panicked on purpose".into()))
        );
        assert!(report.outcomes()[1].result.is_ok());
    }

    #[test]
    fn removal_during_emit_skips_the_removed_listener() {
        let bus = EventBus::new();
        let (count, cb) = counter();
        let victim: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let weak = bus.downgrade();
        let target = Rc::clone(&victim);
        bus.register::<BeforeNavigation, _>(
            move |_| {
                if let (Some(bus), Some(id)) = (weak.upgrade(), target.get()) {
                    bus.deregister(id);
                }
            },
            SubscribeOptions::empty(),
        );
        victim.set(Some(
            bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::empty()),
        ));

        let report = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(report.invoked(), 1);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn registration_during_emit_waits_for_the_next_one() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let weak = bus.downgrade();
        let inner = Rc::clone(&count);
        bus.register::<BeforeNavigation, _>(
            move |_| {
                let inner = Rc::clone(&inner);
                if let Some(bus) = weak.upgrade() {
                    bus.register::<BeforeNavigation, _>(
                        move |_| inner.set(inner.get() + 1),
                        SubscribeOptions::AUTO_CLEAN,
                    );
                }
            },
            SubscribeOptions::AUTO_CLEAN,
        );
        let _ = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 0);
        let _ = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn reentrant_emit_reports_busy_instead_of_panicking() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        let depth = Rc::new(Cell::new(0));
        let inner_depth = Rc::clone(&depth);
        let nested: Rc<RefCell<Option<EmitReport>>> = Rc::new(RefCell::new(None));
        let nested_slot = Rc::clone(&nested);
        bus.register::<BeforeNavigation, _>(
            move |p: &NavigationEvent| {
                inner_depth.set(inner_depth.get() + 1);
                if inner_depth.get() == 1
                    && let Some(bus) = weak.upgrade()
                {
                    *nested_slot.borrow_mut() = Some(bus.emit::<BeforeNavigation>(p));
                }
            },
            SubscribeOptions::empty(),
        );
        let outer = bus.emit::<BeforeNavigation>(&payload());
        assert!(outer.is_ok());
        let nested = nested.borrow_mut().take().unwrap();
        assert_eq!(nested.outcomes()[0].result, Err(ListenerFailure::Busy));
        assert_eq!(depth.get(), 1);
    }

    #[test]
    fn mid_transition_registration_is_deferred_unless_opted_in() {
        let bus = EventBus::new();
        bus.begin_transition();
        assert!(bus.is_transitioning());

        let (deferred_count, deferred_cb) = counter();
        let (eager_count, eager_cb) = counter();
        bus.register::<BeforeStartViewTransition, _>(deferred_cb, SubscribeOptions::empty());
        bus.register::<BeforeStartViewTransition, _>(
            eager_cb,
            SubscribeOptions::REGISTER_DURING_TRANSITION,
        );
        assert_eq!(bus.pending_count(), 1);

        let _ = bus.emit::<BeforeStartViewTransition>(&payload());
        assert_eq!((deferred_count.get(), eager_count.get()), (0, 1));

        assert_eq!(bus.end_transition(), 1);
        let _ = bus.emit::<BeforeStartViewTransition>(&payload());
        assert_eq!((deferred_count.get(), eager_count.get()), (1, 2));
    }

    #[test]
    fn deregister_before_flush_is_well_defined() {
        let bus = EventBus::new();
        bus.begin_transition();
        let (count, cb) = counter();
        let id = bus.register::<BeforeNavigation, _>(cb, SubscribeOptions::empty());
        assert_eq!(bus.state(id), Some(EntryState::Pending));

        assert!(bus.deregister(id));
        assert_eq!(bus.state(id), None);
        assert_eq!(bus.end_transition(), 0);

        let _ = bus.emit::<BeforeNavigation>(&payload());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn dropped_bus_cannot_be_upgraded() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        assert!(weak.upgrade().is_some());
        drop(bus);
        assert!(weak.upgrade().is_none());
    }
}
