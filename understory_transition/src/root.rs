// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-application context and the `setup` entry point.
//!
//! ## Overview
//!
//! A [`TransitionRoot`] owns the [`EventBus`] and the host [`Environment`] of
//! one application root. Components call [`TransitionRoot::setup`] and keep
//! the returned [`ViewTransitions`] for as long as they are mounted.
//!
//! The navigation interceptor is installed once per root: the first live
//! [`ViewTransitions`] installs it and dropping the last one removes it.
//!
//! ## Wrapping
//!
//! By default ([`SubscribeOptions::AUTO_WRAP`]) registrations and
//! deregistrations made through [`ViewTransitions`] only take effect once the
//! current navigation has settled, through the host's after-navigate hook.
//! This lets components subscribe during initialization without reacting to
//! the navigation that is mounting them. When the hook refuses (for example
//! because the call already comes from an after-navigate callback) a warning
//! is logged and the change is applied immediately.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::action::{ElementAction, TransitionAction};
use crate::bus::{EventBus, WeakEventBus};
use crate::classes::{self, ClassList};
use crate::driver::drive_navigation;
use crate::error::IntoListenerResult;
use crate::events::{LifecycleEvent, NavigationEvent};
use crate::host::{
    Environment, NavigateHandler, NavigateRegistration, NavigationHost, TransitionTarget,
};
use crate::registry::{SubscribeOptions, SubscriptionId};
use crate::resolve::Resolve;

#[derive(Default)]
struct Interceptor {
    users: usize,
    registration: Option<NavigateRegistration>,
}

struct RootShared {
    bus: EventBus,
    env: Environment,
    interceptor: RefCell<Interceptor>,
}

/// Context object for one application root.
#[derive(Clone)]
pub struct TransitionRoot {
    shared: Rc<RootShared>,
}

impl core::fmt::Debug for TransitionRoot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let interceptor = self.shared.interceptor.borrow();
        f.debug_struct("TransitionRoot")
            .field("bus", &self.shared.bus)
            .field("users", &interceptor.users)
            .field("intercepting", &interceptor.registration.is_some())
            .finish_non_exhaustive()
    }
}

impl TransitionRoot {
    /// Create the context for a root running in `env`.
    pub fn new(env: Environment) -> Self {
        Self {
            shared: Rc::new(RootShared {
                bus: EventBus::new(),
                env,
                interceptor: RefCell::default(),
            }),
        }
    }

    /// Hook this root into the host's navigations and return the API handle.
    ///
    /// Only the first live handle installs the interceptor, and only when
    /// the native primitive is available.
    pub fn setup(&self) -> ViewTransitions {
        let mut interceptor = self.shared.interceptor.borrow_mut();
        interceptor.users += 1;
        if interceptor.registration.is_none() && self.shared.env.transitions.is_supported() {
            let weak: Weak<RootShared> = Rc::downgrade(&self.shared);
            let handler: NavigateHandler = Rc::new(move |navigation| {
                let shared = weak.upgrade()?;
                drive_navigation(
                    &shared.bus,
                    &*shared.env.transitions,
                    &*shared.env.spawner,
                    navigation,
                )
            });
            interceptor.registration = Some(self.shared.env.navigation.on_navigate(handler));
            debug!("navigation interceptor installed");
        }
        ViewTransitions {
            shared: Rc::clone(&self.shared),
        }
    }

    /// The root's event bus.
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// The host environment.
    pub fn environment(&self) -> &Environment {
        &self.shared.env
    }

    /// Whether the navigation interceptor is installed.
    pub fn is_intercepting(&self) -> bool {
        self.shared.interceptor.borrow().registration.is_some()
    }
}

/// API handle returned by [`TransitionRoot::setup`].
///
/// Keeps the root's interceptor installed while alive.
pub struct ViewTransitions {
    shared: Rc<RootShared>,
}

impl core::fmt::Debug for ViewTransitions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ViewTransitions")
            .field("bus", &self.shared.bus)
            .finish_non_exhaustive()
    }
}

impl Drop for ViewTransitions {
    fn drop(&mut self) {
        let registration = {
            let mut interceptor = self.shared.interceptor.borrow_mut();
            interceptor.users = interceptor.users.saturating_sub(1);
            if interceptor.users == 0 {
                interceptor.registration.take()
            } else {
                None
            }
        };
        if let Some(unregister) = registration {
            unregister();
            debug!("navigation interceptor removed");
        }
    }
}

impl ViewTransitions {
    /// Register `callback` for `E`.
    ///
    /// See [`SubscribeOptions`] for the meaning of each flag; the default is
    /// a one-shot listener activated once the current navigation settles.
    pub fn register<E, R>(
        &self,
        callback: impl FnMut(&E::Payload) -> R + 'static,
        options: SubscribeOptions,
    ) -> Subscription
    where
        E: LifecycleEvent,
        R: IntoListenerResult + 'static,
    {
        let id = register_wrapped::<E, R>(
            &self.shared.bus,
            &self.shared.env.navigation,
            callback,
            options,
        );
        Subscription {
            id,
            bus: self.shared.bus.downgrade(),
            navigation: Rc::clone(&self.shared.env.navigation),
            auto_wrap: options.contains(SubscribeOptions::AUTO_WRAP),
        }
    }

    /// Remove `subscription`, after the current navigation settles if
    /// `auto_wrap` is set.
    pub fn deregister(&self, subscription: &Subscription, auto_wrap: bool) {
        deregister_wrapped(
            &self.shared.bus,
            &self.shared.env.navigation,
            subscription.id,
            auto_wrap,
        );
    }

    /// Add `classes` to the document root for the duration of the next
    /// transition.
    pub fn classes(&self, classes: Vec<String>, auto_wrap: bool) {
        self.install_classes(Resolve::Literal(Some(classes)), auto_wrap);
    }

    /// Like [`classes`](Self::classes), with the list computed when the
    /// transition starts. Returning `None` skips the navigation.
    pub fn classes_with(
        &self,
        classes: impl Fn(&NavigationEvent) -> Option<Vec<String>> + 'static,
        auto_wrap: bool,
    ) {
        self.install_classes(Resolve::computed(classes), auto_wrap);
    }

    fn install_classes(&self, classes: ClassList<NavigationEvent>, auto_wrap: bool) {
        classes::install(
            &self.shared.bus,
            &self.shared.env.navigation,
            &self.shared.env.root,
            classes,
            auto_wrap,
        );
    }

    /// Attach the element action to `node`.
    pub fn element_action<N: TransitionTarget>(
        &self,
        node: N,
        config: impl Into<TransitionAction<N>>,
    ) -> ElementAction<N> {
        ElementAction::new(node, config.into(), &self.shared.bus, &self.shared.env)
    }

    /// The root's event bus.
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }
}

/// A registration made through [`ViewTransitions::register`].
///
/// Dropping it leaves the listener in place.
pub struct Subscription {
    id: SubscriptionId,
    bus: WeakEventBus,
    navigation: Rc<dyn NavigationHost>,
    auto_wrap: bool,
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("auto_wrap", &self.auto_wrap)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// The underlying bus id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener with the wrapping policy it was registered with.
    pub fn unsubscribe(&self) {
        self.unsubscribe_with(self.auto_wrap);
    }

    /// Remove the listener, after the current navigation settles if
    /// `auto_wrap` is set.
    pub fn unsubscribe_with(&self, auto_wrap: bool) {
        if let Some(bus) = self.bus.upgrade() {
            deregister_wrapped(&bus, &self.navigation, self.id, auto_wrap);
        }
    }
}

/// Register on `bus`, honouring [`SubscribeOptions::AUTO_WRAP`].
pub(crate) fn register_wrapped<E, R>(
    bus: &EventBus,
    navigation: &Rc<dyn NavigationHost>,
    callback: impl FnMut(&E::Payload) -> R + 'static,
    options: SubscribeOptions,
) -> SubscriptionId
where
    E: LifecycleEvent,
    R: IntoListenerResult + 'static,
{
    if !options.contains(SubscribeOptions::AUTO_WRAP) {
        return bus.register::<E, R>(callback, options);
    }
    let id = bus.reserve::<E, R>(callback, options.contains(SubscribeOptions::AUTO_CLEAN));
    let during = options.contains(SubscribeOptions::REGISTER_DURING_TRANSITION);
    let weak = bus.downgrade();
    after_navigate_or_now(&**navigation, move || {
        if let Some(bus) = weak.upgrade() {
            bus.settle(id, during);
        }
    });
    id
}

/// Deregister from `bus`, after the current navigation settles if `auto_wrap`.
pub(crate) fn deregister_wrapped(
    bus: &EventBus,
    navigation: &Rc<dyn NavigationHost>,
    id: SubscriptionId,
    auto_wrap: bool,
) {
    if !auto_wrap {
        bus.deregister(id);
        return;
    }
    let weak = bus.downgrade();
    after_navigate_or_now(&**navigation, move || {
        if let Some(bus) = weak.upgrade() {
            bus.deregister(id);
        }
    });
}

fn after_navigate_or_now(navigation: &dyn NavigationHost, f: impl FnOnce() + 'static) {
    let slot: Rc<Cell<Option<Box<dyn FnOnce()>>>> = Rc::new(Cell::new(Some(Box::new(f))));
    let queued = Rc::clone(&slot);
    let result = navigation.after_navigate(Box::new(move || {
        if let Some(f) = queued.take() {
            f();
        }
    }));
    if let Err(error) = result {
        warn!(
            %error,
            "could not defer to after-navigate (called from inside an after-navigate callback?), applying now"
        );
        if let Some(f) = slot.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BeforeNavigation, BeforeStartViewTransition, EventKind};
    use crate::navigation::NavigationType;
    use crate::registry::EntryState;
    use crate::sim::{SimHost, SimTransitionApi};

    #[test]
    fn setup_installs_one_interceptor_per_root() {
        let host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let first = root.setup();
        let second = root.setup();
        assert_eq!(host.navigation.handler_count(), 1);
        assert!(root.is_intercepting());

        drop(first);
        assert_eq!(host.navigation.handler_count(), 1);
        drop(second);
        assert_eq!(host.navigation.handler_count(), 0);
        assert!(!root.is_intercepting());

        let _again = root.setup();
        assert_eq!(host.navigation.handler_count(), 1);
    }

    #[test]
    fn unsupported_primitive_installs_nothing() {
        let host = SimHost::with_transitions(SimTransitionApi::unsupported());
        let root = TransitionRoot::new(host.environment());
        let _transitions = root.setup();
        assert_eq!(host.navigation.handler_count(), 0);
    }

    #[test]
    fn wrapped_registration_waits_for_the_router() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        let sub = transitions.register::<BeforeStartViewTransition, _>(
            |_| {},
            SubscribeOptions::default(),
        );
        assert_eq!(root.bus().state(sub.id()), Some(EntryState::Pending));
        assert_eq!(
            root.bus().listener_count(EventKind::BeforeStartViewTransition),
            0
        );

        host.settle();
        assert_eq!(root.bus().state(sub.id()), Some(EntryState::Active));

        sub.unsubscribe();
        assert_eq!(root.bus().state(sub.id()), Some(EntryState::Active));
        host.settle();
        assert_eq!(root.bus().state(sub.id()), None);
    }

    #[test]
    fn reentrant_wrap_falls_back_to_immediate() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = Rc::new(root.setup());
        let inner = Rc::clone(&transitions);
        let nested = Rc::new(Cell::new(None));
        let nested_in = Rc::clone(&nested);
        host.navigation
            .after_navigate(Box::new(move || {
                let sub =
                    inner.register::<BeforeNavigation, _>(|_| {}, SubscribeOptions::default());
                nested_in.set(Some(sub.id()));
            }))
            .unwrap();
        host.settle();

        let id = nested.get().unwrap();
        assert_eq!(root.bus().state(id), Some(EntryState::Active));
        assert_eq!(host.navigation.queued_count(), 0);
    }

    #[test]
    fn wrapped_registration_mid_transition_joins_the_next_one() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        let seen = Rc::new(Cell::new(0));

        let mut nav = host.navigate(NavigationType::Link, "/", "/a");
        host.run_until_stalled();
        assert!(root.bus().is_transitioning());

        let counter = Rc::clone(&seen);
        transitions.register::<BeforeNavigation, _>(
            move |_| counter.set(counter.get() + 1),
            SubscribeOptions::empty(),
        );
        nav.complete();
        host.settle();
        assert_eq!(root.bus().pending_count(), 1);

        host.transitions.finish();
        host.run_until_stalled();
        assert_eq!(root.bus().pending_count(), 0);
        assert_eq!(seen.get(), 0);

        let mut nav = host.navigate(NavigationType::Link, "/a", "/b");
        host.run_until_stalled();
        nav.complete();
        host.run_until_stalled();
        assert_eq!(seen.get(), 1);
    }
}
