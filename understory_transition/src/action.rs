// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-element transition identifiers.
//!
//! ## Overview
//!
//! An [`ElementAction`] gives one element a transition identifier, either
//! permanently ([`TransitionAction::Name`]) or only for the transitions that
//! concern it ([`TransitionAction::Descriptor`]).
//!
//! With a descriptor the action keeps two persistent listeners:
//!
//! - On `after-navigation-complete` it evaluates `apply_immediately` against
//!   the page that was just entered. When true the identifier is set at once,
//!   so that the element takes part in the next transition out of that page.
//! - On `before-start-view-transition` it evaluates `should_apply` against
//!   the navigation being started. When true the identifier is set and the
//!   descriptor's classes, if any, are added to the document root.
//!
//! In both cases one-shot `transition-finished` listeners undo the change.
//! Tearing the action down before they ran undoes it immediately.
//!
//! ```
//! use kurbo::Rect;
//! use understory_transition::action::{ActionContext, ActionDescriptor};
//! use understory_transition::navigation::NavigationType;
//! use understory_transition::root::TransitionRoot;
//! use understory_transition::sim::{SimElement, SimHost};
//!
//! let mut host = SimHost::new();
//! let root = TransitionRoot::new(host.environment());
//! let transitions = root.setup();
//!
//! let card = SimElement::new(Rect::new(0.0, 100.0, 200.0, 300.0));
//! let _action = transitions.element_action(
//!     card.clone(),
//!     ActionDescriptor::new("card").should_apply_with(|cx: &ActionContext<SimElement>| {
//!         cx.is_in_viewport
//!     }),
//! );
//!
//! let mut nav = host.navigate(NavigationType::Link, "/", "/card/1");
//! assert_eq!(card.transition_name().as_deref(), Some("card"));
//! host.run_until_stalled();
//! nav.complete();
//! host.run_until_stalled();
//! host.transitions.finish();
//! host.run_until_stalled();
//! assert_eq!(card.transition_name(), None);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::bus::{EventBus, WeakEventBus};
use crate::classes::ClassList;
use crate::events::{
    AfterNavigationComplete, BeforeStartViewTransition, NavigationEvent, TransitionFinished,
};
use crate::host::{Environment, RootClassList, TransitionTarget, Viewport, is_in_viewport};
use crate::navigation::Navigation;
use crate::registry::{SubscribeOptions, SubscriptionId};
use crate::resolve::Resolve;

/// What a resolver of an [`ActionDescriptor`] field gets to look at.
#[derive(Clone, Debug)]
pub struct ActionContext<N> {
    /// The navigation the field is evaluated for.
    pub navigation: Navigation,
    /// The element carrying the action.
    pub node: N,
    /// Whether the element's top edge is above the bottom of the visible
    /// window region, at evaluation time.
    pub is_in_viewport: bool,
}

impl<N: TransitionTarget> ActionContext<N> {
    fn capture(event: &NavigationEvent, node: &N, viewport: &dyn Viewport) -> Self {
        Self {
            navigation: event.navigation.clone(),
            node: node.clone(),
            is_in_viewport: is_in_viewport(node.bounding_rect(), viewport.visible_rect()),
        }
    }
}

/// Configuration of an element action beyond a fixed identifier.
pub struct ActionDescriptor<N> {
    name: Resolve<String, ActionContext<N>>,
    classes: Option<ClassList<ActionContext<N>>>,
    should_apply: Resolve<bool, ActionContext<N>>,
    apply_immediately: Resolve<bool, ActionContext<N>>,
}

impl<N> Clone for ActionDescriptor<N> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            classes: self.classes.clone(),
            should_apply: self.should_apply.clone(),
            apply_immediately: self.apply_immediately.clone(),
        }
    }
}

impl<N> core::fmt::Debug for ActionDescriptor<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("classes", &self.classes)
            .field("should_apply", &self.should_apply)
            .field("apply_immediately", &self.apply_immediately)
            .finish()
    }
}

impl<N> ActionDescriptor<N> {
    /// Apply `name` whenever a transition starts, with no classes.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_name(Resolve::Literal(name.into()))
    }

    /// Like [`new`](Self::new), computing the identifier per navigation.
    pub fn named_by(name: impl Fn(&ActionContext<N>) -> String + 'static) -> Self {
        Self::with_name(Resolve::computed(name))
    }

    fn with_name(name: Resolve<String, ActionContext<N>>) -> Self {
        Self {
            name,
            classes: None,
            should_apply: Resolve::Literal(true),
            apply_immediately: Resolve::Literal(false),
        }
    }

    /// Classes added to the document root while the identifier is applied.
    #[must_use]
    pub fn classes(mut self, classes: Vec<String>) -> Self {
        self.classes = Some(Resolve::Literal(Some(classes)));
        self
    }

    /// Classes computed per navigation; `None` adds nothing.
    #[must_use]
    pub fn classes_with(
        mut self,
        classes: impl Fn(&ActionContext<N>) -> Option<Vec<String>> + 'static,
    ) -> Self {
        self.classes = Some(Resolve::computed(classes));
        self
    }

    /// Whether to apply the identifier when a transition starts (default true).
    #[must_use]
    pub fn should_apply(mut self, apply: bool) -> Self {
        self.should_apply = Resolve::Literal(apply);
        self
    }

    /// Decide per navigation whether to apply the identifier when a
    /// transition starts.
    #[must_use]
    pub fn should_apply_with(
        mut self,
        apply: impl Fn(&ActionContext<N>) -> bool + 'static,
    ) -> Self {
        self.should_apply = Resolve::computed(apply);
        self
    }

    /// Whether to apply the identifier as soon as a navigation into this
    /// page completes (default false).
    #[must_use]
    pub fn apply_immediately(mut self, apply: bool) -> Self {
        self.apply_immediately = Resolve::Literal(apply);
        self
    }

    /// Decide per completed navigation whether to apply the identifier at once.
    #[must_use]
    pub fn apply_immediately_with(
        mut self,
        apply: impl Fn(&ActionContext<N>) -> bool + 'static,
    ) -> Self {
        self.apply_immediately = Resolve::computed(apply);
        self
    }
}

/// Configuration accepted by [`ElementAction`].
#[derive(Clone, Debug)]
pub enum TransitionAction<N> {
    /// A fixed identifier, set once.
    Name(String),
    /// Identifier and classes driven by the navigation lifecycle.
    Descriptor(ActionDescriptor<N>),
}

impl<N> From<&str> for TransitionAction<N> {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl<N> From<String> for TransitionAction<N> {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl<N> From<ActionDescriptor<N>> for TransitionAction<N> {
    fn from(descriptor: ActionDescriptor<N>) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// Subscriptions owned by one applied descriptor, and the state their
/// `transition-finished` listeners still have to undo.
#[derive(Debug, Default)]
struct Teardown {
    /// The two persistent lifecycle listeners.
    subscriptions: Vec<SubscriptionId>,
    /// Open listeners that clear the identifier.
    name_clears: Vec<SubscriptionId>,
    /// Open listeners that remove root classes, with the classes they remove.
    class_removals: Vec<(SubscriptionId, Vec<String>)>,
}

impl Teardown {
    fn track_name_clear(&mut self, bus: &EventBus, id: SubscriptionId) {
        self.name_clears.retain(|id| bus.state(*id).is_some());
        self.name_clears.push(id);
    }

    fn track_class_removal(&mut self, bus: &EventBus, id: SubscriptionId, classes: Vec<String>) {
        self.class_removals.retain(|(id, _)| bus.state(*id).is_some());
        self.class_removals.push((id, classes));
    }

    /// Deregister every open class-removal listener and remove its classes
    /// now. Returns how many were open.
    fn remove_classes_now(&mut self, bus: &EventBus, root: &dyn RootClassList) -> usize {
        let mut open = 0;
        for (id, classes) in self.class_removals.drain(..) {
            if bus.deregister(id) {
                root.remove_classes(&classes);
                open += 1;
            }
        }
        open
    }

    /// Deregister every open name-clearing listener. Returns true if any was
    /// still open, meaning the identifier is still applied.
    fn drop_name_clears(&mut self, bus: &EventBus) -> bool {
        self.name_clears
            .drain(..)
            .fold(false, |open, id| bus.deregister(id) | open)
    }
}

/// The action attached to one element.
///
/// Listeners are removed by [`destroy`](Self::destroy), by
/// [`update`](Self::update) before the new configuration is applied, and on
/// drop.
pub struct ElementAction<N: TransitionTarget> {
    node: N,
    bus: EventBus,
    root: Rc<dyn RootClassList>,
    viewport: Rc<dyn Viewport>,
    teardown: Option<Rc<RefCell<Teardown>>>,
}

impl<N: TransitionTarget + core::fmt::Debug> core::fmt::Debug for ElementAction<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElementAction")
            .field("node", &self.node)
            .field("teardown", &self.teardown)
            .finish_non_exhaustive()
    }
}

impl<N: TransitionTarget> ElementAction<N> {
    pub(crate) fn new(
        node: N,
        config: TransitionAction<N>,
        bus: &EventBus,
        env: &Environment,
    ) -> Self {
        let mut action = Self {
            node,
            bus: bus.clone(),
            root: Rc::clone(&env.root),
            viewport: Rc::clone(&env.viewport),
            teardown: None,
        };
        action.apply(config);
        action
    }

    /// The element this action is attached to.
    pub fn node(&self) -> &N {
        &self.node
    }

    /// Whether the action currently owns lifecycle listeners.
    pub fn is_listening(&self) -> bool {
        self.teardown.is_some()
    }

    /// Replace the configuration. Listeners of the previous one are removed
    /// first.
    pub fn update(&mut self, config: impl Into<TransitionAction<N>>) {
        self.destroy();
        self.apply(config.into());
    }

    /// Remove every listener owned by this action. Idempotent.
    ///
    /// When a transition applied by this action has not finished yet, the
    /// identifier is cleared and the root classes are removed right away
    /// instead of waiting for `transition-finished`.
    pub fn destroy(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        let mut teardown = teardown.take();
        let removed = teardown
            .subscriptions
            .iter()
            .filter(|&&id| self.bus.deregister(id))
            .count();
        let classes = teardown.remove_classes_now(&self.bus, &*self.root);
        let name = teardown.drop_name_clears(&self.bus);
        if name {
            self.node.set_transition_name(None);
        }
        trace!(removed, classes, name, "element action torn down");
    }

    fn apply(&mut self, config: TransitionAction<N>) {
        match config {
            TransitionAction::Name(name) => self.node.set_transition_name(Some(&name)),
            TransitionAction::Descriptor(descriptor) => {
                let teardown = Rc::new(RefCell::new(Teardown::default()));
                let descriptor = Rc::new(descriptor);
                let immediate = self.bus.register::<AfterNavigationComplete, _>(
                    self.apply_immediately_listener(&descriptor, &teardown),
                    SubscribeOptions::REGISTER_DURING_TRANSITION,
                );
                let on_start = self.bus.register::<BeforeStartViewTransition, _>(
                    self.should_apply_listener(&descriptor, &teardown),
                    SubscribeOptions::empty(),
                );
                teardown.borrow_mut().subscriptions.extend([immediate, on_start]);
                self.teardown = Some(teardown);
            }
        }
    }

    fn apply_immediately_listener(
        &self,
        descriptor: &Rc<ActionDescriptor<N>>,
        teardown: &Rc<RefCell<Teardown>>,
    ) -> impl FnMut(&NavigationEvent) + 'static {
        let descriptor = Rc::clone(descriptor);
        let teardown = Rc::clone(teardown);
        let node = self.node.clone();
        let viewport = Rc::clone(&self.viewport);
        let bus = self.bus.downgrade();
        move |event: &NavigationEvent| {
            let cx = ActionContext::capture(event, &node, &*viewport);
            if !descriptor.apply_immediately.resolve(&cx) {
                return;
            }
            let name = descriptor.name.resolve(&cx);
            trace!(%name, "applying transition name immediately");
            node.set_transition_name(Some(&name));
            if let Some(bus) = bus.upgrade() {
                let clear = clear_on_finish(&bus, &node);
                teardown.borrow_mut().track_name_clear(&bus, clear);
            }
        }
    }

    fn should_apply_listener(
        &self,
        descriptor: &Rc<ActionDescriptor<N>>,
        teardown: &Rc<RefCell<Teardown>>,
    ) -> impl FnMut(&NavigationEvent) + 'static {
        let descriptor = Rc::clone(descriptor);
        let teardown = Rc::clone(teardown);
        let node = self.node.clone();
        let viewport = Rc::clone(&self.viewport);
        let root = Rc::clone(&self.root);
        let bus: WeakEventBus = self.bus.downgrade();
        move |event: &NavigationEvent| {
            let cx = ActionContext::capture(event, &node, &*viewport);
            if !descriptor.should_apply.resolve(&cx) {
                return;
            }
            let name = descriptor.name.resolve(&cx);
            trace!(%name, "applying transition name");
            node.set_transition_name(Some(&name));
            let Some(bus) = bus.upgrade() else {
                return;
            };
            let mut teardown = teardown.borrow_mut();
            let clear = clear_on_finish(&bus, &node);
            teardown.track_name_clear(&bus, clear);

            let classes = descriptor.classes.as_ref().and_then(|c| c.resolve(&cx));
            match classes {
                Some(classes) => {
                    root.add_classes(&classes);
                    let removal = {
                        let root = Rc::clone(&root);
                        let classes = classes.clone();
                        bus.register::<TransitionFinished, _>(
                            move |_| {
                                if !classes.is_empty() {
                                    root.remove_classes(&classes);
                                }
                            },
                            SubscribeOptions::REGISTER_DURING_TRANSITION
                                | SubscribeOptions::AUTO_CLEAN,
                        )
                    };
                    teardown.track_class_removal(&bus, removal, classes);
                }
                None => {
                    let open = teardown.remove_classes_now(&bus, &*root);
                    if open > 0 {
                        trace!(open, "removed classes of an unfinished transition");
                    }
                }
            }
        }
    }
}

fn clear_on_finish<N: TransitionTarget>(bus: &EventBus, node: &N) -> SubscriptionId {
    let node = node.clone();
    bus.register::<TransitionFinished, _>(
        move |_| node.set_transition_name(None),
        SubscribeOptions::REGISTER_DURING_TRANSITION | SubscribeOptions::AUTO_CLEAN,
    )
}

impl<N: TransitionTarget> Drop for ElementAction<N> {
    fn drop(&mut self) {
        self.destroy();
    }
}
