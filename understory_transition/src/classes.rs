// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document-root classes that live for exactly one transition.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::bus::EventBus;
use crate::events::{BeforeStartViewTransition, NavigationEvent, TransitionFinished};
use crate::host::{NavigationHost, RootClassList};
use crate::registry::SubscribeOptions;
use crate::resolve::Resolve;
use crate::root::{deregister_wrapped, register_wrapped};

/// A class list that is fixed or computed from a context; `None` means
/// "no classes for this navigation".
pub type ClassList<Cx> = Resolve<Option<Vec<String>>, Cx>;

/// Add the resolved classes to the document root when the next transition
/// starts and remove them once it has finished.
///
/// Both listeners are one-shot. When `classes` resolves to `None` the removal
/// listener is dropped instead.
pub(crate) fn install(
    bus: &EventBus,
    navigation: &Rc<dyn NavigationHost>,
    root: &Rc<dyn RootClassList>,
    classes: ClassList<NavigationEvent>,
    auto_wrap: bool,
) {
    let applied: Rc<RefCell<Option<Vec<String>>>> = Rc::default();
    let mut options = SubscribeOptions::AUTO_CLEAN;
    if auto_wrap {
        options |= SubscribeOptions::AUTO_WRAP;
    }

    let removal = {
        let applied = Rc::clone(&applied);
        let root = Rc::clone(root);
        register_wrapped::<TransitionFinished, _>(
            bus,
            navigation,
            move |_| {
                if let Some(classes) = applied.borrow_mut().take()
                    && !classes.is_empty()
                {
                    trace!(?classes, "removing transition classes");
                    root.remove_classes(&classes);
                }
            },
            options,
        )
    };

    let weak = bus.downgrade();
    let host = Rc::clone(navigation);
    let root = Rc::clone(root);
    register_wrapped::<BeforeStartViewTransition, _>(
        bus,
        navigation,
        move |event| match classes.resolve(event) {
            Some(resolved) => {
                trace!(classes = ?resolved, "adding transition classes");
                root.add_classes(&resolved);
                *applied.borrow_mut() = Some(resolved);
            }
            None => {
                if let Some(bus) = weak.upgrade() {
                    deregister_wrapped(&bus, &host, removal, auto_wrap);
                }
            }
        },
        options,
    );
}

#[cfg(test)]
mod tests {
    use crate::events::{EventKind, NavigationEvent};
    use crate::navigation::NavigationType;
    use crate::root::TransitionRoot;
    use crate::sim::SimHost;

    #[test]
    fn highlight_lives_from_start_to_finish() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        transitions.classes(vec!["highlight".to_owned()], false);
        assert!(!host.document.has_class("highlight"));

        let mut nav = host.navigate(NavigationType::Link, "/", "/post/1");
        assert!(host.document.has_class("highlight"));
        host.run_until_stalled();
        nav.complete();
        host.run_until_stalled();
        assert!(host.document.has_class("highlight"));

        host.transitions.finish();
        host.run_until_stalled();
        assert!(!host.document.has_class("highlight"));
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 0);

        // One-shot: the next navigation adds nothing.
        let mut nav = host.navigate(NavigationType::Link, "/post/1", "/");
        assert!(!host.document.has_class("highlight"));
        nav.complete();
        host.run_until_stalled();
    }

    #[test]
    fn unresolved_classes_drop_the_removal_listener() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        transitions.classes_with(
            |event: &NavigationEvent| {
                (event.navigation.kind() == NavigationType::Popstate)
                    .then(|| vec!["back".to_owned()])
            },
            false,
        );
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 1);

        let _nav = host.navigate(NavigationType::Link, "/", "/a");
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 0);
        assert!(host.document.classes().is_empty());
        host.run_until_stalled();
    }

    #[test]
    fn wrapped_classes_wait_for_the_router() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        transitions.classes(vec!["fade".to_owned()], true);
        assert_eq!(
            root.bus().listener_count(EventKind::BeforeStartViewTransition),
            0
        );
        assert_eq!(host.settle(), 2);
        assert_eq!(
            root.bus().listener_count(EventKind::BeforeStartViewTransition),
            1
        );

        let _nav = host.navigate(NavigationType::Goto, "/", "/a");
        assert!(host.document.has_class("fade"));
    }

    #[test]
    fn wrapped_unresolved_classes_retire_the_removal_after_settling() {
        let mut host = SimHost::new();
        let root = TransitionRoot::new(host.environment());
        let transitions = root.setup();
        transitions.classes_with(|_: &NavigationEvent| None, true);
        assert_eq!(host.settle(), 2);
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 1);

        let _nav = host.navigate(NavigationType::Link, "/", "/a");
        assert!(host.document.classes().is_empty());
        // The deregistration waits for the router as well.
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 1);
        assert_eq!(host.navigation.queued_count(), 1);

        assert_eq!(host.settle(), 1);
        assert_eq!(root.bus().listener_count(EventKind::TransitionFinished), 0);
    }
}
