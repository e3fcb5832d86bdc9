// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interfaces to the host environment.
//!
//! ## Overview
//!
//! The crate never touches a browser or a router directly. Everything it
//! needs from the outside world goes through the traits in this module:
//!
//! - [`NavigationHost`]: the router's navigation interceptor and its
//!   "run after the navigation settles" hook.
//! - [`ViewTransitionApi`]: the native `startViewTransition` primitive.
//! - [`RootClassList`]: class list of the document root.
//! - [`TransitionTarget`]: an element that can carry a transition identifier.
//! - [`Viewport`]: the visible window region.
//!
//! [`Environment`] bundles one implementation of each together with a
//! [`LocalSpawn`] used to run the lifecycle continuations.
//!
//! Implementations for a real browser live in `understory_transition_web`;
//! a headless implementation is available behind the `sim` feature.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::task::LocalSpawn;
use kurbo::Rect;

use crate::error::{HostError, TransitionError};
use crate::navigation::Navigation;
use crate::transition::TransitionHandle;

/// Handler installed with [`NavigationHost::on_navigate`].
///
/// When it returns a future, the host must not start updating the page for
/// this navigation until that future resolves.
pub type NavigateHandler = Rc<dyn Fn(Navigation) -> Option<LocalBoxFuture<'static, ()>>>;

/// Removes a handler installed with [`NavigationHost::on_navigate`].
pub type NavigateRegistration = Box<dyn FnOnce()>;

/// Update callback handed to [`ViewTransitionApi::start`].
///
/// The native primitive calls it once, after capturing the old view, and
/// captures the new view once the returned future resolves.
pub type UpdateCallback = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), TransitionError>>>;

/// The host router.
pub trait NavigationHost {
    /// Install a handler invoked at the start of every client-side navigation.
    fn on_navigate(&self, handler: NavigateHandler) -> NavigateRegistration;

    /// Run `callback` once the current navigation has settled.
    ///
    /// Fails when the hook cannot be used from the current call context (for
    /// example from inside one of its own callbacks); callers then fall back
    /// to running the callback immediately.
    fn after_navigate(&self, callback: Box<dyn FnOnce()>) -> Result<(), HostError>;
}

/// The native view transition primitive.
pub trait ViewTransitionApi {
    /// Feature probe.
    fn is_supported(&self) -> bool;

    /// Start a transition whose DOM update is performed by `update`.
    fn start(&self, update: UpdateCallback) -> Result<TransitionHandle, TransitionError>;
}

/// Class list of the document root element.
pub trait RootClassList {
    /// Add every class in `classes`.
    fn add_classes(&self, classes: &[String]);
    /// Remove every class in `classes`.
    fn remove_classes(&self, classes: &[String]);
}

/// An element that can carry a transition identifier.
///
/// Element handles are cheap clones of a reference to the same node, which is
/// how listeners of an [`ElementAction`](crate::action::ElementAction) keep
/// hold of it.
pub trait TransitionTarget: Clone + 'static {
    /// Set the identifier, or clear it with `None`.
    fn set_transition_name(&self, name: Option<&str>);
    /// Current bounding rectangle, relative to the viewport.
    fn bounding_rect(&self) -> Rect;
}

/// The visible window region.
pub trait Viewport {
    /// Visible region in document coordinates (scroll offset and size).
    fn visible_rect(&self) -> Rect;
}

/// True when an element with `bounds` counts as being in the viewport: its
/// top edge lies above the bottom edge of the visible region.
pub fn is_in_viewport(bounds: Rect, visible: Rect) -> bool {
    bounds.y0 < visible.y1
}

/// Everything a [`TransitionRoot`](crate::root::TransitionRoot) needs from the host.
#[derive(Clone)]
pub struct Environment {
    /// Router integration.
    pub navigation: Rc<dyn NavigationHost>,
    /// Native transition primitive.
    pub transitions: Rc<dyn ViewTransitionApi>,
    /// Document root class list.
    pub root: Rc<dyn RootClassList>,
    /// Window viewport.
    pub viewport: Rc<dyn Viewport>,
    /// Executor for the lifecycle continuations.
    pub spawner: Rc<dyn LocalSpawn>,
}

impl core::fmt::Debug for Environment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Environment")
            .field("transitions_supported", &self.transitions.is_supported())
            .field("visible_rect", &self.viewport.visible_rect())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_check_uses_the_top_edge() {
        let visible = Rect::new(0.0, 0.0, 800.0, 600.0);
        assert!(is_in_viewport(Rect::new(0.0, 10.0, 100.0, 110.0), visible));
        // Partially visible at the bottom still counts.
        assert!(is_in_viewport(Rect::new(0.0, 599.0, 100.0, 900.0), visible));
        assert!(!is_in_viewport(Rect::new(0.0, 600.0, 100.0, 700.0), visible));
        // Scrolled documents extend the visible region.
        let scrolled = Rect::new(0.0, 400.0, 800.0, 1000.0);
        assert!(is_in_viewport(Rect::new(0.0, 700.0, 100.0, 800.0), scrolled));
    }
}
