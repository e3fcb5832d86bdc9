// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Navigation descriptor handed to the lifecycle driver by the host.
//!
//! A [`Navigation`] is cheap to clone; every clone shares the same completion
//! signal, so listeners, the driver and the host can all await it.

use std::collections::BTreeMap;
use std::future::Future;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::NavigationError;

/// Shared completion signal of a navigation.
pub type Completion = Shared<LocalBoxFuture<'static, Result<(), NavigationError>>>;

/// One end of a navigation: where it comes from or where it goes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Full URL of the page.
    pub url: String,
    /// Route identifier as known to the host router (e.g. `/post/[id]`).
    pub route_id: Option<String>,
    /// Route parameters.
    pub params: BTreeMap<String, String>,
}

impl NavigationTarget {
    /// Create a target for `url` with no route information.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the route identifier.
    #[must_use]
    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    /// Add a route parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a route parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// What triggered a navigation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NavigationType {
    /// The app is hydrating.
    Enter,
    /// A form submission.
    Form,
    /// The page is being unloaded.
    Leave,
    /// A link click.
    Link,
    /// A programmatic navigation.
    Goto,
    /// Browser history traversal (back/forward).
    Popstate,
}

/// Descriptor of one client-side navigation.
#[derive(Clone)]
pub struct Navigation {
    kind: NavigationType,
    from: Option<NavigationTarget>,
    to: Option<NavigationTarget>,
    will_unload: bool,
    delta: Option<i32>,
    complete: Completion,
}

impl core::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Navigation")
            .field("kind", &self.kind)
            .field("from", &self.from.as_ref().map(|t| &t.url))
            .field("to", &self.to.as_ref().map(|t| &t.url))
            .field("will_unload", &self.will_unload)
            .field("delta", &self.delta)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl Navigation {
    /// Create a navigation whose completion is signalled by `complete`.
    pub fn new(
        kind: NavigationType,
        from: Option<NavigationTarget>,
        to: Option<NavigationTarget>,
        complete: impl Future<Output = Result<(), NavigationError>> + 'static,
    ) -> Self {
        Self {
            kind,
            from,
            to,
            will_unload: false,
            delta: None,
            complete: complete.boxed_local().shared(),
        }
    }

    /// Set the history delta of a `Popstate` navigation.
    #[must_use]
    pub fn with_delta(mut self, delta: i32) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Mark the navigation as one that unloads the document.
    #[must_use]
    pub fn with_will_unload(mut self, will_unload: bool) -> Self {
        self.will_unload = will_unload;
        self
    }

    /// What triggered this navigation.
    pub fn kind(&self) -> NavigationType {
        self.kind
    }

    /// Page being left, if any.
    pub fn from(&self) -> Option<&NavigationTarget> {
        self.from.as_ref()
    }

    /// Page being entered, if any.
    pub fn to(&self) -> Option<&NavigationTarget> {
        self.to.as_ref()
    }

    /// Whether the navigation unloads the document.
    pub fn will_unload(&self) -> bool {
        self.will_unload
    }

    /// History delta for `Popstate` navigations.
    pub fn delta(&self) -> Option<i32> {
        self.delta
    }

    /// The completion signal; resolves once the destination has rendered.
    pub fn complete(&self) -> Completion {
        self.complete.clone()
    }

    /// True once the completion signal has resolved (successfully or not).
    pub fn is_complete(&self) -> bool {
        self.complete.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn clones_share_one_completion() {
        let (tx, rx) = oneshot::channel::<Result<(), NavigationError>>();
        let nav = Navigation::new(
            NavigationType::Link,
            Some(NavigationTarget::new("/")),
            Some(NavigationTarget::new("/post/1").with_route("/post/[id]").with_param("id", "1")),
            async move { rx.await.unwrap_or(Err(NavigationError::Cancelled)) },
        );
        let other = nav.clone();
        assert!(!nav.is_complete());
        assert_eq!(other.to().and_then(|t| t.param("id")), Some("1"));

        let mut pool = LocalPool::new();
        let seen = Rc::new(Cell::new(false));
        let seen_task = Rc::clone(&seen);
        pool.spawner()
            .spawn_local(async move {
                assert_eq!(other.complete().await, Ok(()));
                seen_task.set(true);
            })
            .unwrap();
        pool.run_until_stalled();
        assert!(!seen.get());

        tx.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert!(seen.get());
        assert!(nav.is_complete());
    }

    #[test]
    fn dropped_completion_reports_cancelled() {
        let (tx, rx) = oneshot::channel::<Result<(), NavigationError>>();
        let nav = Navigation::new(NavigationType::Goto, None, None, async move {
            rx.await.unwrap_or(Err(NavigationError::Cancelled))
        })
        .with_delta(-1);
        drop(tx);
        let result = futures::executor::block_on(nav.complete());
        assert_eq!(result, Err(NavigationError::Cancelled));
        assert_eq!(nav.delta(), Some(-1));
    }
}
