// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Navigation lifecycle driver.
//!
//! ## Overview
//!
//! [`drive_navigation`] is what the root installs as the host's navigation
//! interceptor. For each navigation it starts one native view transition and
//! emits the seven lifecycle events around it:
//!
//! 1. `before-start-view-transition`, synchronously.
//! 2. Inside the native update callback: the phase flips to in-transition,
//!    then `before-navigation`, then the host is allowed to render, then
//!    `before-navigation-complete`. Once the navigation's completion signal
//!    resolves, `after-navigation-complete`.
//! 3. From spawned continuations on the native awaitables: `transition-ready`,
//!    `update-callback-done` and finally `transition-finished`, after which the
//!    phase flips back and deferred registrations are activated.
//!
//! Without a native primitive nothing is emitted and the navigation is not
//! delayed. Rejected awaitables are logged and their event is skipped; a
//! rejected `finished` still ends the phase so that later navigations are not
//! blocked by a transition that will never report completion.

use std::future::Future;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use tracing::{debug, trace, warn};

use crate::bus::{EventBus, WeakEventBus};
use crate::error::TransitionError;
use crate::events::{
    AfterNavigationComplete, BeforeNavigation, BeforeNavigationComplete,
    BeforeStartViewTransition, LifecycleEvent, NavigationEvent, TransitionEvent,
    TransitionFinished, TransitionReady, UpdateCallbackDone,
};
use crate::host::{UpdateCallback, ViewTransitionApi};
use crate::navigation::Navigation;
use crate::transition::{Lifecycle, TransitionHandle};

/// Handle one intercepted navigation.
///
/// Returns the future the host must await before rendering the destination,
/// or `None` when no transition was started.
pub fn drive_navigation(
    bus: &EventBus,
    transitions: &dyn ViewTransitionApi,
    spawner: &dyn LocalSpawn,
    navigation: Navigation,
) -> Option<LocalBoxFuture<'static, ()>> {
    if !transitions.is_supported() {
        trace!("view transitions unsupported, navigation left alone");
        return None;
    }

    let event = NavigationEvent {
        navigation: navigation.clone(),
    };
    fire::<BeforeStartViewTransition>(bus, &event);

    let (unblock, unblocked) = oneshot::channel::<()>();
    let update = update_callback(bus.downgrade(), event, unblock);
    let handle = match transitions.start(update) {
        Ok(handle) => handle,
        Err(error) => {
            warn!(%error, "native view transition did not start");
            return None;
        }
    };
    debug!(kind = ?navigation.kind(), "view transition started");

    let weak = bus.downgrade();
    let watchers: [LocalBoxFuture<'static, ()>; 3] = [
        watch::<TransitionReady>(weak.clone(), &navigation, &handle, handle.ready(), false)
            .boxed_local(),
        watch::<UpdateCallbackDone>(
            weak.clone(),
            &navigation,
            &handle,
            handle.update_callback_done(),
            false,
        )
        .boxed_local(),
        watch::<TransitionFinished>(weak, &navigation, &handle, handle.finished(), true)
            .boxed_local(),
    ];
    for watcher in watchers {
        if let Err(error) = spawner.spawn_local(watcher) {
            warn!(%error, "could not spawn a transition lifecycle task");
        }
    }

    Some(
        async move {
            // A dropped sender means the update callback will never run;
            // rendering must not wait on it.
            let _ = unblocked.await;
        }
        .boxed_local(),
    )
}

fn update_callback(
    bus: WeakEventBus,
    event: NavigationEvent,
    unblock: oneshot::Sender<()>,
) -> UpdateCallback {
    Box::new(move || {
        async move {
            let Some(bus) = bus.upgrade() else {
                let _ = unblock.send(());
                return Ok(());
            };
            bus.begin_transition();
            fire::<BeforeNavigation>(&bus, &event);
            let _ = unblock.send(());
            fire::<BeforeNavigationComplete>(&bus, &event);
            if let Err(error) = event.navigation.complete().await {
                warn!(%error, "navigation did not complete");
                return Err(TransitionError::Navigation(error));
            }
            fire::<AfterNavigationComplete>(&bus, &event);
            Ok(())
        }
        .boxed_local()
    })
}

fn watch<E>(
    bus: WeakEventBus,
    navigation: &Navigation,
    handle: &TransitionHandle,
    awaitable: Lifecycle,
    ends_transition: bool,
) -> impl Future<Output = ()> + 'static
where
    E: LifecycleEvent<Payload = TransitionEvent>,
{
    let event = TransitionEvent {
        navigation: navigation.clone(),
        transition: handle.clone(),
    };
    async move {
        let outcome = awaitable.await;
        let Some(bus) = bus.upgrade() else {
            return;
        };
        match outcome {
            Ok(()) => fire::<E>(&bus, &event),
            Err(error) => warn!(event = %E::KIND, %error, "transition awaitable rejected"),
        }
        if ends_transition {
            bus.end_transition();
        }
    }
}

fn fire<E: LifecycleEvent>(bus: &EventBus, payload: &E::Payload) {
    let report = bus.emit::<E>(payload);
    if !report.is_ok() {
        debug!(
            event = %E::KIND,
            invoked = report.invoked(),
            failed = report.failures().count(),
            "listeners failed"
        );
    }
}
