// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle trace.
//!
//! Prints every lifecycle event of two navigations through the simulated host,
//! shows a listener registered mid-transition being held back until the next
//! one, and a failing listener that does not disturb its siblings.
//!
//! Run:
//! - `cargo run -p understory_transition_demos --example lifecycle_trace`
//! - `RUST_LOG=understory_transition=trace cargo run -p understory_transition_demos --example lifecycle_trace`

use understory_transition::events::{
    AfterNavigationComplete, BeforeNavigation, BeforeNavigationComplete,
    BeforeStartViewTransition, LifecycleEvent, NavigationEvent, TransitionEvent,
    TransitionFinished, TransitionReady, UpdateCallbackDone,
};
use understory_transition::navigation::NavigationType;
use understory_transition::sim::SimHost;
use understory_transition::{ListenerError, SubscribeOptions, TransitionRoot, ViewTransitions};

fn trace_navigation<E>(transitions: &ViewTransitions)
where
    E: LifecycleEvent<Payload = NavigationEvent>,
{
    transitions.register::<E, _>(
        |event: &NavigationEvent| {
            let to = event.navigation.to().map_or("-", |t| t.url.as_str());
            println!("  {:<30} -> {to}", E::KIND);
        },
        SubscribeOptions::empty(),
    );
}

fn trace_transition<E>(transitions: &ViewTransitions)
where
    E: LifecycleEvent<Payload = TransitionEvent>,
{
    transitions.register::<E, _>(
        |event: &TransitionEvent| {
            let finished = event.transition.finished().peek().is_some();
            println!("  {:<30} (finished: {finished})", E::KIND);
        },
        SubscribeOptions::empty(),
    );
}

fn navigate(host: &mut SimHost, from: &str, to: &str) {
    println!("navigate {from} -> {to}");
    let mut nav = host.navigate(NavigationType::Link, from, to);
    host.run_until_stalled();
    nav.complete();
    host.run_until_stalled();
    host.transitions.finish();
    host.run_until_stalled();
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut host = SimHost::new();
    let root = TransitionRoot::new(host.environment());
    let transitions = root.setup();

    trace_navigation::<BeforeStartViewTransition>(&transitions);
    trace_navigation::<BeforeNavigation>(&transitions);
    trace_navigation::<BeforeNavigationComplete>(&transitions);
    trace_navigation::<AfterNavigationComplete>(&transitions);
    trace_transition::<TransitionReady>(&transitions);
    trace_transition::<UpdateCallbackDone>(&transitions);
    trace_transition::<TransitionFinished>(&transitions);

    transitions.register::<BeforeNavigation, _>(
        |_: &NavigationEvent| Err::<(), _>(ListenerError::new("flaky analytics hook")),
        SubscribeOptions::empty(),
    );

    navigate(&mut host, "/", "/posts");

    // Registered while a transition is in flight: queued until it ends.
    let mut nav = host.navigate(NavigationType::Link, "/posts", "/posts/1");
    host.run_until_stalled();
    transitions.register::<AfterNavigationComplete, _>(
        |_: &NavigationEvent| println!("  late listener"),
        SubscribeOptions::AUTO_CLEAN,
    );
    println!(
        "late listener queued: {} pending registration(s)",
        root.bus().pending_count()
    );
    nav.complete();
    host.run_until_stalled();
    host.transitions.finish();
    host.run_until_stalled();

    navigate(&mut host, "/posts/1", "/");
}
