// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! List and details.
//!
//! A list of cards where only the card being opened gets the `hero`
//! transition name, and only the card being returned to gets it back
//! immediately on arrival. A `back` class marks history navigations.
//!
//! Run:
//! - `cargo run -p understory_transition_demos --example hero_action`

use kurbo::Rect;
use understory_transition::action::{ActionContext, ActionDescriptor, ElementAction};
use understory_transition::events::NavigationEvent;
use understory_transition::navigation::NavigationType;
use understory_transition::sim::{SimElement, SimHost};
use understory_transition::{TransitionRoot, ViewTransitions};

fn card_action(transitions: &ViewTransitions, id: u32) -> (SimElement, ElementAction<SimElement>) {
    let top = f64::from(id) * 250.0;
    let card = SimElement::new(Rect::new(0.0, top, 300.0, top + 200.0));
    let detail = format!("/details/{id}");
    let back_from = detail.clone();
    let action = transitions.element_action(
        card.clone(),
        ActionDescriptor::new("hero")
            .should_apply_with(move |cx: &ActionContext<SimElement>| {
                cx.is_in_viewport && cx.navigation.to().is_some_and(|to| to.url == detail)
            })
            .apply_immediately_with(move |cx: &ActionContext<SimElement>| {
                cx.navigation.from().is_some_and(|from| from.url == back_from)
            }),
    );
    (card, action)
}

fn show(host: &SimHost, cards: &[(SimElement, ElementAction<SimElement>)]) {
    for (i, (card, _)) in cards.iter().enumerate() {
        println!("  card {i}: {:?}", card.transition_name());
    }
    println!("  root classes: {:?}", host.document.classes());
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut host = SimHost::new();
    let root = TransitionRoot::new(host.environment());
    let transitions = root.setup();

    let cards: Vec<_> = (0..4).map(|id| card_action(&transitions, id)).collect();

    println!("open /details/1");
    let mut nav = host.navigate(NavigationType::Link, "/", "/details/1");
    show(&host, &cards);
    host.run_until_stalled();
    nav.complete();
    host.run_until_stalled();
    host.transitions.finish();
    host.run_until_stalled();
    println!("after the transition");
    show(&host, &cards);

    // Card 3 sits below the fold: even when opened it keeps no name.
    println!("open /details/3 (below the fold)");
    let mut nav = host.navigate(NavigationType::Link, "/", "/details/3");
    show(&host, &cards);
    host.run_until_stalled();
    nav.complete();
    host.run_until_stalled();
    host.transitions.finish();
    host.run_until_stalled();

    // Classes are one-shot; a page asks for them again each time it mounts.
    transitions.classes_with(
        |event: &NavigationEvent| {
            (event.navigation.kind() == NavigationType::Popstate).then(|| vec!["back".to_owned()])
        },
        false,
    );
    println!("back from /details/1");
    let mut nav = host.navigate(NavigationType::Popstate, "/details/1", "/");
    host.run_until_stalled();
    nav.complete();
    host.run_until_stalled();
    println!("arrived, transition still running");
    show(&host, &cards);
    host.transitions.finish();
    host.run_until_stalled();
    println!("after the transition");
    show(&host, &cards);
}
