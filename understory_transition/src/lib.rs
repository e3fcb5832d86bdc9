// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Transition: navigation lifecycle events for native view transitions.
//!
//! Understory Transition sits between a client-side router and the platform's
//! native "start view transition" primitive.
//!
//! - Wraps each intercepted navigation in one native transition and emits a
//!   fixed sequence of lifecycle events around it.
//! - Offers a typed publish/subscribe [bus](bus) whose registrations are
//!   aware of whether a transition is in flight.
//! - Provides an [element action](action) that tags elements with a
//!   transition identifier (and the document root with classes) only for the
//!   navigations that concern them, and a [classes helper](root::ViewTransitions::classes).
//!
//! ## Lifecycle
//!
//! Every navigation that runs through a native transition emits, in order:
//!
//! 1. [`BeforeStartViewTransition`](events::BeforeStartViewTransition)
//! 2. [`BeforeNavigation`](events::BeforeNavigation)
//! 3. [`BeforeNavigationComplete`](events::BeforeNavigationComplete)
//! 4. [`AfterNavigationComplete`](events::AfterNavigationComplete)
//! 5. [`TransitionReady`](events::TransitionReady) and
//!    [`UpdateCallbackDone`](events::UpdateCallbackDone), as the native
//!    awaitables resolve
//! 6. [`TransitionFinished`](events::TransitionFinished), always last
//!
//! Between the native update callback and `TransitionFinished` the bus is in
//! the in-transition [phase](registry::Phase). Registrations made then are
//! queued until the transition ends unless they opt in with
//! [`SubscribeOptions::REGISTER_DURING_TRANSITION`](registry::SubscribeOptions::REGISTER_DURING_TRANSITION).
//!
//! ## Host integration
//!
//! Nothing here talks to a browser directly. A host supplies an
//! [`Environment`](host::Environment) implementing the traits in [`host`];
//! `understory_transition_web` does so for `web-sys`, and the `sim` feature
//! provides a headless implementation for tests and demos.
//!
//! ## API overview
//!
//! - [`TransitionRoot`](root::TransitionRoot): context object of one application root.
//! - [`ViewTransitions`](root::ViewTransitions): handle returned by
//!   [`TransitionRoot::setup`](root::TransitionRoot::setup); registers
//!   listeners, classes and element actions.
//! - [`EventBus`](bus::EventBus): the underlying bus, with
//!   [`EmitReport`](bus::EmitReport)s describing each emission.
//! - [`ElementAction`](action::ElementAction) configured by a
//!   [`TransitionAction`](action::TransitionAction).
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber:
//! listener failures at `error`, host and native failures at `warn`, phase
//! changes at `debug`, registrations and emissions at `trace`.
//!
//! # Example
//!
//! ```rust
//! use understory_transition::events::{TransitionEvent, TransitionFinished};
//! use understory_transition::navigation::NavigationType;
//! use understory_transition::registry::SubscribeOptions;
//! use understory_transition::root::TransitionRoot;
//! use understory_transition::sim::SimHost;
//!
//! let mut host = SimHost::new();
//! let root = TransitionRoot::new(host.environment());
//! let transitions = root.setup();
//!
//! let sub = transitions.register::<TransitionFinished, _>(
//!     |event: &TransitionEvent| {
//!         let to = event.navigation.to().map(|t| t.url.clone());
//!         println!("arrived at {to:?}");
//!     },
//!     SubscribeOptions::AUTO_CLEAN,
//! );
//!
//! let mut nav = host.navigate(NavigationType::Link, "/", "/about");
//! host.run_until_stalled();
//! nav.complete();
//! host.run_until_stalled();
//! host.transitions.finish();
//! host.run_until_stalled();
//!
//! // One-shot listeners are gone after their first invocation.
//! assert_eq!(root.bus().state(sub.id()), None);
//! ```

pub mod action;
pub mod bus;
pub mod classes;
pub mod driver;
pub mod error;
pub mod events;
pub mod host;
pub mod navigation;
pub mod registry;
pub mod resolve;
pub mod root;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transition;

pub use bus::{EmitReport, EventBus};
pub use error::{HostError, ListenerError, ListenerFailure, NavigationError, TransitionError};
pub use events::{EventKind, LifecycleEvent};
pub use registry::{SubscribeOptions, SubscriptionId};
pub use root::{Subscription, TransitionRoot, ViewTransitions};
