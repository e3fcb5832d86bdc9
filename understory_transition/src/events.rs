// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle event kinds and their payloads.
//!
//! ## Overview
//!
//! Every navigation that runs through a native view transition produces the
//! same seven events. The first four describe the navigation itself and carry
//! a [`NavigationEvent`]; the last three mirror the native transition's
//! lifecycle awaitables and carry a [`TransitionEvent`].
//!
//! | Kind | Payload | When |
//! |------|---------|------|
//! | [`BeforeStartViewTransition`] | [`NavigationEvent`] | before the native transition starts |
//! | [`BeforeNavigation`] | [`NavigationEvent`] | update callback entered, DOM not yet updated |
//! | [`BeforeNavigationComplete`] | [`NavigationEvent`] | rendering unblocked |
//! | [`AfterNavigationComplete`] | [`NavigationEvent`] | navigation completed |
//! | [`TransitionReady`] | [`TransitionEvent`] | animation about to run |
//! | [`UpdateCallbackDone`] | [`TransitionEvent`] | update callback done |
//! | [`TransitionFinished`] | [`TransitionEvent`] | animation finished, always last |
//!
//! The marker types implement [`LifecycleEvent`], which ties a kind to its
//! payload type so that registration and emission are statically typed.

use crate::navigation::Navigation;
use crate::transition::TransitionHandle;

/// The seven lifecycle event kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `before-start-view-transition`
    BeforeStartViewTransition,
    /// `before-navigation`
    BeforeNavigation,
    /// `before-navigation-complete`
    BeforeNavigationComplete,
    /// `after-navigation-complete`
    AfterNavigationComplete,
    /// `transition-ready`
    TransitionReady,
    /// `update-callback-done`
    UpdateCallbackDone,
    /// `transition-finished`
    TransitionFinished,
}

impl EventKind {
    /// Number of kinds.
    pub const COUNT: usize = 7;

    /// Every kind, in lifecycle order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::BeforeStartViewTransition,
        Self::BeforeNavigation,
        Self::BeforeNavigationComplete,
        Self::AfterNavigationComplete,
        Self::TransitionReady,
        Self::UpdateCallbackDone,
        Self::TransitionFinished,
    ];

    /// Stable kebab-case name, as used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeStartViewTransition => "before-start-view-transition",
            Self::BeforeNavigation => "before-navigation",
            Self::BeforeNavigationComplete => "before-navigation-complete",
            Self::AfterNavigationComplete => "after-navigation-complete",
            Self::TransitionReady => "transition-ready",
            Self::UpdateCallbackDone => "update-callback-done",
            Self::TransitionFinished => "transition-finished",
        }
    }

    /// Whether the payload of this kind carries a [`TransitionHandle`].
    pub const fn carries_transition(self) -> bool {
        matches!(
            self,
            Self::TransitionReady | Self::UpdateCallbackDone | Self::TransitionFinished
        )
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Payload of the navigation-phase events.
#[derive(Clone, Debug)]
pub struct NavigationEvent {
    /// The navigation in progress.
    pub navigation: Navigation,
}

/// Payload of the native-lifecycle events.
#[derive(Clone, Debug)]
pub struct TransitionEvent {
    /// The navigation in progress.
    pub navigation: Navigation,
    /// The native transition driving it.
    pub transition: TransitionHandle,
}

/// Ties an event kind to its payload type.
pub trait LifecycleEvent: 'static {
    /// Runtime kind of the event.
    const KIND: EventKind;
    /// Payload delivered to listeners.
    type Payload: 'static;
}

macro_rules! lifecycle_events {
    ($($(#[$doc:meta])* $name:ident => $payload:ty;)*) => {
        $(
            $(#[$doc])*
            #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
            pub struct $name;

            impl LifecycleEvent for $name {
                const KIND: EventKind = EventKind::$name;
                type Payload = $payload;
            }
        )*
    };
}

lifecycle_events! {
    /// Emitted right before the native transition is started.
    BeforeStartViewTransition => NavigationEvent;
    /// Emitted when the native update callback begins, before rendering proceeds.
    BeforeNavigation => NavigationEvent;
    /// Emitted once the host has been told that rendering may proceed.
    BeforeNavigationComplete => NavigationEvent;
    /// Emitted after the navigation's own completion signal resolved.
    AfterNavigationComplete => NavigationEvent;
    /// Emitted when the native `ready` awaitable resolves.
    TransitionReady => TransitionEvent;
    /// Emitted when the native `updateCallbackDone` awaitable resolves.
    UpdateCallbackDone => TransitionEvent;
    /// Emitted when the native `finished` awaitable resolves; always last.
    TransitionFinished => TransitionEvent;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_indexed_in_lifecycle_order() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(
            EventKind::ALL.last().copied(),
            Some(EventKind::TransitionFinished)
        );
    }

    #[test]
    fn only_native_lifecycle_kinds_carry_a_transition() {
        let carrying: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|k| k.carries_transition())
            .map(EventKind::as_str)
            .collect();
        assert_eq!(
            carrying,
            ["transition-ready", "update-callback-done", "transition-finished"]
        );
        assert_eq!(TransitionFinished::KIND, EventKind::TransitionFinished);
        assert_eq!(
            BeforeStartViewTransition::KIND.to_string(),
            "before-start-view-transition"
        );
    }
}
