// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Nothing in this crate is fatal to the host. Listener failures are isolated
//! per listener and surfaced through [`EmitReport`](crate::bus::EmitReport);
//! host and native failures are logged and the affected event simply does
//! not fire.

use std::fmt::Display;

use thiserror::Error;

/// A navigation did not complete.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// The navigation was superseded or aborted by the host.
    #[error("navigation was cancelled")]
    Cancelled,
    /// The host reported a failure while loading or rendering the destination.
    #[error("navigation failed: {0}")]
    Failed(String),
}

/// A native view transition failed to start or one of its lifecycle
/// awaitables was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The native primitive is not available in this environment.
    #[error("view transitions are not supported")]
    Unsupported,
    /// The transition was skipped before it could animate.
    #[error("view transition was skipped")]
    Skipped,
    /// The native primitive aborted the transition.
    #[error("view transition aborted: {0}")]
    Aborted(String),
    /// The update callback failed because the navigation did not complete.
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// The host's "run after navigation settles" hook could not be used.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// The hook was called from inside one of its own callbacks.
    #[error("after-navigate hook called re-entrantly")]
    Reentrant,
    /// The hook is not usable in the current call context.
    #[error("after-navigate hook unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by a listener callback.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    /// Create an error from anything displayable.
    pub fn new(message: impl Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a single listener invocation did not succeed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ListenerFailure {
    /// The callback returned an error.
    #[error("listener returned an error: {0}")]
    Error(#[from] ListenerError),
    /// The callback panicked; the payload message is kept when it is a string.
    /// Never produced under `panic = "abort"` (e.g. `wasm32-unknown-unknown`).
    #[error("listener panicked: {0}")]
    Panicked(String),
    /// The callback was already running further up the stack (re-entrant emit).
    #[error("listener is already running")]
    Busy,
}

/// Conversion of a callback's return value into a listener outcome.
///
/// Implemented for `()` and for `Result<(), E>` with a displayable error, so
/// plain closures and fallible closures can both be registered.
pub trait IntoListenerResult {
    /// Convert into the bus's listener result.
    fn into_listener_result(self) -> Result<(), ListenerError>;
}

impl IntoListenerResult for () {
    #[inline]
    fn into_listener_result(self) -> Result<(), ListenerError> {
        Ok(())
    }
}

impl<E: Display> IntoListenerResult for Result<(), E> {
    #[inline]
    fn into_listener_result(self) -> Result<(), ListenerError> {
        self.map_err(ListenerError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_error_converts_into_transition_error() {
        let err: TransitionError = NavigationError::Failed("404".into()).into();
        assert_eq!(err.to_string(), "navigation failed: 404");
    }

    #[test]
    fn fallible_results_keep_their_message() {
        let ok: Result<(), &str> = Ok(());
        assert!(ok.into_listener_result().is_ok());
        let err: Result<(), &str> = Err("boom");
        assert_eq!(err.into_listener_result().unwrap_err().message(), "boom");
        assert!(().into_listener_result().is_ok());
    }
}
