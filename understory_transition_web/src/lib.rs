// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Transition Web: browser implementations of the
//! `understory_transition` host traits.
//!
//! - [`NativeViewTransitions`]: `document.startViewTransition`, feature
//!   detected at runtime.
//! - [`DomElement`]: HTML or SVG element whose inline `view-transition-name`
//!   carries the transition identifier.
//! - [`DocumentRoot`]: `document.documentElement.classList`.
//! - [`WindowViewport`]: scroll offset and inner size of the window.
//! - [`WasmSpawner`]: runs lifecycle continuations with
//!   `wasm_bindgen_futures::spawn_local`.
//!
//! The router's navigation interceptor is framework specific and has to be
//! provided by the application; [`environment`] assembles the rest.
//!
//! This crate only does useful work on `wasm32-unknown-unknown`.

mod dom;
mod native;
mod spawn;

use std::rc::Rc;

use thiserror::Error;
use understory_transition::host::{Environment, NavigationHost};

pub use dom::{DocumentRoot, DomElement, WindowViewport};
pub use native::NativeViewTransitions;
pub use spawn::WasmSpawner;

/// Failure to reach a browser global.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebError {
    /// No `window` (not running on the main thread of a page).
    #[error("no global `window`")]
    NoWindow,
    /// The window has no document.
    #[error("window has no document")]
    NoDocument,
    /// The document has no root element.
    #[error("document has no root element")]
    NoDocumentElement,
}

/// Environment for the current page, using `navigation` as the router.
pub fn environment(navigation: Rc<dyn NavigationHost>) -> Result<Environment, WebError> {
    let window = web_sys::window().ok_or(WebError::NoWindow)?;
    let document = window.document().ok_or(WebError::NoDocument)?;
    Ok(Environment {
        navigation,
        transitions: Rc::new(NativeViewTransitions::new(document.clone())),
        root: Rc::new(DocumentRoot::new(&document)?),
        viewport: Rc::new(WindowViewport::new(window)),
        spawner: Rc::new(WasmSpawner),
    })
}
