// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `document.startViewTransition`.

use std::future::Future;

use futures::future::FutureExt;
use js_sys::{Function, Promise, Reflect};
use understory_transition::error::TransitionError;
use understory_transition::host::{UpdateCallback, ViewTransitionApi};
use understory_transition::transition::TransitionHandle;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};
use web_sys::{Document, DomException};

const START: &str = "startViewTransition";

#[wasm_bindgen]
extern "C" {
    /// The object returned by `startViewTransition`.
    #[derive(Clone)]
    type ViewTransition;

    #[wasm_bindgen(method, getter)]
    fn ready(this: &ViewTransition) -> Promise;

    #[wasm_bindgen(method, getter, js_name = "updateCallbackDone")]
    fn update_callback_done(this: &ViewTransition) -> Promise;

    #[wasm_bindgen(method, getter)]
    fn finished(this: &ViewTransition) -> Promise;

    #[wasm_bindgen(method, js_name = "skipTransition")]
    fn skip_transition(this: &ViewTransition);
}

/// The browser's native view transition primitive.
#[derive(Clone, Debug)]
pub struct NativeViewTransitions {
    document: Document,
}

impl NativeViewTransitions {
    /// Use `document.startViewTransition`.
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    // `Document` in web-sys has no binding for this method yet.
    fn start_view_transition(&self, update: &Function) -> Result<ViewTransition, TransitionError> {
        let start: Function = Reflect::get(&self.document, &JsValue::from_str(START))
            .map_err(rejection)?
            .dyn_into()
            .map_err(|_| TransitionError::Unsupported)?;
        let transition = start.call1(&self.document, update).map_err(rejection)?;
        Ok(transition.unchecked_into())
    }
}

impl ViewTransitionApi for NativeViewTransitions {
    fn is_supported(&self) -> bool {
        Reflect::has(&self.document, &JsValue::from_str(START)).unwrap_or(false)
    }

    fn start(&self, update: UpdateCallback) -> Result<TransitionHandle, TransitionError> {
        if !self.is_supported() {
            return Err(TransitionError::Unsupported);
        }
        let callback: Function = Closure::once_into_js(move || -> Promise {
            future_to_promise(async move {
                update()
                    .await
                    .map(|()| JsValue::UNDEFINED)
                    .map_err(|error| JsValue::from_str(&error.to_string()))
            })
        })
        .unchecked_into();
        let transition = self.start_view_transition(&callback)?;

        let skip = transition.clone();
        Ok(TransitionHandle::new(
            settled(transition.ready()),
            settled(transition.update_callback_done()),
            settled(transition.finished()),
            move || skip.skip_transition(),
        ))
    }
}

fn settled(promise: Promise) -> impl Future<Output = Result<(), TransitionError>> + 'static {
    JsFuture::from(promise).map(|result| result.map(drop).map_err(rejection))
}

fn rejection(error: JsValue) -> TransitionError {
    match error.dyn_ref::<DomException>() {
        Some(exception) if exception.name() == "AbortError" => TransitionError::Skipped,
        Some(exception) => TransitionError::Aborted(format!(
            "{}: {}",
            exception.name(),
            exception.message()
        )),
        None => TransitionError::Aborted(
            error
                .as_string()
                .unwrap_or_else(|| format!("{error:?}")),
        ),
    }
}
