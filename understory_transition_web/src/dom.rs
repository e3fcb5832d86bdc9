// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM surface: elements, the document root and the window.

use kurbo::Rect;
use tracing::warn;
use understory_transition::host::{RootClassList, TransitionTarget, Viewport};
use web_sys::{CssStyleDeclaration, Document, DomTokenList, HtmlElement, SvgElement, Window};

use crate::WebError;

const TRANSITION_NAME: &str = "view-transition-name";

/// An element that can carry a transition identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomElement {
    /// An HTML element.
    Html(HtmlElement),
    /// An SVG element.
    Svg(SvgElement),
}

impl From<HtmlElement> for DomElement {
    fn from(element: HtmlElement) -> Self {
        Self::Html(element)
    }
}

impl From<SvgElement> for DomElement {
    fn from(element: SvgElement) -> Self {
        Self::Svg(element)
    }
}

impl DomElement {
    fn style(&self) -> CssStyleDeclaration {
        match self {
            Self::Html(element) => element.style(),
            Self::Svg(element) => element.style(),
        }
    }

    fn element(&self) -> &web_sys::Element {
        match self {
            Self::Html(element) => element,
            Self::Svg(element) => element,
        }
    }
}

impl TransitionTarget for DomElement {
    fn set_transition_name(&self, name: Option<&str>) {
        let style = self.style();
        let result = match name {
            Some(name) => style.set_property(TRANSITION_NAME, name),
            None => style.remove_property(TRANSITION_NAME).map(drop),
        };
        if let Err(error) = result {
            warn!(?error, ?name, "could not write view-transition-name");
        }
    }

    fn bounding_rect(&self) -> Rect {
        let rect = self.element().get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.right(), rect.bottom())
    }
}

/// `document.documentElement.classList`.
#[derive(Clone, Debug)]
pub struct DocumentRoot {
    classes: DomTokenList,
}

impl DocumentRoot {
    /// Class list of `document`'s root element.
    pub fn new(document: &Document) -> Result<Self, WebError> {
        let root = document
            .document_element()
            .ok_or(WebError::NoDocumentElement)?;
        Ok(Self {
            classes: root.class_list(),
        })
    }
}

impl RootClassList for DocumentRoot {
    fn add_classes(&self, classes: &[String]) {
        for class in classes {
            if let Err(error) = self.classes.add_1(class) {
                warn!(?error, %class, "could not add root class");
            }
        }
    }

    fn remove_classes(&self, classes: &[String]) {
        for class in classes {
            if let Err(error) = self.classes.remove_1(class) {
                warn!(?error, %class, "could not remove root class");
            }
        }
    }
}

/// The browser window.
#[derive(Clone, Debug)]
pub struct WindowViewport {
    window: Window,
}

impl WindowViewport {
    /// Viewport of `window`.
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Viewport for WindowViewport {
    fn visible_rect(&self) -> Rect {
        let x = self.window.scroll_x().unwrap_or(0.0);
        let y = self.window.scroll_y().unwrap_or(0.0);
        let width = self
            .window
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or(0.0);
        let height = self
            .window
            .inner_height()
            .ok()
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0);
        Rect::new(x, y, x + width, y + height)
    }
}
