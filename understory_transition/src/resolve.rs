// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration values that are either fixed or computed per navigation.

use std::rc::Rc;

/// A value of type `T` that is either given up front or computed from a
/// context `Cx` at the moment it is needed.
pub enum Resolve<T, Cx> {
    /// A fixed value.
    Literal(T),
    /// A function of the context.
    Computed(Rc<dyn Fn(&Cx) -> T>),
}

impl<T: Clone, Cx> Resolve<T, Cx> {
    /// Wrap a function of the context.
    pub fn computed(f: impl Fn(&Cx) -> T + 'static) -> Self {
        Self::Computed(Rc::new(f))
    }

    /// Evaluate against `cx`.
    pub fn resolve(&self, cx: &Cx) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(f) => f(cx),
        }
    }
}

impl<T: Clone, Cx> Clone for Resolve<T, Cx> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Computed(f) => Self::Computed(Rc::clone(f)),
        }
    }
}

impl<T, Cx> From<T> for Resolve<T, Cx> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<Cx> From<&str> for Resolve<String, Cx> {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_owned())
    }
}

impl<T: core::fmt::Debug, Cx> core::fmt::Debug for Resolve<T, Cx> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_computed_values() {
        let fixed: Resolve<String, u32> = "hero".into();
        assert_eq!(fixed.resolve(&7), "hero");

        let computed = Resolve::computed(|n: &u32| format!("card-{n}"));
        assert_eq!(computed.resolve(&7), "card-7");
        assert_eq!(computed.clone().resolve(&8), "card-8");
        assert_eq!(format!("{computed:?}"), "Computed(..)");

        let flag: Resolve<bool, u32> = true.into();
        assert!(flag.resolve(&0));
    }
}
