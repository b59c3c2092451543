//! Tagged results of "first success wins" resolution chains.

/// Outcome of a "first success wins" resolution.
///
/// Callers can tell whether the preferred option was used or a default was substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved<T> {
    /// One of the preferred candidates succeeded.
    Preferred(T),
    /// No preferred candidate succeeded and a default was used.
    Fallback(T),
}

impl<T> Resolved<T> {
    /// Returns the resolved value regardless of how it was obtained.
    pub fn into_inner(self) -> T {
        match self {
            Resolved::Preferred(value) | Resolved::Fallback(value) => value,
        }
    }

    /// Returns a reference to the resolved value.
    pub fn value(&self) -> &T {
        match self {
            Resolved::Preferred(value) | Resolved::Fallback(value) => value,
        }
    }

    /// Returns `true` when the default was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolved::Fallback(_))
    }

    /// Maps the resolved value while keeping the tag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Resolved::Preferred(value) => Resolved::Preferred(f(value)),
            Resolved::Fallback(value) => Resolved::Fallback(f(value)),
        }
    }
}
