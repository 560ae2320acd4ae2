// src/models/outcome.rs

//! Tagged results for best-effort operations.

/// Result of an operation that can degrade instead of failing outright.
///
/// Fetches return `Failure` for transport problems (the "no content" case);
/// selector lookups return `Degraded` when a selector had to be interpreted
/// best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Clean success
    Success(T),
    /// Usable value reached through a fallback path
    Degraded { value: T, reason: String },
    /// Nothing usable
    Failure(String),
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    /// Borrow the value of a success or degraded success.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Take the value of a success or degraded success.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
            Self::Failure(reason) => Outcome::Failure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_keeps_value_and_reason() {
        let outcome = Outcome::degraded(3, "visible fallback");
        assert_eq!(outcome.value(), Some(&3));
        assert_eq!(
            outcome,
            Outcome::Degraded {
                value: 3,
                reason: "visible fallback".into()
            }
        );
        assert!(outcome.is_degraded());
    }

    #[test]
    fn test_map_preserves_tag() {
        let failed: Outcome<i32> = Outcome::failure("HTTP 404");
        assert_eq!(failed.map(|v| v * 2), Outcome::Failure("HTTP 404".into()));
        let ok = Outcome::Success("abc").map(str::len);
        assert_eq!(ok, Outcome::Success(3));
    }
}
