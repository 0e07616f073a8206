//! Outcome of a bounded wait.

/// Result of waiting for a correlated response.
///
/// `TimedOut` means no matching answer arrived before the deadline. It is
/// kept apart from [`BrokerError`](crate::BrokerError) so callers can tell
/// "nobody answered" from "the transport failed" or "the remote refused".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The exchange finished with a value.
    Completed(T),
    /// The deadline elapsed first.
    TimedOut,
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    /// Convert into an `Option`, mapping `TimedOut` to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::TimedOut => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::TimedOut => Outcome::TimedOut,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Outcome::Completed(v),
            None => Outcome::TimedOut,
        }
    }
}
