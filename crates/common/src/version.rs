use serde::{Deserialize, Serialize};

/// Row version used for optimistic concurrency control.
///
/// A freshly constructed aggregate is at `initial()` (0) and has never been
/// persisted. Every successful commit of the aggregate advances it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of an aggregate that has never been persisted.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version written by the first commit.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true if the aggregate has never been persisted.
    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_zero_and_next_increments() {
        let v = Version::initial();
        assert!(v.is_initial());
        assert_eq!(v.next(), Version::first());
        assert_eq!(v.next().next().as_i64(), 2);
    }
}
