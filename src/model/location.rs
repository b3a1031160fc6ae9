//! Source locations for slots and constraints

use std::fmt;
use std::sync::Arc;

/// An opaque reference to the source position a slot or constraint is
/// attached to
///
/// Locations are supplied by the program-analysis front end. A slot created
/// for a position the front end could not resolve carries the
/// [`Location::Missing`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// No resolvable source position
    Missing,
    /// A position within a source file
    Source {
        /// Path of the source file
        path: Arc<str>,
        /// Byte offset of the annotated position within the file
        offset: u32,
    },
}

impl Location {
    /// The missing-location sentinel
    pub const MISSING: Location = Location::Missing;

    /// Returns the missing-location sentinel
    pub fn missing() -> Location {
        Location::Missing
    }

    /// Creates a source location
    pub fn source(path: &str, offset: u32) -> Location {
        Location::Source {
            path: Arc::from(path),
            offset,
        }
    }

    /// Returns true if this is the missing-location sentinel
    pub fn is_missing(&self) -> bool {
        matches!(self, Location::Missing)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Missing => write!(f, "<missing>"),
            Location::Source { path, offset } => write!(f, "{}:{}", path, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sentinel() {
        assert!(Location::missing().is_missing());
        assert!(!Location::source("A.java", 10).is_missing());
    }

    #[test]
    fn structural_equality() {
        assert_eq!(Location::source("A.java", 10), Location::source("A.java", 10));
        assert_ne!(Location::source("A.java", 10), Location::source("A.java", 11));
        assert_ne!(Location::source("A.java", 10), Location::missing());
    }

    #[test]
    fn display() {
        assert_eq!(Location::source("A.java", 10).to_string(), "A.java:10");
        assert_eq!(Location::missing().to_string(), "<missing>");
    }
}
