//! Version advertised on connect.
//!
//! The server picks its frame layout from the `vsn` query parameter. The
//! bundled serializers speak the 1.x layout, where every frame is a single
//! object with `topic`, `event`, `payload` and `ref` fields.

use std::fmt;

/// Version spoken by the bundled serializers.
pub const PROTOCOL_VERSION: Version = Version::new(1, 0, 0);

/// Query parameter carrying the version.
pub const VERSION_PARAM: &str = "vsn";

/// A `major.minor.patch` protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value() {
        assert_eq!(PROTOCOL_VERSION.to_string(), "1.0.0");
        assert_eq!(Version::new(2, 1, 3).to_string(), "2.1.3");
    }

    #[test]
    fn test_ordering() {
        assert!(PROTOCOL_VERSION < Version::new(2, 0, 0));
    }
}
