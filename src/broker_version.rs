//! Broker version advertised in the server properties.

use std::fmt;

use crate::properties::FieldTable;

/// Server property key holding the broker's version string.
pub const VERSION_PROPERTY: &str = "version";

/// Packed `major.minor.patch` broker version.
///
/// Each component is truncated to 8 bits and packed as
/// `major << 16 | minor << 8 | patch`. The value 0 means the version is
/// unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrokerVersion(u32);

impl BrokerVersion {
    /// Version used when the broker did not advertise a usable one.
    pub const UNKNOWN: Self = Self(0);

    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self(((major & 0xFF) << 16) | ((minor & 0xFF) << 8) | (patch & 0xFF))
    }

    /// Parse a dotted version string.
    ///
    /// Anything other than exactly three dot-separated unsigned integers
    /// yields [`Self::UNKNOWN`].
    #[must_use]
    pub fn parse(version: &str) -> Self {
        let mut parts = version.trim().split('.').map(str::parse::<u32>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => {
                Self::new(major, minor, patch)
            }
            _ => Self::UNKNOWN,
        }
    }

    /// Derive the version from the broker's server properties.
    #[must_use]
    pub fn from_server_properties(properties: &FieldTable) -> Self {
        properties
            .get(VERSION_PROPERTY)
            .and_then(|value| value.as_str())
            .map_or(Self::UNKNOWN, Self::parse)
    }

    #[must_use]
    pub const fn major(self) -> u32 { (self.0 >> 16) & 0xFF }

    #[must_use]
    pub const fn minor(self) -> u32 { (self.0 >> 8) & 0xFF }

    #[must_use]
    pub const fn patch(self) -> u32 { self.0 & 0xFF }

    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }

    #[must_use]
    pub const fn is_known(self) -> bool { self.0 != 0 }
}

impl fmt::Display for BrokerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}
