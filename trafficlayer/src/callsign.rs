//! Callsign identity type.
//!
//! A callsign is the primary key for everything in the airspace: aircraft,
//! ATC stations and client records are all keyed by it. Equality is
//! ASCII-case-insensitive; the constructor normalizes to uppercase so the
//! normalized form can be used directly for hashing and ordering.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Case-insensitive identifier for an aircraft or ATC station.
///
/// Immutable once constructed. The inner string is stored uppercased and
/// trimmed, so two callsigns that differ only in case compare equal:
///
/// ```
/// use trafficlayer::callsign::Callsign;
///
/// let a = Callsign::new("dlh123").unwrap();
/// let b = Callsign::new("DLH123").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Callsign(String);

impl Callsign {
    /// Create a callsign from a raw string.
    ///
    /// The input is trimmed and uppercased. Empty or whitespace-only input
    /// is rejected.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyCallsign);
        }
        Ok(Self(normalized))
    }

    /// The normalized (uppercase) callsign string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Callsign {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
