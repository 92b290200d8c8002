//! Opaque tokens that cross the foreign-function boundary.

use std::fmt;

/// Opaque token identifying one value held by a handle registry.
///
/// The token is an integer, never a pointer: the native side stores it as a
/// `uintptr_t` and hands it back verbatim on every callback. Zero is reserved
/// and never names a live value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// The reserved token that never resolves.
    pub const INVALID: Handle = Handle(0);

    /// Rebuild a token from the raw value the native side passed back.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw value to pass across the boundary.
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
