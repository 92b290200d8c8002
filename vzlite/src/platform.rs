//! Platform version gating.
//!
//! Some runtime features only exist from a given platform release onwards.
//! Gates are checked before any foreign call so an unsupported request never
//! reaches the runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use vzlite_shared::{VzError, VzResult};

/// Minimum platform releases for gated features.
pub mod min {
    /// Creating a virtual machine.
    pub const MACHINE: u32 = 11;
    /// Forced stop, graphics windows, network disconnect notifications.
    pub const STOP_AND_GRAPHICS: u32 = 12;
    /// Starting from the recovery partition.
    pub const RECOVERY_START: u32 = 13;
}

/// Release of the host platform reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_at_least(&self, major: u32) -> bool {
        self.major >= major
    }

    /// Fail with `UnsupportedOnPlatform` unless this release is `major` or newer.
    pub fn require(&self, major: u32) -> VzResult<()> {
        if self.is_at_least(major) {
            Ok(())
        } else {
            Err(VzError::UnsupportedOnPlatform {
                required: major,
                actual: self.to_string(),
            })
        }
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        let v = PlatformVersion::new(12, 3);
        assert!(v.require(min::MACHINE).is_ok());
        assert!(v.require(min::STOP_AND_GRAPHICS).is_ok());

        match v.require(min::RECOVERY_START) {
            Err(VzError::UnsupportedOnPlatform { required, actual }) => {
                assert_eq!(required, 13);
                assert_eq!(actual, "12.3");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
