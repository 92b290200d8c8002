//! Contract with the native virtualization runtime.
//!
//! The runtime is a black box reached through two traits:
//!
//! - **VirtualizationEngine**: process-level entry point (platform version,
//!   machine creation)
//! - **NativeMachine**: operations on one created machine
//!
//! Asynchronous operations never return their outcome directly. They take a
//! completion [`Handle`] and the runtime later reports the outcome through
//! [`crate::callback::completion`] exactly once, from a thread of its choice.
//! Persistent tokens handed over at creation time are used the same way for
//! state changes and network disconnects.

mod handler;

pub use handler::NativeMachine;

use std::fmt;

use uuid::Uuid;
use vzlite_shared::{Handle, VzResult};

use crate::config::VirtualMachineConfiguration;
use crate::platform::PlatformVersion;

/// Identity of one machine, also used as its dispatch queue label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineId(Uuid);

impl MachineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Persistent tokens the runtime passes back on every machine-level callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineCallbacks {
    /// Passed to [`crate::callback::state_changed`].
    pub state: Handle,
    /// Passed to [`crate::callback::attachment_disconnected`] and
    /// [`crate::callback::close_disconnected_channel`].
    pub disconnect: Handle,
}

/// Process-level entry point of the runtime.
pub trait VirtualizationEngine: Send + Sync {
    /// Release of the host platform, used for feature gating.
    fn platform_version(&self) -> PlatformVersion;

    /// Create a native machine.
    ///
    /// The configuration has been validated. The runtime keeps `callbacks`
    /// and reports state changes and network disconnects through them until
    /// [`NativeMachine::release`] is called.
    fn create_machine(
        &self,
        id: MachineId,
        config: &VirtualMachineConfiguration,
        callbacks: MachineCallbacks,
    ) -> VzResult<Box<dyn NativeMachine>>;
}
