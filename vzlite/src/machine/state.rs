//! Execution state and its broadcast channel.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::notify::{NotifyChannel, NotifyReceiver};

/// Execution state of a machine, as reported by the runtime.
///
/// Discriminants are the runtime's state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExecutionState {
    /// Initial state before the machine is started.
    #[default]
    Stopped = 0,
    Running = 1,
    /// Only reachable from `Pausing`.
    Paused = 2,
    /// The machine hit an internal error.
    Error = 3,
    /// Configuring the hardware and starting.
    Starting = 4,
    /// Between `Running` and `Paused`.
    Pausing = 5,
    /// Between `Paused` and `Running`.
    Resuming = 6,
    /// Between `Running` and `Stopped`.
    Stopping = 7,
    /// Saving a paused machine.
    Saving = 8,
    /// Restoring from `Stopped`; ends `Paused` on success, `Stopped` on failure.
    Restoring = 9,
}

impl ExecutionState {
    /// Map a runtime state code. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Stopped,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Error,
            4 => Self::Starting,
            5 => Self::Pausing,
            6 => Self::Resuming,
            7 => Self::Stopping,
            8 => Self::Saving,
            9 => Self::Restoring,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// States in which the machine has left the running set for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Starting => "starting",
            Self::Pausing => "pausing",
            Self::Resuming => "resuming",
            Self::Stopping => "stopping",
            Self::Saving => "saving",
            Self::Restoring => "restoring",
        };
        f.write_str(name)
    }
}

/// Current state plus the broadcast of every change.
///
/// Registered under the machine's persistent state token. The state observer
/// callback is the single writer.
pub(crate) struct MachineState {
    state: RwLock<ExecutionState>,
    notify: NotifyChannel<ExecutionState>,
}

impl MachineState {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(ExecutionState::default()),
            notify: NotifyChannel::new(),
        }
    }

    pub(crate) fn current(&self) -> ExecutionState {
        *self.state.read()
    }

    pub(crate) fn subscribe(&self) -> NotifyReceiver<ExecutionState> {
        self.notify.subscribe()
    }

    /// Record a new state and publish it.
    ///
    /// Publishing under the write lock keeps every subscriber's order equal
    /// to the order the runtime raised the states. Publish never blocks.
    pub(crate) fn apply(&self, new_state: ExecutionState) {
        let mut state = self.state.write();
        *state = new_state;
        self.notify.publish(new_state);
    }

    /// End every subscriber's stream. Called once at teardown.
    pub(crate) fn close(&self) {
        self.notify.close();
    }
}
