//! NativeMachine - operations on one created machine.

use vzlite_shared::{ForeignError, Handle};

use crate::config::StartOptions;

/// Operations on a native machine.
///
/// Methods taking a `completion` token return as soon as the request has been
/// queued; the runtime reports the outcome through
/// [`crate::callback::completion`]. Capability queries and `request_stop`
/// are synchronous.
pub trait NativeMachine: Send + Sync {
    /// Start a machine that is stopped or in the error state.
    fn start(&self, options: &StartOptions, completion: Handle);

    /// Pause a running machine.
    fn pause(&self, completion: Handle);

    /// Resume a paused machine.
    fn resume(&self, completion: Handle);

    /// Forcefully stop a running or paused machine.
    fn stop(&self, completion: Handle);

    /// Ask the guest to turn itself off.
    ///
    /// Returns whether the request was delivered.
    fn request_stop(&self) -> Result<bool, ForeignError>;

    fn can_start(&self) -> bool;

    fn can_pause(&self) -> bool;

    fn can_resume(&self) -> bool;

    fn can_request_stop(&self) -> bool;

    fn can_stop(&self) -> bool;

    /// Release the native machine.
    ///
    /// Called exactly once, at teardown. The runtime fires the
    /// disconnect channel-close callback as part of releasing.
    fn release(&self);
}
