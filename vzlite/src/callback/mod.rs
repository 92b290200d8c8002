//! Entry points the runtime calls back into.
//!
//! Each entry point resolves its token in the global [`HandleRegistry`] and
//! hands the event to the value registered there. They may be called from
//! any thread. Unknown or released tokens come back as a typed
//! [`CallbackError`]; nothing here panics on bad input from the runtime.
//!
//! [`ffi`] wraps these as `extern "C"` functions.

pub mod ffi;

use thiserror::Error;
use vzlite_shared::{ForeignError, Handle, HandleError};

use crate::handle::HandleRegistry;
use crate::machine::{
    CompletionSlot, DisconnectEvent, DisconnectInbox, ExecutionState, MachineState, WindowBinding,
};

/// A callback the bridge could not deliver.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("unknown execution state code {0}")]
    UnknownState(i32),

    #[error("completion {0} was already delivered")]
    AlreadyCompleted(Handle),
}

/// An asynchronous operation finished. `error` is `None` on success.
///
/// Fires exactly once per completion token; the token is released here.
pub fn completion(token: Handle, error: Option<ForeignError>) -> Result<(), CallbackError> {
    let slot = HandleRegistry::global().resolve::<CompletionSlot>(token)?;
    slot.complete(error)
}

/// The runtime raised a new execution state.
pub fn state_changed(code: i32, token: Handle) -> Result<(), CallbackError> {
    let machine_state = HandleRegistry::global().resolve::<MachineState>(token)?;
    let state = ExecutionState::from_code(code).ok_or(CallbackError::UnknownState(code))?;
    tracing::debug!(token = %token, %state, "State changed");
    machine_state.apply(state);
    Ok(())
}

/// A network device at `index` lost its attachment.
///
/// A missing error is reported as an unspecified foreign error.
pub fn attachment_disconnected(
    index: i32,
    error: Option<ForeignError>,
    token: Handle,
) -> Result<(), CallbackError> {
    let inbox = HandleRegistry::global().resolve::<DisconnectInbox>(token)?;
    let event = DisconnectEvent {
        index,
        cause: error.unwrap_or_else(ForeignError::unspecified),
    };
    if !inbox.push(event) {
        tracing::debug!(token = %token, index, "Disconnect arrived after the inbox closed");
    }
    Ok(())
}

/// The runtime will report no more disconnects for this machine.
pub fn close_disconnected_channel(token: Handle) -> Result<(), CallbackError> {
    let inbox = HandleRegistry::global().resolve::<DisconnectInbox>(token)?;
    inbox.close();
    Ok(())
}

/// A machine's window was closed. The invalid token is ignored.
pub fn window_closed(token: Handle) -> Result<(), CallbackError> {
    if !token.is_valid() {
        return Ok(());
    }
    let binding = HandleRegistry::global().resolve::<WindowBinding>(token)?;
    binding.mark_closed();
    tracing::debug!(token = %token, "Window closed");
    Ok(())
}
