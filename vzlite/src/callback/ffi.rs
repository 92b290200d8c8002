//! C ABI for the callback entry points.
//!
//! Tokens arrive as `uintptr_t`. Errors arrive as a nullable pointer to a
//! [`RawForeignError`] that is only borrowed for the duration of the call.
//! Failures are logged; nothing unwinds across the boundary.

use std::ffi::{CStr, c_char, c_int};

use vzlite_shared::{ForeignError, Handle};

use super::CallbackError;

/// C layout of the runtime's error object.
///
/// `domain` and `description` are NUL-terminated UTF-8 strings or null.
#[repr(C)]
#[derive(Debug)]
pub struct RawForeignError {
    pub domain: *const c_char,
    pub code: i64,
    pub description: *const c_char,
}

/// Copy a borrowed runtime error into an owned [`ForeignError`].
///
/// # Safety
///
/// `raw` must be null or point to a valid `RawForeignError` whose string
/// fields are null or valid NUL-terminated strings, all live for the call.
pub unsafe fn foreign_error_from_raw(raw: *const RawForeignError) -> Option<ForeignError> {
    // SAFETY: caller guarantees `raw` is null or valid.
    let raw = unsafe { raw.as_ref() }?;
    // SAFETY: caller guarantees the string fields are null or valid.
    let domain = unsafe { lossy_string(raw.domain) };
    let description = unsafe { lossy_string(raw.description) };
    Some(ForeignError::new(domain, raw.code, description))
}

unsafe fn lossy_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null and NUL-terminated per caller contract.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn report(callback: &'static str, token: usize, result: Result<(), CallbackError>) {
    if let Err(e) = result {
        tracing::error!(callback, token, error = %e, "Runtime callback could not be delivered");
    }
}

/// # Safety
///
/// `error` must satisfy the contract of [`foreign_error_from_raw`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vzlite_virtual_machine_completion_handler(
    token: usize,
    error: *const RawForeignError,
) {
    // SAFETY: forwarded caller contract.
    let error = unsafe { foreign_error_from_raw(error) };
    report(
        "completion",
        token,
        super::completion(Handle::from_raw(token), error),
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn vzlite_change_state_on_observer(new_state: c_int, token: usize) {
    report(
        "state_changed",
        token,
        super::state_changed(new_state, Handle::from_raw(token)),
    );
}

/// # Safety
///
/// `error` must satisfy the contract of [`foreign_error_from_raw`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vzlite_emit_attachment_was_disconnected(
    index: c_int,
    error: *const RawForeignError,
    token: usize,
) {
    // SAFETY: forwarded caller contract.
    let error = unsafe { foreign_error_from_raw(error) };
    report(
        "attachment_disconnected",
        token,
        super::attachment_disconnected(index, error, Handle::from_raw(token)),
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn vzlite_close_attachment_was_disconnected_channel(token: usize) {
    report(
        "close_disconnected_channel",
        token,
        super::close_disconnected_channel(Handle::from_raw(token)),
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn vzlite_window_did_close(token: usize) {
    report(
        "window_closed",
        token,
        super::window_closed(Handle::from_raw(token)),
    );
}
