//! Completion-handler to blocking-call adapter.
//!
//! The runtime reports the outcome of an asynchronous operation by calling a
//! completion function exactly once. [`CompletionBridge::invoke`] registers a
//! one-shot slot, passes its token to the foreign call and blocks on a
//! single-slot channel until the slot fires. The slot releases its own token
//! after delivering, so the entry point never races a release against the
//! invocation.
//!
//! No timeout is imposed: if the runtime never fires the completion the call
//! blocks forever. Callers needing a deadline must wrap the call themselves.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use vzlite_shared::{ForeignError, Handle, VzError, VzResult};

use crate::callback::CallbackError;
use crate::handle::HandleRegistry;

type Outcome = Option<ForeignError>;

/// One-shot slot registered for a single asynchronous operation.
pub(crate) struct CompletionSlot {
    handle: Handle,
    operation: &'static str,
    registry: &'static HandleRegistry,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CompletionSlot {
    /// Release the slot's token and deliver the outcome.
    ///
    /// # Errors
    ///
    /// `AlreadyCompleted` if the runtime fired this completion twice.
    pub(crate) fn complete(&self, error: Outcome) -> Result<(), CallbackError> {
        let tx = self
            .tx
            .lock()
            .take()
            .ok_or(CallbackError::AlreadyCompleted(self.handle))?;

        tracing::trace!(
            operation = self.operation,
            token = %self.handle,
            failed = error.is_some(),
            "Completion fired"
        );

        // Release before waking the caller so it never observes a stale token.
        if let Err(e) = self.registry.release(self.handle) {
            tracing::warn!(operation = self.operation, error = %e, "Failed to release completion token");
        }

        if tx.send(error).is_err() {
            tracing::warn!(operation = self.operation, token = %self.handle, "Completion receiver dropped");
        }
        Ok(())
    }
}

/// Converts completion-token operations into blocking calls.
pub(crate) struct CompletionBridge {
    registry: &'static HandleRegistry,
}

impl CompletionBridge {
    pub(crate) fn new(registry: &'static HandleRegistry) -> Self {
        Self { registry }
    }

    /// Run `call` with a fresh completion token and block until it fires.
    ///
    /// Parks the calling thread; inside an async runtime this occupies a
    /// worker for the duration of the call.
    pub(crate) fn invoke<F>(&self, operation: &'static str, call: F) -> VzResult<()>
    where
        F: FnOnce(Handle),
    {
        let (tx, rx) = oneshot::channel();
        let registry = self.registry;
        let handle = registry.register_with(|handle| {
            Arc::new(CompletionSlot {
                handle,
                operation,
                registry,
                tx: Mutex::new(Some(tx)),
            })
        });

        tracing::debug!(operation, token = %handle, "Waiting for completion");
        call(handle);

        match futures::executor::block_on(rx) {
            Ok(None) => Ok(()),
            Ok(Some(error)) => Err(VzError::foreign(operation, error)),
            Err(_) => Err(VzError::Internal(format!(
                "{} completion was dropped without delivery",
                operation
            ))),
        }
    }
}
