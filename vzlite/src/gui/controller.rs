//! Per-machine window controller.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use futures::future::{self, Either};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use vzlite_shared::Handle;

use super::app::AppInner;
use crate::machine::ExecutionState;
use crate::notify::NotifyReceiver;

/// One open window, keyed by its machine's window token.
///
/// The `open` flag is shared with the state watcher; once cleared the
/// watcher ignores further states, so a watcher from a previous window never
/// closes a newer one. Closing also wakes the watcher so it exits and drops
/// its state subscription right away.
pub(crate) struct WindowController {
    id: Handle,
    open: Arc<AtomicBool>,
    closed: Mutex<Option<oneshot::Sender<()>>>,
}

impl WindowController {
    pub(crate) fn new(id: Handle) -> Self {
        Self {
            id,
            open: Arc::new(AtomicBool::new(true)),
            closed: Mutex::new(None),
        }
    }

    pub(crate) fn is_same_window(&self, open: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.open, open)
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
        // Dropping the sender wakes the watcher.
        self.closed.lock().take();
    }

    /// Close the window once the machine reaches `Stopped` or `Error`.
    ///
    /// The watcher exits on a terminal state, on [`mark_closed`], or when the
    /// state stream ends.
    ///
    /// [`mark_closed`]: WindowController::mark_closed
    pub(crate) fn watch(&self, app: Weak<AppInner>, mut states: NotifyReceiver<ExecutionState>) {
        let id = self.id;
        let open = Arc::clone(&self.open);
        let (closed_tx, mut closed_rx) = oneshot::channel::<()>();
        *self.closed.lock() = Some(closed_tx);

        let spawned = thread::Builder::new()
            .name(format!("vz-window-{}", id.as_raw()))
            .spawn(move || {
                futures::executor::block_on(async move {
                    loop {
                        let next = states.recv();
                        futures::pin_mut!(next);
                        let state = match future::select(next, &mut closed_rx).await {
                            Either::Left((Some(state), _)) => state,
                            Either::Left((None, _)) | Either::Right(_) => return,
                        };
                        if !open.load(Ordering::Acquire) {
                            return;
                        }
                        if state.is_terminal() {
                            tracing::debug!(token = %id, %state, "Machine stopped; closing window");
                            if let Some(app) = app.upgrade() {
                                app.close_for_stop(id, open);
                            }
                            return;
                        }
                    }
                });
                tracing::trace!(token = %id, "Window state watcher exited");
            });

        if let Err(e) = spawned {
            tracing::warn!(token = %id, error = %e, "Failed to start window state watcher");
        }
    }
}
