//! Window lifecycle of one machine.
//!
//! ```text
//! NoWindow --start_graphic_application/show_window--> WindowOpen
//! WindowOpen --window_closed (user close or machine stop)--> NoWindow (token kept)
//! ```
//!
//! The window token is allocated on the first `start_graphic_application`
//! and reused for every later window of the same machine. Close
//! notifications are not ordered against `show_window`/`bring_window_to_front`;
//! `has_gui_window` cross-checks the flag against the toolkit.

use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::RwLock;
use vzlite_shared::{Handle, VzError, VzResult};

use super::MachineInner;
use crate::config::GraphicApplicationOptions;
use crate::gui::{GraphicsApplication, WindowSpec};
use crate::handle::HandleRegistry;
use crate::platform::min;

#[derive(Default)]
pub(crate) struct WindowState {
    exists: bool,
    /// Set at teardown; no window can be opened afterwards.
    detached: bool,
    token: Option<Handle>,
    app: Option<GraphicsApplication>,
    spec: Option<WindowSpec>,
}

/// Registered under the window token. Reaches the machine without owning it.
pub(crate) struct WindowBinding {
    window: Arc<RwLock<WindowState>>,
    machine: Weak<MachineInner>,
}

impl WindowBinding {
    pub(crate) fn mark_closed(&self) {
        self.window.write().exists = false;
    }

    /// Stop the machine on a background thread after its window was closed.
    ///
    /// Failures are logged; the window is gone either way.
    pub(crate) fn stop_machine_in_background(&self) {
        let Some(machine) = self.machine.upgrade() else {
            return;
        };
        let machine_id = machine.id;

        let spawned = thread::Builder::new()
            .name(format!("vz-close-stop-{}", machine_id))
            .spawn(move || {
                if !machine.can_stop() {
                    tracing::debug!(machine_id = %machine.id, "Machine cannot be stopped; leaving it");
                    return;
                }
                if let Err(e) = machine.stop() {
                    tracing::warn!(machine_id = %machine.id, error = %e, "Failed to stop machine after window close");
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(machine_id = %machine_id, error = %e, "Failed to start stop thread");
        }
    }
}

pub(crate) struct WindowTracker {
    state: Arc<RwLock<WindowState>>,
}

impl WindowTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(WindowState::default())),
        }
    }

    /// Mark the window open, allocating the token on first use.
    ///
    /// Checked under the write lock, so a teardown that already detached the
    /// tracker never sees a token registered after it.
    fn open(
        &self,
        registry: &HandleRegistry,
        machine: Weak<MachineInner>,
        app: &GraphicsApplication,
        spec: WindowSpec,
    ) -> VzResult<Handle> {
        let mut state = self.state.write();
        if state.detached {
            return Err(detached_error());
        }
        let token = match state.token {
            Some(token) => token,
            None => {
                let token = registry.register(WindowBinding {
                    window: Arc::clone(&self.state),
                    machine,
                });
                state.token = Some(token);
                token
            }
        };
        state.exists = true;
        state.app = Some(app.clone());
        state.spec = Some(spec);
        Ok(token)
    }

    /// Mark the window open again and return what is needed to show it.
    fn reopen(&self) -> VzResult<(GraphicsApplication, Handle, WindowSpec)> {
        let mut state = self.state.write();
        if state.detached {
            return Err(detached_error());
        }
        let (Some(token), Some(app), Some(spec)) =
            (state.token, state.app.clone(), state.spec.clone())
        else {
            return Err(VzError::Precondition(
                "GUI was never initialized; call start_graphic_application first".into(),
            ));
        };
        state.exists = true;
        Ok((app, token, spec))
    }

    fn open_window(&self) -> Option<(GraphicsApplication, Handle)> {
        let state = self.state.read();
        if !state.exists {
            return None;
        }
        Some((state.app.clone()?, state.token?))
    }

    fn mark_closed(&self) {
        self.state.write().exists = false;
    }

    /// Detach everything at teardown. Returns the token and application, if any.
    pub(crate) fn detach(&self) -> Option<(Handle, Option<GraphicsApplication>)> {
        let mut state = self.state.write();
        state.detached = true;
        state.exists = false;
        state.spec = None;
        let app = state.app.take();
        state.token.take().map(|token| (token, app))
    }
}

fn detached_error() -> VzError {
    VzError::Precondition("virtual machine has been finalized".into())
}

fn validate_dimensions(width: f64, height: f64) -> VzResult<()> {
    // Written so NaN fails too.
    if !(width > 0.0) || !(height > 0.0) {
        return Err(VzError::Validation(format!(
            "window width and height must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

impl MachineInner {
    pub(crate) fn start_graphic_application(
        self: &Arc<Self>,
        app: &GraphicsApplication,
        width: f64,
        height: f64,
        options: &GraphicApplicationOptions,
    ) -> VzResult<()> {
        self.ensure_live()?;
        self.platform.require(min::STOP_AND_GRAPHICS)?;
        validate_dimensions(width, height)?;

        let spec = WindowSpec::new(width, height, options);
        let token = self
            .window
            .open(self.registry, Arc::downgrade(self), app, spec.clone())?;
        tracing::info!(machine_id = %self.id, token = %token, "Starting graphic application");

        app.present_window(token, spec, self.machine_state.subscribe())
            .inspect_err(|_| self.window.mark_closed())
    }

    pub(crate) fn show_window(&self) -> VzResult<()> {
        self.ensure_live()?;
        self.platform.require(min::STOP_AND_GRAPHICS)?;

        let (app, token, spec) = self.window.reopen()?;
        tracing::debug!(machine_id = %self.id, token = %token, "Showing window");
        app.present_window(token, spec, self.machine_state.subscribe())
            .inspect_err(|_| self.window.mark_closed())
    }

    pub(crate) fn bring_window_to_front(&self) -> VzResult<()> {
        self.ensure_live()?;
        self.platform.require(min::STOP_AND_GRAPHICS)?;

        let (app, token) = self.window.open_window().ok_or_else(|| {
            VzError::Precondition(
                "GUI window does not exist; call start_graphic_application first".into(),
            )
        })?;
        if !app.is_window_visible(token)? {
            return Err(VzError::Precondition("GUI window is not available".into()));
        }
        app.bring_to_front(token)
    }

    pub(crate) fn has_gui_window(&self) -> bool {
        let Some((app, token)) = self.window.open_window() else {
            return false;
        };
        app.is_window_visible(token).unwrap_or_else(|e| {
            tracing::warn!(machine_id = %self.id, error = %e, "Window liveness check failed");
            false
        })
    }
}
