//! VirtualMachine - the consumer-facing machine object.
//!
//! ## Architecture
//!
//! ```text
//! VirtualMachine (Clone)
//!   └── Arc<MachineInner>
//!         ├── NativeMachine         runtime object, released at teardown
//!         ├── CompletionBridge      start/pause/resume/stop as blocking calls
//!         ├── MachineState          state token -> current state + broadcast
//!         ├── DisconnectPipeline    disconnect token -> enriched error stream
//!         └── WindowTracker         window token -> window binding
//! ```
//!
//! Control operations block the calling thread until the runtime reports the
//! outcome. They may be called from an async task, but they hold its worker
//! thread while waiting; prefer `spawn_blocking` on a current-thread runtime.

mod completion;
mod disconnect;
mod lifecycle;
mod state;
mod window;

pub use disconnect::DisconnectedError;
pub use state::ExecutionState;

pub(crate) use completion::CompletionSlot;
pub(crate) use disconnect::{DisconnectEvent, DisconnectInbox};
pub(crate) use state::MachineState;
pub(crate) use window::WindowBinding;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::Once;
use vzlite_shared::{Handle, VzError, VzResult};

use crate::config::{GraphicApplicationOptions, StartOptions, VirtualMachineConfiguration};
use crate::gui::GraphicsApplication;
use crate::handle::HandleRegistry;
use crate::notify::NotifyReceiver;
use crate::platform::{PlatformVersion, min};
use crate::vmm::{MachineId, NativeMachine, VirtualizationEngine};

use completion::CompletionBridge;
use disconnect::{ConfigSnapshot, DisconnectPipeline};
use window::WindowTracker;

/// A virtual machine created through a [`VirtualizationEngine`].
///
/// Cloning shares the same machine. The machine is finalized by
/// [`VirtualMachine::finalize`] or when the last clone is dropped.
#[derive(Clone)]
pub struct VirtualMachine {
    inner: Arc<MachineInner>,
}

pub(crate) struct MachineInner {
    pub(crate) id: MachineId,
    platform: PlatformVersion,
    registry: &'static HandleRegistry,
    native: Box<dyn NativeMachine>,
    completions: CompletionBridge,
    machine_state: Arc<MachineState>,
    state_token: Handle,
    disconnect: DisconnectPipeline,
    config: ConfigSnapshot,
    window: WindowTracker,
    teardown: Once,
    finalized: AtomicBool,
}

// Machines are shared across consumer threads and runtime callback threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<VirtualMachine>();
};

impl VirtualMachine {
    /// Create a machine from a configuration.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOnPlatform` below platform 11
    /// - `Validation` if the configuration is invalid
    /// - whatever the runtime reports when creating the machine
    pub fn new(engine: &dyn VirtualizationEngine, config: VirtualMachineConfiguration) -> VzResult<Self> {
        Ok(Self {
            inner: lifecycle::create(engine, config)?,
        })
    }

    pub fn id(&self) -> MachineId {
        self.inner.id
    }

    pub fn platform_version(&self) -> PlatformVersion {
        self.inner.platform
    }

    pub fn configuration(&self) -> Arc<VirtualMachineConfiguration> {
        Arc::clone(&*self.inner.config.read())
    }

    /// Current execution state. Never blocks on the runtime.
    pub fn state(&self) -> ExecutionState {
        self.inner.machine_state.current()
    }

    /// Subscribe to state changes.
    ///
    /// Each call returns an independent stream of every state raised after
    /// the call, in the order the runtime raised them. The stream ends when
    /// the machine is finalized.
    pub fn state_changed_notify(&self) -> NotifyReceiver<ExecutionState> {
        self.inner.machine_state.subscribe()
    }

    /// Subscribe to network attachment disconnects.
    ///
    /// The first call starts the worker that matches runtime events to the
    /// configured devices. The stream ends when the machine is finalized.
    ///
    /// # Errors
    ///
    /// `UnsupportedOnPlatform` below platform 12; `Precondition` after
    /// finalize.
    pub fn network_device_attachment_was_disconnected(
        &self,
    ) -> VzResult<NotifyReceiver<DisconnectedError>> {
        self.inner.ensure_live()?;
        self.inner.platform.require(min::STOP_AND_GRAPHICS)?;
        self.inner.disconnect.subscribe(&self.inner.config)
    }

    /// The `can_*` queries are false once the machine has been finalized.
    pub fn can_start(&self) -> bool {
        self.inner.is_live() && self.inner.native.can_start()
    }

    pub fn can_pause(&self) -> bool {
        self.inner.is_live() && self.inner.native.can_pause()
    }

    pub fn can_resume(&self) -> bool {
        self.inner.is_live() && self.inner.native.can_resume()
    }

    pub fn can_request_stop(&self) -> bool {
        self.inner.is_live() && self.inner.native.can_request_stop()
    }

    /// Always false below platform 12, where forced stop does not exist.
    pub fn can_stop(&self) -> bool {
        self.inner.can_stop()
    }

    /// Start the machine and wait until the runtime reports the outcome.
    pub fn start(&self, options: &StartOptions) -> VzResult<()> {
        self.inner.start(options)
    }

    pub fn pause(&self) -> VzResult<()> {
        self.inner.ensure_live()?;
        self.inner
            .completions
            .invoke("pause", |token| self.inner.native.pause(token))
    }

    pub fn resume(&self) -> VzResult<()> {
        self.inner.ensure_live()?;
        self.inner
            .completions
            .invoke("resume", |token| self.inner.native.resume(token))
    }

    /// Forcefully stop the machine. Guest state is lost.
    pub fn stop(&self) -> VzResult<()> {
        self.inner.stop()
    }

    /// Ask the guest to shut down. Returns whether the request was delivered.
    pub fn request_stop(&self) -> VzResult<bool> {
        self.inner.ensure_live()?;
        self.inner
            .native
            .request_stop()
            .map_err(|e| VzError::foreign("request_stop", e))
    }

    /// Open a graphics window for this machine in `app`.
    ///
    /// Returns once the window creation is queued on the main thread. Calling
    /// again while the window is open shows it again.
    ///
    /// # Errors
    ///
    /// `Validation` for a non-positive width or height, before anything is
    /// dispatched.
    pub fn start_graphic_application(
        &self,
        app: &GraphicsApplication,
        width: f64,
        height: f64,
        options: &GraphicApplicationOptions,
    ) -> VzResult<()> {
        self.inner.start_graphic_application(app, width, height, options)
    }

    /// Show the window again after it was closed.
    ///
    /// # Errors
    ///
    /// `Precondition` if `start_graphic_application` was never called.
    pub fn show_window(&self) -> VzResult<()> {
        self.inner.show_window()
    }

    /// # Errors
    ///
    /// `Precondition` if no window is open or the toolkit no longer has it.
    pub fn bring_window_to_front(&self) -> VzResult<()> {
        self.inner.bring_window_to_front()
    }

    /// Whether a window is open, according to both the machine and the toolkit.
    pub fn has_gui_window(&self) -> bool {
        self.inner.has_gui_window()
    }

    /// Release the runtime machine and every token it was given.
    ///
    /// Idempotent and safe to call concurrently. Every later operation fails
    /// with `Precondition` and all streams end.
    pub fn finalize(&self) {
        self.inner.finalize();
    }
}

impl MachineInner {
    pub(crate) fn can_stop(&self) -> bool {
        self.is_live()
            && self.platform.is_at_least(min::STOP_AND_GRAPHICS)
            && self.native.can_stop()
    }

    fn start(&self, options: &StartOptions) -> VzResult<()> {
        self.ensure_live()?;
        if options.start_up_from_macos_recovery {
            self.platform.require(min::RECOVERY_START)?;
        }
        tracing::debug!(machine_id = %self.id, recovery = options.start_up_from_macos_recovery, "Starting machine");
        self.completions
            .invoke("start", |token| self.native.start(options, token))
    }

    pub(crate) fn stop(&self) -> VzResult<()> {
        self.ensure_live()?;
        self.platform.require(min::STOP_AND_GRAPHICS)?;
        self.completions
            .invoke("stop", |token| self.native.stop(token))
    }
}

impl fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}
