//! GraphicsApplication - the per-process window context.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;
use vzlite_shared::{Handle, VzResult};

use super::controller::WindowController;
use super::dispatch::{MainThreadDispatcher, dispatch_to_main, run_on_main};
use super::toolkit::{WindowSpec, WindowToolkit};
use crate::callback;
use crate::handle::HandleRegistry;
use crate::machine::{ExecutionState, WindowBinding};
use crate::notify::NotifyReceiver;

/// Holds the toolkit, the main-thread dispatcher and every open window.
///
/// Created once by the host and passed to
/// [`VirtualMachine::start_graphic_application`]. Cloning is cheap and
/// every clone shares the same windows.
///
/// Windows are keyed by their machine's window token. The application never
/// holds a machine; it reaches one only by resolving that token.
///
/// [`VirtualMachine::start_graphic_application`]: crate::VirtualMachine::start_graphic_application
#[derive(Clone)]
pub struct GraphicsApplication {
    inner: Arc<AppInner>,
}

pub(crate) struct AppInner {
    toolkit: Arc<dyn WindowToolkit>,
    dispatcher: Arc<dyn MainThreadDispatcher>,
    controllers: Mutex<HashMap<Handle, WindowController>>,
}

impl GraphicsApplication {
    pub fn new(toolkit: Arc<dyn WindowToolkit>, dispatcher: Arc<dyn MainThreadDispatcher>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                toolkit,
                dispatcher,
                controllers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of windows currently open.
    pub fn window_count(&self) -> usize {
        self.inner.controllers.lock().len()
    }

    /// Report that the user closed window `id`.
    ///
    /// Called by the toolkit integration, after any confirmation it shows.
    /// Stops the machine in the background when it can be stopped and fires
    /// the window-closed notification. Unknown ids are ignored.
    pub fn user_closed_window(&self, id: Handle) {
        let Some(controller) = self.inner.controllers.lock().remove(&id) else {
            tracing::debug!(token = %id, "Close reported for unknown window");
            return;
        };
        controller.mark_closed();
        tracing::info!(token = %id, "Window closed by user");

        match HandleRegistry::global().resolve::<WindowBinding>(id) {
            Ok(binding) => binding.stop_machine_in_background(),
            Err(e) => tracing::warn!(token = %id, error = %e, "Window has no machine binding"),
        }

        if let Err(e) = callback::window_closed(id) {
            tracing::warn!(token = %id, error = %e, "Window-closed notification failed");
        }
    }

    /// Create the window for `id`, or show it again if it is already open.
    ///
    /// Returns once the work is queued on the main thread.
    pub(crate) fn present_window(
        &self,
        id: Handle,
        spec: WindowSpec,
        states: NotifyReceiver<ExecutionState>,
    ) -> VzResult<()> {
        let inner = Arc::clone(&self.inner);
        dispatch_to_main(&*self.inner.dispatcher, move || inner.present(id, spec, states))
    }

    pub(crate) fn bring_to_front(&self, id: Handle) -> VzResult<()> {
        let toolkit = Arc::clone(&self.inner.toolkit);
        dispatch_to_main(&*self.inner.dispatcher, move || toolkit.bring_to_front(id))
    }

    /// Ask the toolkit whether the window is still on screen. Blocks on the
    /// main thread.
    pub(crate) fn is_window_visible(&self, id: Handle) -> VzResult<bool> {
        let toolkit = Arc::clone(&self.inner.toolkit);
        run_on_main(&*self.inner.dispatcher, move || toolkit.is_window_visible(id))
    }

    /// Close window `id` without notifying its machine. Used at teardown.
    pub(crate) fn forget_window(&self, id: Handle) {
        let inner = Arc::clone(&self.inner);
        let queued = dispatch_to_main(&*self.inner.dispatcher, move || {
            let removed = inner.controllers.lock().remove(&id);
            if let Some(controller) = removed {
                controller.mark_closed();
                inner.toolkit.close_window(id);
            }
        });
        if let Err(e) = queued {
            tracing::warn!(token = %id, error = %e, "Failed to close window at teardown");
        }
    }
}

impl AppInner {
    fn present(self: &Arc<Self>, id: Handle, spec: WindowSpec, states: NotifyReceiver<ExecutionState>) {
        if self.controllers.lock().contains_key(&id) {
            tracing::debug!(token = %id, "Window already open; showing");
            self.toolkit.show_window(id);
            self.toolkit.bring_to_front(id);
            return;
        }

        let controller = WindowController::new(id);
        controller.watch(Arc::downgrade(self), states);
        self.controllers.lock().insert(id, controller);

        tracing::info!(token = %id, width = spec.width, height = spec.height, "Creating window");
        self.toolkit.create_window(id, &spec);
        self.toolkit.show_window(id);
        self.toolkit.bring_to_front(id);
    }

    /// Close the window because its machine stopped.
    ///
    /// `open` identifies the window the watcher was started for; a newer
    /// window under the same id is left alone.
    pub(crate) fn close_for_stop(self: Arc<Self>, id: Handle, open: Arc<AtomicBool>) {
        let inner = Arc::clone(&self);
        let queued = dispatch_to_main(&*self.dispatcher, move || {
            let removed = {
                let mut controllers = inner.controllers.lock();
                match controllers.get(&id) {
                    Some(controller) if controller.is_same_window(&open) => controllers.remove(&id),
                    _ => None,
                }
            };
            let Some(controller) = removed else {
                return;
            };
            controller.mark_closed();
            inner.toolkit.close_window(id);

            if let Err(e) = callback::window_closed(id) {
                tracing::warn!(token = %id, error = %e, "Window-closed notification failed");
            }
        });
        if let Err(e) = queued {
            tracing::warn!(token = %id, error = %e, "Failed to close window after stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphicApplicationOptions;
    use crate::gui::MainQueue;
    use crate::notify::NotifyChannel;

    #[derive(Default)]
    struct RecordingToolkit {
        calls: Mutex<Vec<&'static str>>,
    }

    impl WindowToolkit for RecordingToolkit {
        fn create_window(&self, _id: Handle, _spec: &WindowSpec) {
            self.calls.lock().push("create");
        }
        fn show_window(&self, _id: Handle) {
            self.calls.lock().push("show");
        }
        fn bring_to_front(&self, _id: Handle) {
            self.calls.lock().push("front");
        }
        fn is_window_visible(&self, _id: Handle) -> bool {
            true
        }
        fn close_window(&self, _id: Handle) {
            self.calls.lock().push("close");
        }
    }

    fn spec() -> WindowSpec {
        WindowSpec::new(800.0, 600.0, &GraphicApplicationOptions::default())
    }

    #[test]
    fn test_present_twice_creates_once() {
        let toolkit = Arc::new(RecordingToolkit::default());
        let queue = MainQueue::spawn("vz-test-app").unwrap();
        let app = GraphicsApplication::new(toolkit.clone(), Arc::new(queue.clone()));
        let states = NotifyChannel::new();
        let id = Handle::from_raw(4242);

        app.present_window(id, spec(), states.subscribe()).unwrap();
        app.present_window(id, spec(), states.subscribe()).unwrap();
        assert!(app.is_window_visible(id).unwrap());

        assert_eq!(app.window_count(), 1);
        assert_eq!(
            *toolkit.calls.lock(),
            vec!["create", "show", "front", "show", "front"]
        );

        app.forget_window(id);
        run_on_main(&queue, || ()).unwrap();
        assert_eq!(app.window_count(), 0);
        assert_eq!(toolkit.calls.lock().last(), Some(&"close"));
        queue.quit();
    }

    #[test]
    fn test_stopped_state_closes_window() {
        let toolkit = Arc::new(RecordingToolkit::default());
        let queue = MainQueue::spawn("vz-test-stop").unwrap();
        let app = GraphicsApplication::new(toolkit.clone(), Arc::new(queue.clone()));
        let states = NotifyChannel::new();
        let id = Handle::from_raw(4343);

        app.present_window(id, spec(), states.subscribe()).unwrap();
        run_on_main(&queue, || ()).unwrap();

        states.publish(ExecutionState::Running);
        states.publish(ExecutionState::Stopped);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while app.window_count() != 0 {
            assert!(std::time::Instant::now() < deadline, "window was not closed");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        run_on_main(&queue, || ()).unwrap();
        assert_eq!(toolkit.calls.lock().last(), Some(&"close"));
        queue.quit();
    }

    #[test]
    fn test_user_close_releases_state_watcher() {
        let toolkit = Arc::new(RecordingToolkit::default());
        let queue = MainQueue::spawn("vz-test-cycle").unwrap();
        let app = GraphicsApplication::new(toolkit.clone(), Arc::new(queue.clone()));
        let states = NotifyChannel::new();
        let id = Handle::from_raw(4444);

        for _ in 0..10 {
            app.present_window(id, spec(), states.subscribe()).unwrap();
            run_on_main(&queue, || ()).unwrap();
            assert_eq!(app.window_count(), 1);
            app.user_closed_window(id);
        }
        assert_eq!(app.window_count(), 0);

        // Publishing prunes subscribers whose watcher has exited
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while states.publish(ExecutionState::Running) != 0 {
            assert!(std::time::Instant::now() < deadline, "state watchers still subscribed");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(states.subscriber_count(), 0);
        queue.quit();
    }
}
