mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{MockEngine, MockToolkit, small_config, wait_until};
use vzlite::gui::run_on_main;
use vzlite::{
    ExecutionState, GraphicApplicationOptions, GraphicsApplication, MainQueue, StartOptions,
    VirtualMachine, VzError,
};

struct Harness {
    engine: MockEngine,
    toolkit: Arc<MockToolkit>,
    queue: MainQueue,
    app: GraphicsApplication,
}

impl Harness {
    fn new() -> Self {
        let toolkit = Arc::new(MockToolkit::default());
        let queue = MainQueue::spawn("vz-test-main").unwrap();
        let app = GraphicsApplication::new(toolkit.clone(), Arc::new(queue.clone()));
        Self {
            engine: MockEngine::new(14),
            toolkit,
            queue,
            app,
        }
    }

    fn machine(&self) -> VirtualMachine {
        VirtualMachine::new(&self.engine, small_config()).unwrap()
    }

    /// Wait for everything already queued on the main thread.
    fn flush(&self) {
        run_on_main(&self.queue, || ()).unwrap();
    }

    /// Simulate the user closing the window, on the main thread.
    fn user_close(&self, vm_window: vzlite::Handle) {
        let app = self.app.clone();
        let toolkit = Arc::clone(&self.toolkit);
        run_on_main(&self.queue, move || {
            toolkit.lose_window(vm_window);
            app.user_closed_window(vm_window);
        })
        .unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.queue.quit();
    }
}

fn options() -> GraphicApplicationOptions {
    GraphicApplicationOptions::default().with_window_title("test")
}

#[test]
fn test_non_positive_dimensions_are_rejected() {
    let h = Harness::new();
    let vm = h.machine();

    for (width, height) in [(0.0, 600.0), (800.0, 0.0), (-5.0, 600.0)] {
        assert!(matches!(
            vm.start_graphic_application(&h.app, width, height, &options()),
            Err(VzError::Validation(_))
        ));
    }
    h.flush();
    assert!(h.toolkit.created().is_empty());
    assert_eq!(h.app.window_count(), 0);
    assert!(!vm.has_gui_window());
}

#[test]
fn test_window_operations_before_start_are_preconditions() {
    let h = Harness::new();
    let vm = h.machine();

    assert!(matches!(vm.bring_window_to_front(), Err(VzError::Precondition(_))));
    assert!(matches!(vm.show_window(), Err(VzError::Precondition(_))));
    assert!(!vm.has_gui_window());
}

#[test]
fn test_show_after_close_reuses_token() {
    let h = Harness::new();
    let vm = h.machine();

    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    assert!(vm.has_gui_window());
    let token = h.toolkit.created()[0];
    assert_eq!(h.toolkit.specs.lock()[0].title, "test");

    h.user_close(token);
    assert!(!vm.has_gui_window());
    assert!(matches!(vm.bring_window_to_front(), Err(VzError::Precondition(_))));

    vm.show_window().unwrap();
    assert!(vm.has_gui_window());
    assert_eq!(h.toolkit.created(), vec![token, token]);
    vm.bring_window_to_front().unwrap();
}

#[test]
fn test_show_while_open_is_idempotent() {
    let h = Harness::new();
    let vm = h.machine();

    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    vm.show_window().unwrap();
    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    h.flush();

    assert_eq!(h.toolkit.created().len(), 1);
    assert_eq!(h.app.window_count(), 1);
    assert!(vm.has_gui_window());
}

#[test]
fn test_missed_close_is_detected() {
    let h = Harness::new();
    let vm = h.machine();

    vm.start_graphic_application(&h.app, 1024.0, 768.0, &options())
        .unwrap();
    h.flush();
    let token = h.toolkit.created()[0];

    h.toolkit.lose_window(token);
    assert!(!vm.has_gui_window());
    match vm.bring_window_to_front() {
        Err(VzError::Precondition(message)) => assert!(message.contains("not available")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_machine_stop_closes_window() {
    let h = Harness::new();
    let vm = h.machine();
    vm.start(&StartOptions::default()).unwrap();

    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    h.flush();
    assert_eq!(h.app.window_count(), 1);

    vm.stop().unwrap();
    wait_until("window to close", || h.app.window_count() == 0);
    h.flush();

    assert_eq!(h.toolkit.closed.load(Ordering::SeqCst), 1);
    assert!(!vm.has_gui_window());

    // The token survives; the window can come back
    vm.show_window().unwrap();
    assert!(vm.has_gui_window());
}

#[test]
fn test_user_close_stops_running_machine() {
    let h = Harness::new();
    let vm = h.machine();
    vm.start(&StartOptions::default()).unwrap();
    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    h.flush();

    let token = h.toolkit.created()[0];
    h.user_close(token);

    wait_until("machine to stop", || vm.state() == ExecutionState::Stopped);
    assert!(!vm.has_gui_window());
    assert_eq!(h.app.window_count(), 0);
}

#[test]
fn test_graphics_need_platform_12() {
    let h = Harness::new();
    let engine = MockEngine::new(11);
    let vm = VirtualMachine::new(&engine, small_config()).unwrap();

    assert!(matches!(
        vm.start_graphic_application(&h.app, 800.0, 600.0, &options()),
        Err(VzError::UnsupportedOnPlatform { required: 12, .. })
    ));
    assert!(h.toolkit.created().is_empty());
}

#[test]
fn test_finalize_closes_window_and_releases_token() {
    let h = Harness::new();
    let vm = h.machine();
    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    h.flush();
    let token = h.toolkit.created()[0];

    vm.finalize();
    h.flush();

    assert_eq!(h.app.window_count(), 0);
    assert!(!h.toolkit.is_visible(token));
    assert!(!vzlite::HandleRegistry::global().contains(token));
    assert!(!vm.has_gui_window());
    assert!(matches!(vm.show_window(), Err(VzError::Precondition(_))));
}

#[tokio::test]
async fn test_window_queries_from_async_task() {
    let h = Harness::new();
    let vm = h.machine();

    vm.start_graphic_application(&h.app, 800.0, 600.0, &options())
        .unwrap();
    assert!(vm.has_gui_window());
    vm.bring_window_to_front().unwrap();
    h.flush();
    assert_eq!(h.toolkit.fronted.load(Ordering::SeqCst), 2);
}
