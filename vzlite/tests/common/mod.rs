//! Scripted runtime and toolkit shared by the integration tests.
//!
//! The mock runtime fires its callbacks from spawned threads, the way the
//! real runtime does, and records every call so tests can assert on them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vzlite::callback;
use vzlite::{
    ExecutionState, ForeignError, Handle, MachineCallbacks, MachineId, NativeMachine,
    PlatformVersion, StartOptions, VirtualMachineConfiguration, VirtualizationEngine, VzError,
    VzResult, WindowSpec, WindowToolkit,
};

/// Observable side of one mock machine.
#[derive(Default)]
pub struct MockShared {
    pub callbacks: Mutex<Option<MachineCallbacks>>,
    pub state: Mutex<ExecutionState>,
    pub release_count: AtomicUsize,
    /// Number of `can_*` queries the machine answered.
    pub queries: AtomicUsize,
    pub foreign_calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, ForeignError>>,
}

impl MockShared {
    /// Make the next `operation` complete with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ForeignError) {
        self.failures.lock().insert(operation, error);
    }

    pub fn callbacks(&self) -> MachineCallbacks {
        self.callbacks.lock().expect("machine was created")
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.foreign_calls.lock().clone()
    }

    /// Fire a state change as the runtime would.
    ///
    /// After teardown the token is gone and the callback is rejected; the
    /// real runtime ignores that too.
    pub fn raise(&self, state: ExecutionState) {
        *self.state.lock() = state;
        let _ = callback::state_changed(state.code(), self.callbacks().state);
    }

    /// Fire a network disconnect as the runtime would.
    pub fn disconnect(&self, index: i32, error: Option<ForeignError>) {
        callback::attachment_disconnected(index, error, self.callbacks().disconnect).unwrap();
    }
}

pub struct MockEngine {
    pub version: PlatformVersion,
    pub fail_create: bool,
    pub create_count: AtomicUsize,
    pub machines: Mutex<Vec<Arc<MockShared>>>,
    pub last_callbacks: Mutex<Option<MachineCallbacks>>,
}

impl MockEngine {
    pub fn new(major: u32) -> Self {
        Self {
            version: PlatformVersion::new(major, 0),
            fail_create: false,
            create_count: AtomicUsize::new(0),
            machines: Mutex::new(Vec::new()),
            last_callbacks: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::new(14)
        }
    }

    pub fn machine(&self, index: usize) -> Arc<MockShared> {
        Arc::clone(&self.machines.lock()[index])
    }
}

impl VirtualizationEngine for MockEngine {
    fn platform_version(&self) -> PlatformVersion {
        self.version
    }

    fn create_machine(
        &self,
        _id: MachineId,
        _config: &VirtualMachineConfiguration,
        callbacks: MachineCallbacks,
    ) -> VzResult<Box<dyn NativeMachine>> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        *self.last_callbacks.lock() = Some(callbacks);
        if self.fail_create {
            return Err(VzError::foreign(
                "create",
                ForeignError::new("VZErrorDomain", 2, "invalid configuration"),
            ));
        }

        let shared = Arc::new(MockShared::default());
        *shared.callbacks.lock() = Some(callbacks);
        self.machines.lock().push(Arc::clone(&shared));
        Ok(Box::new(MockMachine { shared }))
    }
}

struct MockMachine {
    shared: Arc<MockShared>,
}

impl MockMachine {
    /// Walk through `states` and then fire the completion, off-thread.
    fn run(&self, operation: &'static str, states: &'static [ExecutionState], token: Handle) {
        self.shared.foreign_calls.lock().push(operation);
        let shared = Arc::clone(&self.shared);
        let failure = shared.failures.lock().remove(operation);

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            match failure {
                Some(error) => {
                    shared.raise(ExecutionState::Error);
                    callback::completion(token, Some(error)).unwrap();
                }
                None => {
                    for state in states {
                        shared.raise(*state);
                    }
                    callback::completion(token, None).unwrap();
                }
            }
        });
    }

    fn current(&self) -> ExecutionState {
        *self.shared.state.lock()
    }

    fn query(&self) -> ExecutionState {
        self.shared.queries.fetch_add(1, Ordering::SeqCst);
        self.current()
    }
}

impl NativeMachine for MockMachine {
    fn start(&self, _options: &StartOptions, completion: Handle) {
        self.run(
            "start",
            &[ExecutionState::Starting, ExecutionState::Running],
            completion,
        );
    }

    fn pause(&self, completion: Handle) {
        self.run(
            "pause",
            &[ExecutionState::Pausing, ExecutionState::Paused],
            completion,
        );
    }

    fn resume(&self, completion: Handle) {
        self.run(
            "resume",
            &[ExecutionState::Resuming, ExecutionState::Running],
            completion,
        );
    }

    fn stop(&self, completion: Handle) {
        self.run("stop", &[ExecutionState::Stopped], completion);
    }

    fn request_stop(&self) -> Result<bool, ForeignError> {
        self.shared.foreign_calls.lock().push("request_stop");
        match self.shared.failures.lock().remove("request_stop") {
            Some(error) => Err(error),
            None => Ok(self.current() == ExecutionState::Running),
        }
    }

    fn can_start(&self) -> bool {
        matches!(self.query(), ExecutionState::Stopped | ExecutionState::Error)
    }

    fn can_pause(&self) -> bool {
        self.query() == ExecutionState::Running
    }

    fn can_resume(&self) -> bool {
        self.query() == ExecutionState::Paused
    }

    fn can_request_stop(&self) -> bool {
        self.query() == ExecutionState::Running
    }

    fn can_stop(&self) -> bool {
        matches!(
            self.query(),
            ExecutionState::Running | ExecutionState::Paused
        )
    }

    fn release(&self) {
        self.shared.release_count.fetch_add(1, Ordering::SeqCst);
        // The runtime closes the disconnect channel while releasing.
        if let Some(callbacks) = *self.shared.callbacks.lock() {
            let _ = callback::close_disconnected_channel(callbacks.disconnect);
        }
    }
}

/// Toolkit that tracks window visibility in memory.
#[derive(Default)]
pub struct MockToolkit {
    pub visible: Mutex<HashMap<Handle, bool>>,
    pub created: Mutex<Vec<Handle>>,
    pub specs: Mutex<Vec<WindowSpec>>,
    pub fronted: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MockToolkit {
    pub fn created(&self) -> Vec<Handle> {
        self.created.lock().clone()
    }

    pub fn is_visible(&self, id: Handle) -> bool {
        self.visible.lock().get(&id).copied().unwrap_or(false)
    }

    /// Drop the window without telling anyone, as if a close notification
    /// was missed.
    pub fn lose_window(&self, id: Handle) {
        self.visible.lock().insert(id, false);
    }
}

impl WindowToolkit for MockToolkit {
    fn create_window(&self, id: Handle, spec: &WindowSpec) {
        self.created.lock().push(id);
        self.specs.lock().push(spec.clone());
        self.visible.lock().insert(id, true);
    }

    fn show_window(&self, id: Handle) {
        self.visible.lock().insert(id, true);
    }

    fn bring_to_front(&self, _id: Handle) {
        self.fronted.fetch_add(1, Ordering::SeqCst);
    }

    fn is_window_visible(&self, id: Handle) -> bool {
        self.visible.lock().get(&id).copied().unwrap_or(false)
    }

    fn close_window(&self, id: Handle) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.visible.lock().insert(id, false);
    }
}

pub fn small_config() -> VirtualMachineConfiguration {
    VirtualMachineConfiguration::new(2, 1 << 30)
}

/// Poll `condition` until it holds or five seconds pass.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}
