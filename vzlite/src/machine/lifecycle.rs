//! Machine creation and teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Once, RwLock};
use vzlite_shared::{Handle, VzError, VzResult};

use super::MachineInner;
use super::completion::CompletionBridge;
use super::disconnect::DisconnectPipeline;
use super::state::MachineState;
use super::window::WindowTracker;
use crate::config::VirtualMachineConfiguration;
use crate::handle::HandleRegistry;
use crate::platform::min;
use crate::vmm::{MachineCallbacks, MachineId, VirtualizationEngine};

/// Releases registered tokens unless disarmed.
///
/// Creation registers the persistent tokens before the runtime call that
/// needs them; if that call fails they must not leak.
struct TokenGuard<'a> {
    registry: &'a HandleRegistry,
    tokens: Vec<Handle>,
    armed: bool,
}

impl<'a> TokenGuard<'a> {
    fn new(registry: &'a HandleRegistry) -> Self {
        Self {
            registry,
            tokens: Vec::new(),
            armed: true,
        }
    }

    fn track(&mut self, token: Handle) -> Handle {
        self.tokens.push(token);
        token
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for token in self.tokens.drain(..) {
            if let Err(e) = self.registry.release(token) {
                tracing::warn!(token = %token, error = %e, "Failed to release token after failed creation");
            }
        }
    }
}

pub(super) fn create(
    engine: &dyn VirtualizationEngine,
    config: VirtualMachineConfiguration,
) -> VzResult<Arc<MachineInner>> {
    let platform = engine.platform_version();
    platform.require(min::MACHINE)?;
    config.validate()?;

    let registry = HandleRegistry::global();
    let id = MachineId::new();
    let mut guard = TokenGuard::new(registry);

    let machine_state = Arc::new(MachineState::new());
    let state_token = guard.track(registry.register_arc(Arc::clone(&machine_state)));
    let disconnect = DisconnectPipeline::new(registry, id);
    guard.track(disconnect.token());

    let callbacks = MachineCallbacks {
        state: state_token,
        disconnect: disconnect.token(),
    };
    let native = engine.create_machine(id, &config, callbacks)?;
    guard.disarm();

    tracing::info!(
        machine_id = %id,
        platform = %platform,
        cpus = config.cpu_count,
        memory_bytes = config.memory_size_bytes,
        network_devices = config.network_devices.len(),
        "Created virtual machine"
    );

    Ok(Arc::new(MachineInner {
        id,
        platform,
        registry,
        native,
        completions: CompletionBridge::new(registry),
        machine_state,
        state_token,
        disconnect,
        config: Arc::new(RwLock::new(Arc::new(config))),
        window: WindowTracker::new(),
        teardown: Once::new(),
        finalized: AtomicBool::new(false),
    }))
}

impl MachineInner {
    pub(crate) fn is_live(&self) -> bool {
        !self.finalized.load(Ordering::Acquire)
    }

    /// Fail with `Precondition` once the machine has been finalized.
    pub(crate) fn ensure_live(&self) -> VzResult<()> {
        if !self.is_live() {
            return Err(VzError::Precondition(format!(
                "virtual machine {} has been finalized",
                self.id
            )));
        }
        Ok(())
    }

    /// Release every persistent resource. Runs at most once.
    ///
    /// An in-flight completion call is unaffected: its slot is owned by the
    /// completion callback, not by the machine.
    pub(crate) fn finalize(&self) {
        self.teardown.call_once(|| {
            self.finalized.store(true, Ordering::Release);
            tracing::debug!(machine_id = %self.id, "Finalizing virtual machine");

            if let Some((token, app)) = self.window.detach() {
                if let Some(app) = app {
                    app.forget_window(token);
                }
                if let Err(e) = self.registry.release(token) {
                    tracing::warn!(machine_id = %self.id, error = %e, "Failed to release window token");
                }
            }

            self.native.release();
            self.disconnect.shutdown(self.registry);

            if let Err(e) = self.registry.release(self.state_token) {
                tracing::warn!(machine_id = %self.id, error = %e, "Failed to release state token");
            }
            self.machine_state.close();

            tracing::info!(machine_id = %self.id, "Virtual machine finalized");
        });
    }
}

impl Drop for MachineInner {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_guard_releases_unless_disarmed() {
        let registry = HandleRegistry::new();
        let a = registry.register(1u8);
        let b = registry.register(2u8);

        {
            let mut guard = TokenGuard::new(&registry);
            guard.track(a);
        }
        assert!(!registry.contains(a));

        {
            let mut guard = TokenGuard::new(&registry);
            guard.track(b);
            guard.disarm();
        }
        assert!(registry.contains(b));
    }
}
