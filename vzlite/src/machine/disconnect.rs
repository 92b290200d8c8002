//! Network disconnect pipeline.
//!
//! ## Architecture
//!
//! ```text
//! runtime thread            inbox (stage 1)         worker (stage 2)
//! attachment_disconnected -> unbounded mpsc ------> config lookup -> NotifyChannel
//! close_disconnected_channel  (sender taken)        (read lock)      (closed on exit)
//! ```
//!
//! One inbox per machine is registered under the persistent disconnect token
//! and shared by every network device; events carry the device index. The
//! worker thread is started by the first subscription and runs until the
//! inbox is closed, then closes the public channel.

use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use vzlite_shared::{ForeignError, Handle, VzError, VzResult};

use crate::config::{NetworkDeviceConfiguration, VirtualMachineConfiguration};
use crate::handle::HandleRegistry;
use crate::notify::{NotifyChannel, NotifyReceiver};
use crate::vmm::MachineId;

/// Configuration snapshot shared with the worker.
pub(crate) type ConfigSnapshot = Arc<RwLock<Arc<VirtualMachineConfiguration>>>;

/// A network device lost its host attachment.
///
/// `device` is `None` when the runtime's device index does not match the
/// configuration the machine was created with.
#[derive(Debug, Clone)]
pub struct DisconnectedError {
    cause: ForeignError,
    device_index: i32,
    device: Option<NetworkDeviceConfiguration>,
}

impl DisconnectedError {
    pub fn cause(&self) -> &ForeignError {
        &self.cause
    }

    pub fn device_index(&self) -> i32 {
        self.device_index
    }

    pub fn device(&self) -> Option<&NetworkDeviceConfiguration> {
        self.device.as_ref()
    }
}

impl fmt::Display for DisconnectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}: {}", device.attachment, self.cause),
            None => write!(f, "{}", self.cause),
        }
    }
}

impl std::error::Error for DisconnectedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Raw event from the runtime, consumed once by the worker.
#[derive(Debug)]
pub(crate) struct DisconnectEvent {
    pub(crate) index: i32,
    pub(crate) cause: ForeignError,
}

/// Stage-1 queue, registered under the disconnect token.
pub(crate) struct DisconnectInbox {
    tx: Mutex<Option<UnboundedSender<DisconnectEvent>>>,
}

impl DisconnectInbox {
    /// Queue an event. Returns false once the inbox is closed.
    pub(crate) fn push(&self, event: DisconnectEvent) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Close the inbox. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }
}

pub(crate) struct DisconnectPipeline {
    machine_id: MachineId,
    token: Handle,
    inbox: Arc<DisconnectInbox>,
    /// Single-start latch: the worker takes the receiver.
    inbound: Mutex<Option<UnboundedReceiver<DisconnectEvent>>>,
    outbound: Arc<NotifyChannel<DisconnectedError>>,
}

impl DisconnectPipeline {
    pub(crate) fn new(registry: &HandleRegistry, machine_id: MachineId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(DisconnectInbox {
            tx: Mutex::new(Some(tx)),
        });
        let token = registry.register_arc(Arc::clone(&inbox));

        Self {
            machine_id,
            token,
            inbox,
            inbound: Mutex::new(Some(rx)),
            outbound: Arc::new(NotifyChannel::new()),
        }
    }

    pub(crate) fn token(&self) -> Handle {
        self.token
    }

    /// Subscribe to enriched disconnect events, starting the worker on first use.
    ///
    /// The subscription is taken before the worker starts, so the first
    /// subscriber also sees events queued before it subscribed.
    pub(crate) fn subscribe(&self, config: &ConfigSnapshot) -> VzResult<NotifyReceiver<DisconnectedError>> {
        let receiver = self.outbound.subscribe();

        let Some(inbound) = self.inbound.lock().take() else {
            return Ok(receiver);
        };

        let machine_id = self.machine_id;
        let config = Arc::clone(config);
        let outbound = Arc::clone(&self.outbound);
        thread::Builder::new()
            .name(format!("vz-disconnect-{}", machine_id))
            .spawn(move || run_worker(machine_id, inbound, config, outbound))
            .map_err(|e| {
                VzError::Internal(format!("failed to start disconnect worker: {}", e))
            })?;

        tracing::debug!(machine_id = %self.machine_id, "Disconnect worker started");
        Ok(receiver)
    }

    /// Close stage 1 and release the disconnect token.
    ///
    /// The runtime normally closes the inbox itself while being released;
    /// closing here as well covers runtimes that never fire the close callback.
    pub(crate) fn shutdown(&self, registry: &HandleRegistry) {
        if self.inbox.close() {
            tracing::debug!(machine_id = %self.machine_id, "Closed disconnect inbox at teardown");
        }
        if let Err(e) = registry.release(self.token) {
            tracing::warn!(machine_id = %self.machine_id, error = %e, "Failed to release disconnect token");
        }
        // A worker that never started leaves the public channel open.
        if self.inbound.lock().take().is_some() {
            self.outbound.close();
        }
    }
}

fn run_worker(
    machine_id: MachineId,
    mut inbound: UnboundedReceiver<DisconnectEvent>,
    config: ConfigSnapshot,
    outbound: Arc<NotifyChannel<DisconnectedError>>,
) {
    while let Some(event) = inbound.blocking_recv() {
        let device = {
            let snapshot = config.read();
            snapshot.network_device(event.index).cloned()
        };
        if device.is_none() {
            tracing::warn!(
                machine_id = %machine_id,
                index = event.index,
                "Disconnect reported for unknown network device"
            );
        }

        let error = DisconnectedError {
            cause: event.cause,
            device_index: event.index,
            device,
        };
        tracing::info!(machine_id = %machine_id, index = event.index, error = %error, "Network attachment disconnected");
        outbound.publish(error);
    }

    outbound.close();
    tracing::debug!(machine_id = %machine_id, "Disconnect worker exited");
}
