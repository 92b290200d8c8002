//! Configuration consumed by the bridge.
//!
//! - `machine`: immutable machine configuration snapshot (devices, resources)
//! - `options`: per-call options for start and graphics operations

mod machine;
mod options;

pub use machine::{NetworkAttachment, NetworkDeviceConfiguration, VirtualMachineConfiguration};
pub use options::{GraphicApplicationOptions, StartOptions};
