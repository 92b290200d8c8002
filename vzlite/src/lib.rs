//! vzlite - channel-oriented control of a callback-driven virtualization runtime.
//!
//! The runtime reports everything through callbacks fired on its own threads:
//! one-shot completions for start/pause/resume/stop, repeated state changes,
//! network disconnects and window closes. vzlite turns those into blocking
//! calls and broadcast streams, and addresses consumer state across the
//! boundary with opaque integer tokens instead of pointers.
//!
//! ```text
//! VirtualizationEngine ──create──> VirtualMachine ──> NativeMachine
//!        runtime threads ──callback::*──> HandleRegistry ──> machine state
//! ```

pub mod callback;
pub mod config;
pub mod gui;
pub mod handle;
pub mod logging;
pub mod machine;
pub mod notify;
pub mod platform;
pub mod vmm;

pub use config::{
    GraphicApplicationOptions, NetworkAttachment, NetworkDeviceConfiguration, StartOptions,
    VirtualMachineConfiguration,
};
pub use gui::{GraphicsApplication, MainQueue, MainThreadDispatcher, WindowSpec, WindowToolkit};
pub use handle::HandleRegistry;
pub use logging::{LoggingOptions, init_logging};
pub use machine::{DisconnectedError, ExecutionState, VirtualMachine};
pub use notify::{NotifyChannel, NotifyReceiver};
pub use platform::PlatformVersion;
pub use vmm::{MachineCallbacks, MachineId, NativeMachine, VirtualizationEngine};
pub use vzlite_shared::{ForeignError, Handle, HandleError, VzError, VzResult};
