//! Graphics windows for running machines.
//!
//! ## Architecture
//!
//! - **MainThreadDispatcher**: the UI-affine thread; every toolkit call is
//!   routed through it
//! - **WindowToolkit**: the toolkit that owns the real windows
//! - **GraphicsApplication**: explicit per-process context holding one
//!   controller per open window, keyed by the machine's window token
//!
//! Ownership runs one way: a machine holds the application (through its
//! window state), the application holds only tokens. Close paths reach the
//! machine by resolving the token in the handle registry.

mod app;
mod controller;
mod dispatch;
mod toolkit;

pub use app::GraphicsApplication;
pub use dispatch::{
    MainLoop, MainQueue, MainTask, MainThreadDispatcher, dispatch_to_main, main_queue, run_on_main,
};
pub use toolkit::{WindowSpec, WindowToolkit};
