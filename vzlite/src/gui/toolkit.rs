use vzlite_shared::Handle;

use crate::config::GraphicApplicationOptions;

/// Everything the toolkit needs to build a machine's window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub width: f64,
    pub height: f64,
    pub title: String,
    pub enable_controller: bool,
    pub confirm_stop_on_close: bool,
}

impl WindowSpec {
    pub fn new(width: f64, height: f64, options: &GraphicApplicationOptions) -> Self {
        Self {
            width,
            height,
            title: options.title.clone(),
            enable_controller: options.enable_controller,
            confirm_stop_on_close: options.confirm_stop_on_close,
        }
    }
}

/// The UI toolkit that owns the real windows.
///
/// Every method is called on the main thread. Windows are identified by the
/// owning machine's persistent window token. When the user closes a window
/// (after any confirmation the toolkit shows), the integration reports it
/// through [`GraphicsApplication::user_closed_window`].
///
/// [`GraphicsApplication::user_closed_window`]: super::GraphicsApplication::user_closed_window
pub trait WindowToolkit: Send + Sync {
    fn create_window(&self, id: Handle, spec: &WindowSpec);

    fn show_window(&self, id: Handle);

    /// Order the window front and activate the application.
    fn bring_to_front(&self, id: Handle);

    /// Liveness of the presentation surface.
    fn is_window_visible(&self, id: Handle) -> bool;

    fn close_window(&self, id: Handle);
}
