use serde::{Deserialize, Serialize};

/// Options for starting a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Boot from the guest's recovery partition (platform 13 and newer).
    #[serde(default)]
    pub start_up_from_macos_recovery: bool,
}

impl StartOptions {
    pub fn with_macos_recovery(mut self, enable: bool) -> Self {
        self.start_up_from_macos_recovery = enable;
        self
    }
}

/// Options for the graphics window opened by `start_graphic_application`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicApplicationOptions {
    /// Window title. Empty means the toolkit's default.
    #[serde(default)]
    pub title: String,
    /// Show pause/resume/stop controls in the window toolbar.
    #[serde(default)]
    pub enable_controller: bool,
    /// Ask for confirmation before a window close stops the machine.
    #[serde(default = "default_confirm_stop_on_close")]
    pub confirm_stop_on_close: bool,
}

fn default_confirm_stop_on_close() -> bool {
    true
}

impl Default for GraphicApplicationOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            enable_controller: false,
            confirm_stop_on_close: default_confirm_stop_on_close(),
        }
    }
}

impl GraphicApplicationOptions {
    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_controller(mut self, enable: bool) -> Self {
        self.enable_controller = enable;
        self
    }

    pub fn with_confirm_stop_on_close(mut self, enable: bool) -> Self {
        self.confirm_stop_on_close = enable;
        self
    }
}
