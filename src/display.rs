//! Display surface abstraction
//!
//! The core only pushes state outward; it never reads from the display.
//! The platform badge indicator and the on-screen label are separate sinks
//! because the badge must be cleared even when the label is left alone.

/// Output sink for everything the user can see.
pub trait DisplaySurface: Send + Sync {
    /// Sets the platform badge indicator. `0` clears it.
    fn set_badge(&self, value: u64);

    /// Shows or hides the on-screen counter label.
    fn set_visible(&self, visible: bool);

    /// Sets the on-screen counter label text.
    fn set_text(&self, text: &str);

    /// Sets the label of the control that toggles alerts.
    fn set_control_label(&self, label: &str);

    /// Reflects the counting toggle state.
    fn set_counting_switch(&self, on: bool);

    /// Presents a one-time explanatory message.
    fn present_message(&self, message: &str);
}

/// Formats a counter value for the on-screen label.
#[must_use]
pub fn counter_text(value: u64) -> String {
    format!("  {value}  ")
}

/// Explanatory messages surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    /// Alert/badge permission is off.
    AuthorizationDenied,
    /// The keepalive service cannot run, so counting stops once suspended.
    KeepaliveUnavailable,
}

impl UserMessage {
    /// Short machine-friendly name for metrics and events.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::AuthorizationDenied => "authorization_denied",
            Self::KeepaliveUnavailable => "keepalive_unavailable",
        }
    }

    /// Renders the message for the given application name.
    #[must_use]
    pub fn render(self, app_name: &str) -> String {
        match self {
            Self::AuthorizationDenied => format!(
                "Notifications for {app_name} have been turned OFF in Settings. \
                 You must turn them ON for {app_name} to function."
            ),
            Self::KeepaliveUnavailable => format!(
                "Background location must be ON and set to ALWAYS for {app_name} \
                 to keep running in the background."
            ),
        }
    }
}
