//! Suspicious-activity signals pushed by the environment.
//!
//! The two signals mirror what a browser can observe: the page becoming
//! hidden (tab switch) and the window losing focus (application switch).
//! Whatever hosts the session forwards them; the runtime never polls.

/// One suspicious-activity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// The exam page became hidden.
    TabSwitch,
    /// The window lost focus.
    AppSwitch,
}

impl ActivityKind {
    /// Warning text recorded and reported for this signal. These strings
    /// are part of the backend contract; proctors see them verbatim.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            ActivityKind::TabSwitch => "Tab switching detected!",
            ActivityKind::AppSwitch => "Application switching detected!",
        }
    }
}
