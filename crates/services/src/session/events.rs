/// Notifications the session runtime pushes to whatever renders it.
///
/// The channel is the runtime's only outward seam: the presentation layer
/// subscribes and reacts, it never reaches into the timers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One second of countdown elapsed.
    Tick { seconds_left: u32 },
    /// A suspicious-activity warning was recorded. The warning banner
    /// should show until `WarningDismissed` follows.
    WarningRaised { message: String, count: u32 },
    /// The transient warning banner timed out.
    WarningDismissed,
    /// The attempt was submitted and scored.
    Submitted { score: f64, forced: bool },
    /// The submission could not be confirmed; the attempt is still locally
    /// completed.
    SubmissionFailed { message: String },
}
