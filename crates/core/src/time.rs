use chrono::{DateTime, Utc};

/// Where session timestamps come from.
///
/// The runtime stamps warnings and attempt starts through this instead of
/// calling `Utc::now()` directly, so tests can pin every timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    /// Real wall-clock time.
    #[default]
    System,
    /// Always reports the same instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match *self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => at,
        }
    }
}

/// Midnight 2024-03-01 UTC, the instant test clocks are pinned to.
///
/// # Panics
///
/// Never; the timestamp is in range.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_709_251_200, 0).expect("timestamp is in range")
}

/// A clock pinned to [`fixed_now`].
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = fixed_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), fixed_now());
    }
}
