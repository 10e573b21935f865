//! Countdown formatting and urgency thresholds.

pub const WARNING_THRESHOLD_SECS: u32 = 180;
pub const CRITICAL_THRESHOLD_SECS: u32 = 60;

/// `m:ss`, minutes unpadded.
#[must_use]
pub fn format_countdown(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Remaining share of the window in `[0, 1]`.
#[must_use]
pub fn progress_fraction(time_left: u32, window_secs: u32) -> f64 {
    if window_secs == 0 {
        return 0.0;
    }
    f64::from(time_left.min(window_secs)) / f64::from(window_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    /// Amber.
    Warning,
    /// Red.
    Critical,
}

impl Urgency {
    #[must_use]
    pub fn for_time_left(secs: u32) -> Self {
        if secs <= CRITICAL_THRESHOLD_SECS {
            Self::Critical
        } else if secs <= WARNING_THRESHOLD_SECS {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[cfg(test)]
#[path = "display_test.rs"]
mod tests;
