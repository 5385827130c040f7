use serde::{Deserialize, Serialize};

/// Lifecycle state of the current run session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

impl RunState {
    /// Short label for UI display.
    pub fn label(self) -> &'static str {
        match self {
            RunState::Stopped => "STOPPED",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
        }
    }
}

/// A persisted run record. Immutable after insert, except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub date: String,
    pub duration: String,
    pub shuttles: u32,
    pub distance_in_meters: f64,
}

/// A run about to be persisted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub date: String,
    pub duration: String,
    pub shuttles: u32,
    pub distance_in_meters: f64,
}

/// Point-in-time view of the session, published to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub state: RunState,
    pub elapsed_ms: u64,
    pub shuttles: u32,
    pub distance_m: f64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: RunState::Stopped,
            elapsed_ms: 0,
            shuttles: 0,
            distance_m: 0.0,
        }
    }
}

/// Format elapsed milliseconds as "MM:SS:CC" (minutes, seconds, hundredths).
///
/// Minutes are not wrapped at 60; persisted durations use exactly this format.
pub fn format_duration(elapsed_ms: u64) -> String {
    let minutes = elapsed_ms / 60_000;
    let seconds = (elapsed_ms % 60_000) / 1000;
    let hundredths = (elapsed_ms % 1000) / 10;
    format!("{:02}:{:02}:{:02}", minutes, seconds, hundredths)
}

/// Current local calendar date as "dd/mm/yyyy", matching persisted records.
pub fn today_date() -> String {
    let fmt = time::macros::format_description!("[day]/[month]/[year]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&fmt).unwrap_or_else(|_| "??/??/????".into())
}

/// Distance for display: meters up to 1 km, kilometers beyond.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.1} m", meters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_zero() {
        assert_eq!(format_duration(0), "00:00:00");
    }

    #[test]
    fn format_duration_subsecond() {
        assert_eq!(format_duration(10), "00:00:01");
        assert_eq!(format_duration(990), "00:00:99");
    }

    #[test]
    fn format_duration_mixed() {
        assert_eq!(format_duration(1500), "00:01:50");
        assert_eq!(format_duration(61_230), "01:01:23");
    }

    #[test]
    fn format_duration_minutes_do_not_wrap() {
        assert_eq!(format_duration(3_600_000), "60:00:00");
    }

    #[test]
    fn format_duration_truncates_to_hundredths() {
        // 1009ms -> hundredths field is 0, not rounded to 1
        assert_eq!(format_duration(1009), "00:01:00");
    }

    #[test]
    fn format_distance_units() {
        assert_eq!(format_distance(0.0), "0.0 m");
        assert_eq!(format_distance(999.94), "999.9 m");
        assert_eq!(format_distance(1500.0), "1.50 km");
    }

    #[test]
    fn today_date_shape() {
        let d = today_date();
        assert_eq!(d.len(), 10);
        assert_eq!(d.as_bytes()[2], b'/');
        assert_eq!(d.as_bytes()[5], b'/');
    }
}
