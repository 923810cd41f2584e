use chrono::{DateTime, Utc};

pub const CLOSED: &str = "closed";

/// Human readable countdown to a prediction deadline.
pub fn format_time_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = end - now;

    if remaining <= chrono::Duration::zero() {
        return CLOSED.to_string();
    }

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m left")
    } else if hours > 0 {
        format!("{hours}h {minutes}m left")
    } else {
        format!("{minutes}m left")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_past_deadline() {
        assert_eq!(format_time_remaining(now(), now()), "closed");
        assert_eq!(format_time_remaining(now() - Duration::hours(1), now()), "closed");
    }

    #[test]
    fn test_days_hours_minutes() {
        let end = now() + Duration::days(2) + Duration::hours(3) + Duration::minutes(4);

        assert_eq!(format_time_remaining(end, now()), "2d 3h 4m left");
    }

    #[test]
    fn test_hours_only() {
        let end = now() + Duration::hours(5) + Duration::seconds(59);

        assert_eq!(format_time_remaining(end, now()), "5h 0m left");
    }

    #[test]
    fn test_under_a_minute() {
        let end = now() + Duration::seconds(30);

        assert_eq!(format_time_remaining(end, now()), "0m left");
    }
}
