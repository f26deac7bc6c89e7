use chrono::{Duration, NaiveDateTime};

/// Tolerance shared by every time comparison in the pipeline.
pub const WINDOW_MINUTES: i64 = 5;

pub const INCIDENT_FORMAT: &str = "%Y/%m/%d - %H:%M:%S";

pub fn in_window(t: NaiveDateTime, incident: NaiveDateTime) -> bool {
    (t - incident).abs() <= Duration::minutes(WINDOW_MINUTES)
}

pub fn parse_incident(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), INCIDENT_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn window_is_symmetric() {
        let a = at(15, 31, 3);
        let b = at(15, 34, 9);
        assert_eq!(in_window(a, b), in_window(b, a));
        assert!(in_window(a, a));
    }

    #[test]
    fn edges_are_inclusive() {
        let i = at(15, 31, 3);
        assert!(in_window(at(15, 26, 3), i));
        assert!(in_window(at(15, 36, 3), i));
        assert!(!in_window(at(15, 26, 2), i));
        assert!(!in_window(at(15, 36, 4), i));
    }

    #[test]
    fn subsecond_precision_is_kept() {
        let i = at(15, 31, 3);
        let just_inside = at(15, 36, 3);
        let just_outside = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_micro_opt(15, 36, 3, 1).unwrap();
        assert!(in_window(just_inside, i));
        assert!(!in_window(just_outside, i));
    }

    #[test]
    fn parses_operator_format() {
        let t = parse_incident("2024/04/15 - 15:31:03").unwrap();
        assert_eq!(t, at(15, 31, 3));
        assert!(parse_incident("2024-04-15 15:31:03").is_none());
        assert!(parse_incident("").is_none());
    }
}
