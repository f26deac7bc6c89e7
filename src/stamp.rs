use chrono::NaiveDateTime;

// Three timestamp conventions coexist in a log bundle: tar archives carry an
// underscore-delimited stamp, trace files a dash-delimited one, and converted
// text lines lead with a date + fractional-seconds pair. One parser each.

pub const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d_%H_%M_%S";
pub const TRACE_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
pub const LINE_STAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// Stamp embedded in a history archive stem, e.g.
/// `ecu1_bundle_20240415_15_33_03` -> segments `[2..6]`.
pub fn archive_stamp(stem: &str) -> Option<NaiveDateTime> {
    let segs: Vec<&str> = stem.split('_').collect();
    if segs.len() < 6 {
        return None;
    }
    let joined = segs[2..6].join("_");
    NaiveDateTime::parse_from_str(&joined, ARCHIVE_STAMP_FORMAT).ok()
}

/// Stamp embedded in a trace file name, e.g.
/// `HU_PARK_log_20240415-153103.dlt.finish.gz` -> last `_` segment up to the
/// first dot.
pub fn trace_stamp(name: &str) -> Option<NaiveDateTime> {
    let last = name.rsplit('_').next()?;
    let token = last.split('.').next()?;
    NaiveDateTime::parse_from_str(token, TRACE_STAMP_FORMAT).ok()
}

/// Stamp leading a converted text line: first two whitespace tokens.
pub fn line_stamp(line: &str) -> Option<NaiveDateTime> {
    let mut it = line.split_whitespace();
    let date = it.next()?;
    let time = it.next()?;
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), LINE_STAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn archive_stamp_uses_fixed_segments() {
        let t = archive_stamp("ecu1_bundle_20240415_15_33_03").unwrap();
        assert_eq!(t, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_opt(15, 33, 3).unwrap());
        // trailing segments beyond the stamp are ignored
        let t2 = archive_stamp("ecu1_bundle_20240415_15_33_03_full").unwrap();
        assert_eq!(t, t2);
    }

    #[test]
    fn archive_stamp_rejects_malformed() {
        assert!(archive_stamp("20240415_15_33_03").is_none());
        assert!(archive_stamp("ecu1_bundle_2024_99_99_99").is_none());
        assert!(archive_stamp("plain").is_none());
    }

    #[test]
    fn trace_stamp_reads_last_segment() {
        let t = trace_stamp("HU_PARK_log_20240415-153103.dlt.finish.gz").unwrap();
        assert_eq!(t, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_opt(15, 31, 3).unwrap());
        assert_eq!(trace_stamp("PARK_20240415-153103.dlt"), trace_stamp("x_PARK_y_20240415-153103.dlt.finish.gz"));
    }

    #[test]
    fn trace_stamp_rejects_malformed() {
        assert!(trace_stamp("HU_PARK_log.dlt").is_none());
        assert!(trace_stamp("HU_PARK_log_2024.dlt").is_none());
    }

    #[test]
    fn line_stamp_reads_first_two_tokens() {
        let t = line_stamp("2024/04/15 15:31:03.250000 ECU1 PARK CTX1 log info door closed").unwrap();
        assert_eq!(t, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_micro_opt(15, 31, 3, 250_000).unwrap());
        // whole seconds still parse under the fractional format
        assert!(line_stamp("2024/04/15 15:31:03 rest").is_some());
        assert!(line_stamp("garbage line").is_none());
        assert!(line_stamp("").is_none());
    }
}
