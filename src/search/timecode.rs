//! Whole-second timecode conversions.

/// Format seconds as zero-padded `HH:MM:SS`. Hours widen naturally past 99.
pub fn sec_to_time(total_secs: u64) -> String {
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Combine hour, minute and second fields. Fields are not range-checked.
pub fn time_to_sec(hours: u64, minutes: u64, seconds: u64) -> u64 {
    hours * 3600 + minutes * 60 + seconds
}

/// Parse `HH:MM:SS`, `MM:SS` or a plain seconds count.
pub fn parse(text: &str) -> Option<u64> {
    let fields: Vec<u64> = text
        .split(':')
        .map(|f| f.trim().parse().ok())
        .collect::<Option<_>>()?;
    match fields[..] {
        [secs] => Some(secs),
        [minutes, seconds] => Some(time_to_sec(0, minutes, seconds)),
        [hours, minutes, seconds] => Some(time_to_sec(hours, minutes, seconds)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded_fields() {
        assert_eq!(sec_to_time(0), "00:00:00");
        assert_eq!(sec_to_time(59), "00:00:59");
        assert_eq!(sec_to_time(61), "00:01:01");
        assert_eq!(sec_to_time(3661), "01:01:01");
    }

    #[test]
    fn hours_widen_past_two_digits() {
        assert_eq!(sec_to_time(360_000), "100:00:00");
        assert_eq!(sec_to_time(359_999), "99:59:59");
    }

    #[test]
    fn combines_fields_without_validation() {
        assert_eq!(time_to_sec(1, 2, 3), 3723);
        // out-of-range fields pass straight through
        assert_eq!(time_to_sec(0, 90, 0), 5400);
    }

    #[test]
    fn round_trips_through_the_string_form() {
        for secs in [0u64, 1, 59, 60, 3599, 3600, 86_399, 123_456, 359_999] {
            let text = sec_to_time(secs);
            assert_eq!(parse(&text), Some(secs), "failed for {text}");
        }
    }

    #[test]
    fn parses_shorter_forms() {
        assert_eq!(parse("90"), Some(90));
        assert_eq!(parse("2:05"), Some(125));
        assert_eq!(parse("01:00:30"), Some(3630));
        assert_eq!(parse("x:00"), None);
        assert_eq!(parse("1:2:3:4"), None);
    }
}
