//! Shared primitive types used across the whole crate.

/// Money values (RWF). Always exact; never f64.
pub type Amount = rust_decimal::Decimal;

/// Wall-clock time as printed in a notification. Notifications carry no
/// zone, so everything stays naive local time.
pub type Timestamp = chrono::NaiveDateTime;

/// A stable, unique identifier for a stored record.
pub type RecordId = String;

/// Layout used when timestamps are written to text (store, reports).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The instant `hours` before `at`, clamped to the representable range so a
/// look-back window never overflows.
pub fn hours_before(at: Timestamp, hours: i64) -> Timestamp {
    chrono::Duration::try_hours(hours)
        .and_then(|window| at.checked_sub_signed(window))
        .unwrap_or(if hours >= 0 { Timestamp::MIN } else { Timestamp::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn look_back_clamps_instead_of_overflowing() {
        let at = NaiveDate::from_ymd_opt(2025, 7, 30).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(hours_before(at, 24), at - chrono::Duration::hours(24));
        assert_eq!(hours_before(at, i64::MAX), Timestamp::MIN);
        assert_eq!(hours_before(Timestamp::MIN, 1), Timestamp::MIN);
        assert_eq!(hours_before(at, i64::MIN), Timestamp::MAX);
    }
}
