//! Day-boundary helpers for the reconciliation window

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Midnight UTC at the start of the given calendar day
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last whole second of the given calendar day (23:59:59 UTC)
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2021, 9, 1).unwrap();
        let expected = "2021-09-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        assert_eq!(start_of_day(date), expected);
    }

    #[test]
    fn test_end_of_day() {
        let date = NaiveDate::from_ymd_opt(2021, 9, 1).unwrap();
        let expected = "2021-09-01T23:59:59Z".parse::<DateTime<Utc>>().unwrap();

        assert_eq!(end_of_day(date), expected);
    }
}
