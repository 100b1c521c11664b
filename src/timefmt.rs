use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Stored timestamps are fixed-width UTC so that string order is time order.
pub fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if let Some(dt) = parse_instant(t) {
        return Some(dt);
    }
    let d = NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()?;
    Some(d.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_dates_normalise_to_fixed_width_utc() {
        let a = parse_due_date("2026-03-01").map(format_ts);
        assert_eq!(a.as_deref(), Some("2026-03-01T00:00:00.000Z"));
        let b = parse_due_date("2026-03-01T10:30:00+02:00").map(format_ts);
        assert_eq!(b.as_deref(), Some("2026-03-01T08:30:00.000Z"));
        assert!(parse_due_date("next tuesday").is_none());
    }
}
