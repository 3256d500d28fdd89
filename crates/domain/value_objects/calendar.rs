use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses an upstream calendar date. Accepts a bare `YYYY-MM-DD` or any
/// timestamp whose first ten characters are one.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(timestamp) = parse_timestamp(trimmed) {
        return Some(timestamp.date());
    }
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Parses an upstream timestamp into a UTC-naive value. Offsets are
/// normalized to UTC, offset-less values are taken as UTC already.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(value);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Serde adapter for optional dates that may arrive as dates, timestamps,
/// empty strings or `null`.
pub mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_calendar_date))
    }
}

pub mod lenient_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(timestamp) => {
                serializer.serialize_str(&timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_date_part_of_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_calendar_date("2024-01-31"), Some(expected));
        assert_eq!(parse_calendar_date("2024-01-31T18:20:00.123"), Some(expected));
        assert_eq!(parse_calendar_date("2024-01-31T23:30:00+00:00"), Some(expected));
        assert_eq!(parse_calendar_date(""), None);
    }

    #[test]
    fn offsets_are_normalized_to_utc_days() {
        let parsed = parse_timestamp("2024-02-01T02:00:00+05:30").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }
}
