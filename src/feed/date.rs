use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Offset-carrying layouts tried after RFC 2822 and RFC 3339.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
];

/// Layouts without an offset, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

/// Parses the date formats feeds actually use.
///
/// RSS mandates RFC 2822 and Atom RFC 3339, but real feeds send weekday
/// mismatches, `UTC` zone names, missing offsets and bare dates. Returns
/// `None` for anything still unrecognised.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let normalized = normalize_zone(value);
    let value = normalized.as_str();

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // A wrong weekday name fails RFC 2822 parsing; the rest is still usable.
    if let Some((_, rest)) = value.split_once(", ") {
        if let Ok(dt) = DateTime::parse_from_rfc2822(rest) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rewrites trailing `UTC`/`Z` zone names into a numeric offset.
fn normalize_zone(value: &str) -> String {
    for suffix in [" UTC", " Z"] {
        if let Some(stripped) = value.strip_suffix(suffix) {
            return format!("{stripped} +0000");
        }
    }
    value.to_string()
}
