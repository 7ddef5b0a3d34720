use chrono::NaiveDate;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::Serializer;

pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s: &str = Deserialize::deserialize(deserializer)?;
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(serde::de::Error::custom)
}

pub fn serialize_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.format("%Y%m%d").to_string())
}

/// Parses `HH:MM:SS` into seconds since midnight. Hours may exceed 24 for
/// trips running past midnight (e.g. `25:30:00`).
pub fn parse_time(s: &str) -> Result<u32, crate::Error> {
    let mut parts = s.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(sec), None) => {
            let hours: u32 = h.trim().parse().map_err(|_| bad_time(s))?;
            let minutes: u32 = m.parse().map_err(|_| bad_time(s))?;
            let seconds: u32 = sec.parse().map_err(|_| bad_time(s))?;
            if minutes > 59 || seconds > 59 {
                return Err(bad_time(s));
            }
            Ok(hours * 3600 + minutes * 60 + seconds)
        }
        _ => Err(bad_time(s)),
    }
}

fn bad_time(s: &str) -> crate::Error {
    crate::Error::InvalidTime(s.to_owned())
}

/// Formats seconds since midnight as `H:MM:SS`, the format used in derived
/// trip identifiers during frequency expansion.
pub fn format_time(seconds_since_midnight: u32) -> String {
    let ssm = seconds_since_midnight;
    format!("{}:{:02}:{:02}", ssm / 3600, ssm % 3600 / 60, ssm % 60)
}

pub fn deserialize_time<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let s: &str = Deserialize::deserialize(deserializer)?;
    parse_time(s).map_err(de::Error::custom)
}

pub fn serialize_time<S>(time: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(
        format!(
            "{:02}:{:02}:{:02}",
            time / 3600,
            time % 3600 / 60,
            time % 60
        )
        .as_str(),
    )
}

pub fn deserialize_optional_time<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<&str> = Deserialize::deserialize(deserializer)?;

    match s {
        None | Some("") => Ok(None),
        Some(t) => parse_time(t).map(Some).map_err(de::Error::custom),
    }
}

pub fn serialize_optional_time<S>(time: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        None => serializer.serialize_none(),
        Some(t) => serialize_time(t, serializer),
    }
}

pub fn de_with_optional_float<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(de).and_then(|s| {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            s.trim().parse().map(Some).map_err(de::Error::custom)
        }
    })
}

pub fn serialize_float_as_str<S>(float: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match float {
        None => serializer.serialize_str(""),
        Some(f) => serializer.serialize_str(&f.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("01:01:01").unwrap(), 3661);
        assert_eq!(parse_time("8:00:00").unwrap(), 28800);
        // Hours past midnight are legal in GTFS
        assert_eq!(parse_time("25:30:00").unwrap(), 25 * 3600 + 30 * 60);
        assert!(parse_time("").is_err());
        assert!(parse_time("12:00").is_err());
        assert!(parse_time("12:61:00").is_err());
        assert!(parse_time("abc").is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(28800), "8:00:00");
        assert_eq!(format_time(31500), "8:45:00");
        assert_eq!(format_time(25 * 3600 + 61), "25:01:01");
    }
}
