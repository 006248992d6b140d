//! Utilidades de validación
//!
//! Helpers used by the payload DTOs: business-key checks, lenient timestamp
//! parsing and serde adapters for fields the client sends in loose shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use validator::ValidationError;

/// Maximum length of an order number, matching the `order_number` column
pub const ORDER_NUMBER_MAX_LEN: usize = 50;

/// Validate a business key: non-blank, bounded, no control characters
pub fn validate_order_number(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }

    if trimmed.chars().count() > ORDER_NUMBER_MAX_LEN {
        let mut error = ValidationError::new("length");
        error.add_param("max".into(), &ORDER_NUMBER_MAX_LEN);
        error.add_param("actual".into(), &trimmed.chars().count());
        return Err(error);
    }

    if trimmed.chars().any(char::is_control) {
        let mut error = ValidationError::new("control_characters");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }

    Ok(())
}

/// Reject strings that are empty once trimmed
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

/// Parse a timestamp as RFC 3339, or as a naive ISO date/datetime taken to be UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter: optional timestamp in any shape `parse_timestamp` accepts.
/// Blank strings read as absent.
pub mod lenient_datetime {
    use super::*;
    use serde::de::Error;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", s))),
        }
    }
}

/// Serde adapter: explicit `null` reads as the type's default
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trim and drop blank strings
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_validate_order_number() {
        assert!(validate_order_number("X1").is_ok());
        assert!(validate_order_number("  ").is_err());
        assert!(validate_order_number(&"A".repeat(51)).is_err());
        assert!(validate_order_number("AB\u{0007}").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Call driver").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let parsed = parse_timestamp("2024-03-01T10:30:00+03:00").unwrap();
        assert_eq!(parsed.hour(), 7);
    }

    #[test]
    fn test_parse_timestamp_naive_forms() {
        let parsed = parse_timestamp("2024-03-01T10:30:00.1234567").unwrap();
        assert_eq!((parsed.day(), parsed.hour(), parsed.minute()), (1, 10, 30));

        let parsed = parse_timestamp("2024-03-01 08:00:00").unwrap();
        assert_eq!(parsed.hour(), 8);

        let parsed = parse_timestamp("2024-03-01").unwrap();
        assert_eq!((parsed.month(), parsed.hour()), (3, 0));

        assert!(parse_timestamp("01/03/2024").is_none());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(Some("  Acme ".to_string())).as_deref(), Some("Acme"));
        assert_eq!(normalize_text(Some("   ".to_string())), None);
        assert_eq!(normalize_text(None), None);
    }
}
