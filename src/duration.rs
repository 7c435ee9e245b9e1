//! Human-readable durations for command-line options.

use std::time::Duration;

/// Unit suffixes and their length in milliseconds. `ms` must be tried
/// before `m` and `s`.
const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)];

/// Parse a duration such as `500ms`, `2s`, `1m` or `1h`.
///
/// A bare number is interpreted as seconds. Used as a clap `value_parser`.
///
/// # Examples
/// ```
/// use wave_plus_exporter::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration".to_string());
    }

    let (number, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, millis)| src.strip_suffix(*suffix).map(|n| (n.trim(), *millis)))
        .unwrap_or((src, 1_000));

    let count: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    count
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {src}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_bare_number() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_whitespace() {
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("3 s").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
    }
}
