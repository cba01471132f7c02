//! Small validators used by `PanelConfig::validate`.

use std::ops::RangeInclusive;
use url::Url;

/// Validates that a string is an absolute `http`/`https` URL usable as a request base.
///
/// # Returns
///
/// * `Ok(())` if the URL parses and uses an HTTP scheme.
/// * `Err(&'static str)` otherwise.
pub fn is_valid_base_url(value: &str) -> Result<(), &'static str> {
    let url = Url::parse(value).map_err(|_| "Invalid server URL")?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err("Server URL must use http or https"),
    }
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates that a debug plot component is safe to splice into a plot name.
///
/// Plot names travel in a query string and name files on the server, so only
/// ASCII letters, digits and underscores are accepted.
pub fn is_valid_plot_token(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("Plot name cannot be empty");
    }
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err("Plot name may only contain letters, digits and underscores")
    }
}

/// Validates a tracing level name.
pub fn is_valid_log_level(value: &str) -> Result<(), &'static str> {
    match value.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err("Log level must be one of: trace, debug, info, warn, error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert!(is_valid_base_url("http://127.0.0.1:5000").is_ok());
        assert!(is_valid_base_url("https://sonar.local/panel/").is_ok());
        assert!(is_valid_base_url("ftp://sonar.local").is_err());
        assert!(is_valid_base_url("not a url").is_err());
    }

    #[test]
    fn test_range() {
        assert!(is_in_range(8, 1..=64).is_ok());
        assert!(is_in_range(0, 1..=64).is_err());
        assert!(is_in_range(65, 1..=64).is_err());
    }

    #[test]
    fn test_plot_token() {
        assert!(is_valid_plot_token("range_profile").is_ok());
        assert!(is_valid_plot_token("all_profile_mags").is_ok());
        assert!(is_valid_plot_token("").is_err());
        assert!(is_valid_plot_token("../etc/passwd").is_err());
        assert!(is_valid_plot_token("chirp.png").is_err());
    }

    #[test]
    fn test_log_level() {
        assert!(is_valid_log_level("INFO").is_ok());
        assert!(is_valid_log_level("verbose").is_err());
    }
}
