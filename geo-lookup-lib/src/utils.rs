//! Utility functions for address handling and validation.

use crate::error::LookupError;
use crate::types::MAX_TIMEOUT;

/// Validate that an address can be embedded as a single URL path segment.
///
/// This is deliberately loose: anything the remote service might accept
/// (IPv4, IPv6, hostnames, even junk like `bad-ip`) passes, and the service
/// decides. Only inputs that would change the shape of the request URL are
/// rejected here.
pub fn validate_address(address: &str) -> Result<(), LookupError> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(LookupError::invalid_address(address, "Address cannot be empty"));
    }

    if let Some(c) = trimmed
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '\\'))
    {
        return Err(LookupError::invalid_address(
            address,
            format!("Address contains forbidden character {:?}", c),
        ));
    }

    Ok(())
}

/// Parse an address list, one entry per line.
///
/// Blank lines and `#` comments (whole-line or trailing) are skipped.
/// Duplicates are kept: every submitted entry produces its own outcome.
pub fn parse_address_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Parse a duration string like "500ms", "5s", "2m" or a bare number of seconds.
pub fn parse_duration(value: &str) -> Option<std::time::Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(std::time::Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(std::time::Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(std::time::Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(std::time::Duration::from_secs)
    }
}

/// Parse a timeout setting: a duration that is non-zero and at most
/// [`MAX_TIMEOUT`].
pub fn parse_timeout(value: &str) -> Option<std::time::Duration> {
    parse_duration(value).filter(|d| !d.is_zero() && *d <= MAX_TIMEOUT)
}
