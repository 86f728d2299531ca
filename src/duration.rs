// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! Supports parsing duration strings in Go format (e.g., "2s", "1m", "30m", "1h30m") into
//! Rust `std::time::Duration`. Used for every interval and timeout flag.

use anyhow::{bail, Context, Result};
use std::time::Duration;

const MILLIS_PER_SECOND: u64 = 1000;
const MILLIS_PER_MINUTE: u64 = 60_000;
const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Supported units:
/// - `ms` (milliseconds): "500ms"
/// - `s` (seconds): "2s"
/// - `m` (minutes): "30m"
/// - `h` (hours): "1h"
///
/// Components may be concatenated, largest first or not: "1h30m", "1m30s".
///
/// # Examples
///
/// ```
/// use private_dns::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
///
/// // Invalid formats return errors
/// assert!(parse_duration("").is_err());
/// assert!(parse_duration("10").is_err());  // Missing unit
/// assert!(parse_duration("10x").is_err()); // Invalid unit
/// assert!(parse_duration("0s").is_err());  // Zero duration
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The string is empty
/// - A component is missing its unit or uses an unknown unit
/// - The value overflows
/// - The total duration is zero
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    if duration_str.is_empty() {
        bail!("Duration string cannot be empty");
    }

    let mut remaining = duration_str;
    let mut total_millis: u64 = 0;

    while !remaining.is_empty() {
        // Find where digits end and unit begins
        let split_pos = remaining
            .chars()
            .position(|c| !c.is_ascii_digit())
            .context("Duration must end with a unit (ms, s, m, or h)")?;

        if split_pos == 0 {
            bail!("Duration '{duration_str}' has a unit without a value");
        }

        let (value_str, rest) = remaining.split_at(split_pos);
        let value: u64 = value_str
            .parse()
            .context("Duration value must be a positive integer")?;

        let unit_len = rest
            .chars()
            .position(|c| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, tail) = rest.split_at(unit_len);

        let factor = match unit {
            "ms" => 1,
            "s" => MILLIS_PER_SECOND,
            "m" => MILLIS_PER_MINUTE,
            "h" => MILLIS_PER_HOUR,
            _ => bail!(
                "Unsupported duration unit '{unit}'. Use 'ms', 's' (seconds), 'm' (minutes), or 'h' (hours)"
            ),
        };

        let millis = value
            .checked_mul(factor)
            .context("Duration value too large (overflow)")?;
        total_millis = total_millis
            .checked_add(millis)
            .context("Duration value too large (overflow)")?;

        remaining = tail;
    }

    if total_millis == 0 {
        bail!("Duration '{duration_str}' must be greater than zero");
    }

    Ok(Duration::from_millis(total_millis))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
