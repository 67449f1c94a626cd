//! Log collection window from `--since` / `--since-time`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Parse a Go-style duration: one or more `<number><unit>` pairs with units
/// `h`, `m`, `s`, `ms`, `us` or `ns` (`90s`, `1h30m`, `1.5h`).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("invalid duration '': expected e.g. 5s, 2m or 3h");
    }

    // Accumulated in nanoseconds so `300ms` stays exact.
    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            bail!("invalid duration '{}': expected a number", s);
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .with_context(|| format!("invalid duration '{}'", s))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit = match unit {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "us" | "µs" => 1_000.0,
            "ns" => 1.0,
            "" => bail!("invalid duration '{}': missing unit", s),
            other => bail!("invalid duration '{}': unknown unit '{}'", s, other),
        };
        total += value * nanos_per_unit;
        rest = tail;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        bail!("invalid duration '{}': out of range", s);
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

/// Lower bound for collected logs. `since` is relative to `now` and wins
/// over `since_time` when both are given.
pub fn parse_time_options(
    since: Option<&str>,
    since_time: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let mut window = None;

    if let Some(raw) = since_time.filter(|s| !s.is_empty()) {
        let at = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("since-time '{}' is not RFC3339", raw))?;
        window = Some(at.with_timezone(&Utc));
    }

    if let Some(raw) = since.filter(|s| !s.is_empty()) {
        if window.is_some() {
            warn!(since = raw, "both since and since-time set, using since");
        }
        let d = chrono::Duration::from_std(parse_duration(raw)?)
            .with_context(|| format!("since '{}' is out of range", raw))?;
        window = Some(now - d);
    }

    Ok(window)
}
