//! Duration strings used in cutover.toml ("5s", "500ms", "2m", "1h").

use std::time::Duration;

/// Parse `<number><unit>` with unit `ms`, `s`, `m` or `h`.
///
/// A bare number is read as seconds. Overflow and unknown units yield `None`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value.parse().ok()?;

    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
