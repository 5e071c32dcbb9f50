use std::time::Duration;

/// Parses a duration such as `500ms`, `10s`, `2m`, `1h` or `1m30s`.
///
/// A bare number is taken as seconds, which is how the interval was
/// configured before duration strings were accepted.
pub fn parse_duration(q: &str) -> Option<Duration> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    if let Ok(secs) = q.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    // Order matters: "ms" must be tried before "m" and "s".
    const UNITS: &[(&str, u64)] = &[
        ("ms", 1),
        ("s", 1_000),
        ("m", 60 * 1_000),
        ("h", 60 * 60 * 1_000),
    ];

    let mut rest = q;
    let mut total_ms: f64 = 0.0;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let (suffix, mul) = UNITS.iter().find(|(suf, _)| rest.starts_with(suf))?;
        total_ms += value * (*mul as f64);
        rest = &rest[suffix.len()..];
    }
    Some(Duration::from_millis(total_ms.round() as u64))
}

/// Truthy values are `1` and the usual spellings of `true`; anything else is false.
pub fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "True")
}

/// Converts a kubelet counter into a gauge value.
pub fn to_gauge_value(count: u64) -> f64 {
    count as f64
}
