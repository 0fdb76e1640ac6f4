use serde_json::Value;

pub const MAX_MARK: i64 = 100;

/// Reads one submitted mark. `null` and blank strings clear the mark; numbers
/// and numeric strings must be whole values in `0..=100`.
pub fn classify_mark(value: &Value) -> Result<Option<i32>, String> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected a whole number, got {s:?}"))?,
        Value::Number(n) => match n.as_i64() {
            Some(n) => n,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.is_finite() => f as i64,
                _ => return Err(format!("expected a whole number, got {n}")),
            },
        },
        other => return Err(format!("expected a number or null, got {other}")),
    };

    if !(0..=MAX_MARK).contains(&number) {
        return Err(format!("must be between 0 and {MAX_MARK}, got {number}"));
    }
    i32::try_from(number).map(Some).map_err(|err| err.to_string())
}
