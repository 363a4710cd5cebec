use serde_json::Value;

/// Clamp an entered component to `[0, max]`.
///
/// Absent stays absent: `None` means "not entered", which is not the same as
/// an entered zero. Out-of-range values are clamped, never rejected, so data
/// entry is never blocked. NaN is treated as not entered.
pub fn normalize(value: Option<f64>, max: f64) -> Option<f64> {
    match value {
        None => None,
        Some(v) if v.is_nan() => None,
        Some(v) => Some(v.clamp(0.0, max.max(0.0))),
    }
}

/// Absent components count as zero inside a sum.
///
/// This does not make a total "incomplete"; a term with missing components
/// still produces a total.
pub fn or_zero(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

/// Normalize, then apply the absent-as-zero policy.
pub fn clamped_or_zero(value: Option<f64>, max: f64) -> f64 {
    or_zero(normalize(value, max))
}

/// True if any `(value, max)` pair is still above zero after clamping.
///
/// A negative or NaN entry clamps to nothing and does not mark the subject
/// as taken.
pub fn any_nonzero(fields: &[(Option<f64>, f64)]) -> bool {
    fields
        .iter()
        .any(|&(v, max)| matches!(normalize(v, max), Some(x) if x > 0.0))
}

/// Lenient numeric coercion for stored or entered component values.
///
/// Numbers pass through, numeric strings are parsed, anything else degrades
/// to `None` instead of failing.
pub fn coerce_component(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            t.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Look up `key` in a component map and coerce it.
pub fn component(map: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(coerce_component)
}

/// Half-up rounding: `4.5 -> 5`, `3.5 -> 4`, `4.49 -> 4`.
///
/// Inputs here are never negative after clamping, where this agrees with
/// rounding half away from zero.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_clamps_into_range() {
        assert_eq!(normalize(Some(12.0), 10.0), Some(10.0));
        assert_eq!(normalize(Some(-3.0), 10.0), Some(0.0));
        assert_eq!(normalize(Some(7.5), 10.0), Some(7.5));
        assert_eq!(normalize(Some(0.0), 10.0), Some(0.0));
    }

    #[test]
    fn normalize_keeps_absent_distinct_from_zero() {
        assert_eq!(normalize(None, 80.0), None);
        assert_eq!(normalize(Some(f64::NAN), 80.0), None);
        assert_eq!(or_zero(normalize(None, 80.0)), 0.0);
    }

    #[test]
    fn normalize_output_always_within_bounds() {
        for max in [5.0, 10.0, 30.0, 80.0] {
            for raw in [-100.0, -0.1, 0.0, 2.5, 5.0, 79.9, 80.0, 1e6] {
                let v = normalize(Some(raw), max).expect("present");
                assert!((0.0..=max).contains(&v), "{} clamped to {} for max {}", raw, v, max);
            }
        }
    }

    #[test]
    fn any_nonzero_looks_at_clamped_values() {
        assert!(!any_nonzero(&[(Some(-2.0), 10.0), (Some(-5.0), 30.0), (None, 5.0)]));
        assert!(!any_nonzero(&[(Some(0.0), 10.0), (Some(f64::NAN), 5.0)]));
        assert!(any_nonzero(&[(Some(-1.0), 10.0), (Some(0.5), 5.0)]));
        assert!(!any_nonzero(&[]));
    }

    #[test]
    fn coerce_component_is_lenient() {
        assert_eq!(coerce_component(&json!(8)), Some(8.0));
        assert_eq!(coerce_component(&json!(7.5)), Some(7.5));
        assert_eq!(coerce_component(&json!(" 9 ")), Some(9.0));
        assert_eq!(coerce_component(&json!("")), None);
        assert_eq!(coerce_component(&json!("AB")), None);
        assert_eq!(coerce_component(&json!(null)), None);
        assert_eq!(coerce_component(&json!(true)), None);
        assert_eq!(coerce_component(&json!({"v": 1})), None);
    }

    #[test]
    fn round_half_up_rounds_halves_up() {
        assert_eq!(round_half_up(4.5), 5.0);
        assert_eq!(round_half_up(3.5), 4.0);
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(4.49), 4.0);
        assert_eq!(round_half_up(0.0), 0.0);
    }
}
