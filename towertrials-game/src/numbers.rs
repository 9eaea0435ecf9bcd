//! Numeric sanitation centralizing every "default if missing" policy.
//!
//! All displayed numbers originate from user input, partially applied RPC
//! results, or arithmetic over possibly absent bonuses. Funneling them
//! through one choke point keeps corrupted values out of the store.

use num_traits::cast::cast;

/// Sanitize a possibly missing or non-finite number into a safe integer.
///
/// `None`, `NaN`, and infinities coerce to `default`; the result is clamped
/// to `[min, max]` when bounds are given and always floored to an integer.
/// Coercion is logged as a diagnostic but never an error.
#[must_use]
pub fn validate_number(
    value: Option<f64>,
    default: i64,
    min: Option<i64>,
    max: Option<i64>,
) -> i64 {
    let mut coerced = false;
    let raw = match value {
        Some(v) if v.is_finite() => floor_f64_to_i64(v),
        _ => {
            coerced = true;
            default
        }
    };
    let mut result = raw;
    if let Some(lo) = min {
        result = result.max(lo);
    }
    if let Some(hi) = max {
        result = result.min(hi);
    }
    if coerced || result != raw {
        log::warn!("sanitized numeric field {value:?} -> {result} (default {default})");
    }
    result
}

/// Current HP: clamped to `[0, max_hp]`, corrupted values land on 1
/// so a bad payload never kills the character outright.
#[must_use]
pub fn validate_hp(value: Option<f64>, max_hp: i64) -> i64 {
    validate_number(value, 1, Some(0), Some(max_hp.max(0)))
}

/// Current mana: clamped to `[0, max_mana]`, corrupted values empty the pool.
#[must_use]
pub fn validate_mana(value: Option<f64>, max_mana: i64) -> i64 {
    validate_number(value, 0, Some(0), Some(max_mana.max(0)))
}

/// Attack never drops below 1; a zero-attack character cannot act.
#[must_use]
pub fn validate_attack(value: Option<f64>) -> i64 {
    validate_number(value, 1, Some(1), None)
}

/// Defense floors at 0.
#[must_use]
pub fn validate_defense(value: Option<f64>) -> i64 {
    validate_number(value, 0, Some(0), None)
}

/// Speed never drops below 1 so turn ordering stays well defined.
#[must_use]
pub fn validate_speed(value: Option<f64>) -> i64 {
    validate_number(value, 1, Some(1), None)
}

/// Floor a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Floor a f64 and clamp it to the i32 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i32>(clamped).unwrap_or(0)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_inputs_fall_back_to_default() {
        assert_eq!(validate_number(Some(f64::NAN), 7, None, None), 7);
        assert_eq!(validate_number(Some(f64::INFINITY), 7, None, None), 7);
        assert_eq!(validate_number(Some(f64::NEG_INFINITY), 7, None, None), 7);
        assert_eq!(validate_number(None, 7, None, None), 7);
    }

    #[test]
    fn values_are_floored_and_clamped() {
        assert_eq!(validate_number(Some(3.9), 0, None, None), 3);
        assert_eq!(validate_number(Some(-2.5), 0, Some(0), None), 0);
        assert_eq!(validate_number(Some(120.0), 0, Some(0), Some(99)), 99);
    }

    #[test]
    fn default_is_also_clamped() {
        assert_eq!(validate_number(None, 500, Some(0), Some(100)), 100);
    }

    #[test]
    fn domain_helpers_apply_their_bounds() {
        assert_eq!(validate_hp(Some(250.0), 200), 200);
        assert_eq!(validate_hp(Some(-5.0), 200), 0);
        assert_eq!(validate_hp(None, 200), 1);
        assert_eq!(validate_mana(None, 80), 0);
        assert_eq!(validate_attack(Some(0.0)), 1);
        assert_eq!(validate_defense(Some(-3.0)), 0);
        assert_eq!(validate_speed(Some(f64::NAN)), 1);
    }

    #[test]
    fn hp_bound_survives_negative_max() {
        assert_eq!(validate_hp(Some(10.0), -50), 0);
    }

    #[test]
    fn casts_handle_extremes() {
        assert_eq!(floor_f64_to_i64(f64::NAN), 0);
        assert_eq!(floor_f64_to_i32(f64::from(i32::MAX) * 2.0), i32::MAX);
        assert_eq!(floor_f64_to_i64(1.99), 1);
    }
}
