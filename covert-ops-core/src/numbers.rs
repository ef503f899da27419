//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

fn clamp_to_i32(value: f64) -> f64 {
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    value.clamp(min, max)
}

/// Round a f64 and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    cast::<f64, i32>(clamp_to_i32(value).round()).unwrap_or(0)
}

/// Ceil a f64 and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn ceil_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    cast::<f64, i32>(clamp_to_i32(value).ceil()).unwrap_or(0)
}

/// Truncate a f64 toward zero and clamp it to the i32 range.
#[must_use]
pub fn trunc_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    cast::<f64, i32>(clamp_to_i32(value).trunc()).unwrap_or(0)
}

/// Convert a collection length into an i32 divisor, saturating on overflow.
#[must_use]
pub fn len_to_i32(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Widen an i32 into an f32; large magnitudes lose precision.
#[must_use]
pub fn i32_to_f32(value: i32) -> f32 {
    cast::<i32, f32>(value).unwrap_or(0.0)
}
