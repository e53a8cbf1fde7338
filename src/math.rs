//! Mathematic functions helpful for signal analysis

use crate::flt;
use crate::numbers::*;

/// Modified Bessel function of the first kind of order zero
#[allow(non_snake_case)]
pub fn bessel_I0<Flt: Float>(x: Flt) -> Flt {
    let base = x * x / flt!(4);
    let mut addend = flt!(1);
    let mut sum = flt!(1);
    for i in 1.. {
        addend *= base / flt!(i * i);
        let old = sum;
        sum += addend;
        if sum == old || !sum.is_finite() {
            break;
        }
    }
    sum
}

/// Return value (multiplied with unknown constant) of Kaiser window with given
/// `beta`
///
/// The argument `x` ranges from `-1.0` to `1.0`; outside that range the
/// window is zero.
pub fn kaiser_rel_with_beta<Flt: Float>(beta: Flt, x: Flt) -> Flt {
    let root = flt!(1) - x * x;
    if root <= Flt::zero() {
        return Flt::zero();
    }
    bessel_I0(beta * Flt::sqrt(root))
}

/// Median of `values` (mean of the two middle values for even lengths)
///
/// Returns `None` for an empty slice. NaN values are ordered last.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Smallest value, ignoring NaN (`None` for an empty slice)
pub fn minimum(values: &[f32]) -> Option<f32> {
    values.iter().copied().filter(|x| !x.is_nan()).reduce(f32::min)
}

/// Convert a power ratio to decibels, mapping values below `1e-30` to
/// `-300 dB`
pub fn power_to_db(power: f64) -> f64 {
    if power < 1e-30 {
        -300.0
    } else {
        10.0 * power.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_approx;
    #[test]
    #[allow(non_snake_case)]
    fn test_bessel_I0() {
        assert_eq!(bessel_I0(0.0), 1.0);
        assert_eq!(bessel_I0(f64::INFINITY), f64::INFINITY);
        assert!(bessel_I0(f64::NAN).is_nan());
        assert_approx(bessel_I0(0.5), 1.06348337074132);
        assert_approx(bessel_I0(-0.5), 1.06348337074132);
        assert_approx(bessel_I0(1.23), 1.41552757215846);
        assert_approx(bessel_I0(15.8), 736184.938479417);
    }
    #[test]
    fn test_kaiser_edges() {
        assert_eq!(kaiser_rel_with_beta(5.0, 1.0), 0.0);
        assert_eq!(kaiser_rel_with_beta(5.0, -1.5), 0.0);
        assert_approx(kaiser_rel_with_beta(5.0, 0.0), bessel_I0(5.0));
    }
    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }
    #[test]
    fn test_power_to_db_floor() {
        assert_eq!(power_to_db(0.0), -300.0);
        assert_eq!(power_to_db(1e-31), -300.0);
        assert_approx(power_to_db(100.0), 20.0);
    }
}
