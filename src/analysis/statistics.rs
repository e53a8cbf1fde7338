//! Time-domain statistics of one axis (or a pair of axes) of a window
//!
//! All functions return `0.0` for empty input and for input without
//! variance where the result would otherwise be NaN.

/// Deadband applied to acceleration in [`displacement`]
pub const DISPLACEMENT_DEADBAND: f32 = 0.1;

/// Width of the sub-windows of [`haar`] and [`haar_cross`] relative to the
/// window length
pub const HAAR_WINDOW_FRACTION: f32 = 0.2;

/// Arithmetic mean
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn central_moment(values: &[f32], mean: f32, order: i32) -> f32 {
    values.iter().map(|&x| (x - mean).powi(order)).sum::<f32>() / values.len() as f32
}

/// Population variance
pub fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    central_moment(values, mean(values), 2)
}

/// Population standard deviation
pub fn std_dev(values: &[f32]) -> f32 {
    variance(values).sqrt()
}

/// Skewness (third standardized moment)
pub fn skew(values: &[f32]) -> f32 {
    let var = variance(values);
    if var <= 0.0 {
        return 0.0;
    }
    central_moment(values, mean(values), 3) / var.powf(1.5)
}

/// Excess kurtosis (fourth standardized moment minus 3)
pub fn kurtosis(values: &[f32]) -> f32 {
    let var = variance(values);
    if var <= 0.0 {
        return 0.0;
    }
    central_moment(values, mean(values), 4) / (var * var) - 3.0
}

/// Interquartile range, `sorted[3n/4] - sorted[n/4]`
pub fn iqr(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    sorted[3 * n / 4] - sorted[n / 4]
}

/// Mean absolute deviation from the mean
pub fn mad(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    values.iter().map(|&x| (x - mean).abs()).sum::<f32>() / values.len() as f32
}

/// Root mean square
pub fn rms(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|x| x * x).sum::<f32>() / values.len() as f32).sqrt()
}

/// Crest factor, peak magnitude over [`rms`]
pub fn crest(values: &[f32]) -> f32 {
    let rms = rms(values);
    if rms <= 0.0 {
        return 0.0;
    }
    values.iter().fold(0.0f32, |max, x| max.max(x.abs())) / rms
}

/// Pearson correlation of two equally long axes
pub fn correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (mean_a, mean_b) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }
    let denominator = (var_a * var_b).sqrt();
    if denominator <= 0.0 {
        return 0.0;
    }
    cov / denominator
}

fn deadband(x: f32) -> f32 {
    if x.abs() < DISPLACEMENT_DEADBAND {
        0.0
    } else {
        x
    }
}

/// Displacement over the window obtained by integrating acceleration twice
///
/// Both integrations use the trapezoidal rule with time step
/// `1 / sample_rate`. Acceleration whose magnitude is below
/// [`DISPLACEMENT_DEADBAND`] is treated as zero to suppress drift.
pub fn displacement(acceleration: &[f32], sample_rate: f64) -> f32 {
    if acceleration.len() < 2 || !(sample_rate > 0.0) {
        return 0.0;
    }
    let dt = (1.0 / sample_rate) as f32;
    let mut velocity = 0.0;
    let mut position = 0.0;
    for pair in acceleration.windows(2) {
        let next_velocity = velocity + (deadband(pair[0]) + deadband(pair[1])) / 2.0 * dt;
        position += (velocity + next_velocity) / 2.0 * dt;
        velocity = next_velocity;
    }
    position
}

fn haar_steps(n: usize) -> (usize, usize) {
    let width = ((n as f32 * HAAR_WINDOW_FRACTION) as usize).max(1);
    (width, (width / 2).max(1))
}

fn haar_response(values: &[f32], start: usize, width: usize) -> f32 {
    let half = width / 2;
    let left = mean(&values[start..start + half]);
    let right = mean(&values[start + half..start + width]);
    right - left
}

/// Haar-like step detector
///
/// Slides sub-windows of `0.2 * N` samples (at least one) in steps of half
/// their width over the window. Each position responds with the difference
/// of the means of its right and left halves; the result is the mean
/// absolute response.
pub fn haar(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let (width, step) = haar_steps(n);
    if width < 2 {
        return 0.0;
    }
    let responses: Vec<f32> = (0..=n - width)
        .step_by(step)
        .map(|start| haar_response(values, start, width).abs())
        .collect();
    mean(&responses)
}

/// Cross-axis Haar-like filter
///
/// Like [`haar`], but each position responds with the product of the step
/// responses of both axes, detecting simultaneous steps.
pub fn haar_cross(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (width, step) = haar_steps(n);
    if width < 2 {
        return 0.0;
    }
    let responses: Vec<f32> = (0..=n - width)
        .step_by(step)
        .map(|start| (haar_response(a, start, width) * haar_response(b, start, width)).abs())
        .collect();
    mean(&responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }
    #[test]
    fn test_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        approx(mean(&values), 5.0);
        approx(variance(&values), 4.0);
        approx(std_dev(&values), 2.0);
        approx(mad(&values), 1.5);
        approx(skew(&[1.0, 2.0, 3.0]), 0.0);
        approx(kurtosis(&[-1.0, 1.0, -1.0, 1.0]), -2.0);
        assert!(skew(&[0.0, 0.0, 0.0, 10.0]) > 0.0);
    }
    #[test]
    fn test_degenerate_input() {
        for f in [mean, variance, std_dev, skew, kurtosis, iqr, mad, rms, crest, haar] {
            assert_eq!(f(&[]), 0.0);
        }
        assert_eq!(skew(&[3.0; 5]), 0.0);
        assert_eq!(kurtosis(&[3.0; 5]), 0.0);
        assert_eq!(crest(&[0.0; 5]), 0.0);
        assert_eq!(correlation(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]), 0.0);
        assert_eq!(displacement(&[1.0], 50.0), 0.0);
    }
    #[test]
    fn test_iqr_rms_crest() {
        let values: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(iqr(&values), 6.0 - 2.0);
        approx(rms(&[3.0, -3.0, 3.0, -3.0]), 3.0);
        approx(crest(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        approx(crest(&[0.0, 0.0, 0.0, 2.0]), 2.0);
    }
    #[test]
    fn test_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        approx(correlation(&a, &[2.0, 4.0, 6.0, 8.0]), 1.0);
        approx(correlation(&a, &[8.0, 6.0, 4.0, 2.0]), -1.0);
    }
    #[test]
    fn test_displacement() {
        // constant 2 m/s² for one second covers 1 m
        let acceleration = vec![2.0; 101];
        approx(displacement(&acceleration, 100.0), 1.0);
        // below the deadband nothing moves
        assert_eq!(displacement(&vec![0.05; 101], 100.0), 0.0);
    }
    #[test]
    fn test_haar() {
        let flat = vec![1.0; 50];
        assert_eq!(haar(&flat), 0.0);
        let mut step = vec![0.0; 50];
        step[25..].fill(1.0);
        assert!(haar(&step) > 0.0);
        assert!(haar_cross(&step, &step) > 0.0);
        assert_eq!(haar_cross(&step, &flat), 0.0);
    }
}
