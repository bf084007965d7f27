//! The four fixed reducers over numeric samples.
//!
//! Every reducer returns NaN for an empty input.

/// Smallest value.
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(f64::NAN)
}

/// Largest value.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(f64::NAN)
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_reducers() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(min(&values), 2.0);
        assert_eq!(max(&values), 9.0);
        assert!((mean(&values) - 5.0).abs() < EPSILON);
        assert!((std_dev(&values) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_empty_is_nan() {
        assert!(min(&[]).is_nan());
        assert!(max(&[]).is_nan());
        assert!(mean(&[]).is_nan());
        assert!(std_dev(&[]).is_nan());
    }

    #[test]
    fn test_single_value() {
        assert_eq!(std_dev(&[3.0]), 0.0);
        assert_eq!(mean(&[3.0]), 3.0);
    }
}
