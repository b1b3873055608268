/// 除數為 0 或任一邊不是有限數時回傳 default
pub fn safe_divide(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return default;
    }
    let result = numerator / denominator;
    if result.is_finite() {
        result
    } else {
        default
    }
}

pub fn sanitize(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// 四捨五入到小數 places 位，非有限數原樣回傳
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 最小平方法斜率，x 為 0..n
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    safe_divide(num, den, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_safe_divide_handles_zero_and_invalid() {
        assert_eq!(safe_divide(10.0, 0.0, 0.0), 0.0);
        assert_eq!(safe_divide(10.0, 0.0, 5.0), 5.0);
        assert_eq!(safe_divide(10.0, f64::NAN, 0.0), 0.0);
        assert_eq!(safe_divide(f64::INFINITY, 2.0, 0.0), 0.0);
        assert_eq!(safe_divide(10.0, 4.0, 0.0), 2.5);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(f64::NAN, 0.0), 0.0);
        assert_eq!(sanitize(f64::INFINITY, 1.0), 1.0);
        assert_eq!(sanitize(-5.0, 0.0), -5.0);
    }

    #[test]
    fn test_round_to() {
        assert_relative_eq!(round_to(3.14159, 2), 3.14);
        assert_relative_eq!(round_to(2.5, 0), 3.0);
        assert_relative_eq!(round_to(-1.256, 1), -1.3);
        assert_relative_eq!(round_to(1234.5678, 0), 1235.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_linear_slope() {
        assert_relative_eq!(linear_slope(&[1.0, 3.0, 5.0, 7.0]), 2.0);
        assert_relative_eq!(linear_slope(&[4.0, 4.0, 4.0]), 0.0);
        assert_eq!(linear_slope(&[1.0]), 0.0);
    }
}
