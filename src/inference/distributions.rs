// Reference distributions used by the tests
//
// Thin wrappers over statrs so every procedure evaluates tail probabilities
// and critical values the same way.

use crate::error::{AnalysisError, Result};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF, Normal};

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| AnalysisError::invalid("normal distribution", e, "mean 0, sd 1"))
}

/// Φ(x)
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// φ(x)
pub fn normal_pdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.pdf(x))
}

/// Φ⁻¹(p) for p in (0, 1)
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AnalysisError::invalid("probability", p, "a value in (0, 1)"));
    }
    Ok(standard_normal()?.inverse_cdf(p))
}

/// Two-sided p-value of a standard normal statistic
pub fn two_sided_p_value(z: f64) -> Result<f64> {
    let tail = standard_normal()?.sf(z.abs());
    Ok((2.0 * tail).min(1.0))
}

/// Critical value z such that P(|Z| > z) = alpha
pub fn two_sided_critical(alpha: f64) -> Result<f64> {
    normal_quantile(1.0 - alpha / 2.0)
}

/// Upper-tail probability of a chi-square statistic
pub fn chi_square_sf(statistic: f64, degrees_of_freedom: f64) -> Result<f64> {
    let dist = ChiSquared::new(degrees_of_freedom).map_err(|e| {
        AnalysisError::invalid("degrees_of_freedom", degrees_of_freedom, format!("> 0 ({})", e))
    })?;
    Ok(dist.sf(statistic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_symmetry() {
        assert!((normal_cdf(0.0).unwrap() - 0.5).abs() < 1e-12);
        let left = normal_cdf(-1.3).unwrap();
        let right = normal_cdf(1.3).unwrap();
        assert!((left + right - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_critical_value_95() {
        let z = two_sided_critical(0.05).unwrap();
        assert!((z - 1.959964).abs() < 1e-5);
    }

    #[test]
    fn test_quantile_rejects_bounds() {
        assert!(normal_quantile(0.0).is_err());
        assert!(normal_quantile(1.0).is_err());
        assert!(normal_quantile(f64::NAN).is_err());
    }

    #[test]
    fn test_two_sided_p_value() {
        assert!((two_sided_p_value(0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((two_sided_p_value(1.959964).unwrap() - 0.05).abs() < 1e-5);
        assert_eq!(
            two_sided_p_value(2.5).unwrap(),
            two_sided_p_value(-2.5).unwrap()
        );
    }

    #[test]
    fn test_chi_square_sf() {
        assert!((chi_square_sf(0.0, 1.0).unwrap() - 1.0).abs() < 1e-12);
        // 3.841459 is the 95th percentile of chi2(1)
        assert!((chi_square_sf(3.841459, 1.0).unwrap() - 0.05).abs() < 1e-5);
    }
}
