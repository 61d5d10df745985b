//! Descriptive statistics, Pearson correlation and Welch's t-test.
//!
//! Every test statistic returns `None` rather than an error when the sample cannot support it;
//! callers report that as "statistics unavailable".

use log::warn;
use serde::Serialize;

use crate::stratify::Strata;

/// `None` for an empty sample or one holding a non-finite value
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64).filter(|m| m.is_finite())
}

/// Unbiased sample variance (n - 1 denominator)
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(sum_sq / (values.len() - 1) as f64)
}

/// Quantile `q` in [0, 1], interpolating linearly between the two closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub r: f64,
    /// Two-tailed, against the null hypothesis of no correlation
    pub p_value: f64,
    pub n: usize,
}

/// Pearson's r between paired samples.
///
/// Not computable for fewer than three pairs, when either sample is constant or when a value is
/// not finite.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<Correlation> {
    if x.len() != y.len() {
        warn!(
            "Cannot correlate samples of different lengths ({} and {})",
            x.len(),
            y.len()
        );
        return None;
    }
    let n = x.len();
    if n < 3 {
        return None;
    }
    let (mx, my) = (mean(x)?, mean(y)?);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 || !(sxy.is_finite() && sxx.is_finite() && syy.is_finite()) {
        return None;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);

    let df = (n - 2) as f64;
    let p_value = if r.abs() == 1.0 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        student_t_two_tailed(t, df)
    };
    Some(Correlation { r, p_value, n })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTest {
    pub t_statistic: f64,
    pub p_value: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub df: f64,
}

impl TTest {
    pub fn is_significant(&self, level: f64) -> bool {
        self.p_value < level
    }
}

/// Welch's two-sample t-test, not assuming equal variances.
///
/// Not computable when either group has fewer than two members, both are constant or a value is
/// not finite.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<TTest> {
    let (va, vb) = (sample_variance(a)?, sample_variance(b)?);
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (sa, sb) = (va / na, vb / nb);
    let standard_error_sq = sa + sb;
    if standard_error_sq == 0.0 {
        return None;
    }
    let t_statistic = (mean(a)? - mean(b)?) / standard_error_sq.sqrt();
    let df = standard_error_sq.powi(2) / (sa.powi(2) / (na - 1.0) + sb.powi(2) / (nb - 1.0));
    Some(TTest {
        t_statistic,
        p_value: student_t_two_tailed(t_statistic, df),
        df,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub label: String,
    pub n: usize,
    /// `None` for an empty group
    pub mean: Option<f64>,
}

/// Mean of `values` within each stratum, in label order.
pub fn group_means(values: &[f64], strata: &Strata) -> Vec<GroupMean> {
    strata
        .labels
        .iter()
        .enumerate()
        .map(|(bucket, label)| {
            let members = strata.members(bucket, values);
            GroupMean {
                label: label.clone(),
                n: members.len(),
                mean: mean(&members),
            }
        })
        .collect()
}

/// P(|T| >= |t|) for Student's t distribution with `df` degrees of freedom.
pub fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t))
}

/// I_x(a, b), evaluated by continued fraction on whichever side converges faster.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 300;
    const EPSILON: f64 = 3e-16;
    const TINY: f64 = 1e-300;

    let not_tiny = |v: f64| if v.abs() < TINY { TINY } else { v };

    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / not_tiny(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / not_tiny(1.0 + even * d);
        c = not_tiny(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / not_tiny(1.0 + odd * d);
        c = not_tiny(1.0 + odd / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Lanczos approximation (g = 7), with reflection below 0.5.
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = COEFFICIENTS[1..]
        .iter()
        .enumerate()
        .fold(COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + (i + 1) as f64));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stratify::{MedianSplit, Stratify};

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn descriptive_statistics() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(mean(&values), Some(2.5));
        assert_eq!(median(&values), Some(2.5));
        assert!(close(sample_variance(&values).unwrap(), 5.0 / 3.0, 1e-12));
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert!(close(quantile(&values, 1.0 / 3.0).unwrap(), 2.0, 1e-12));
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_variance(&[1.0]), None);
        assert_eq!(quantile(&values, 1.5), None);
    }

    #[test]
    fn ln_gamma_should_match_known_values() {
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-10));
        assert!(close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-10));
        assert!(close(ln_gamma(1.0), 0.0, 1e-10));
    }

    #[test]
    fn incomplete_beta_should_match_binomial_sum() {
        // I_0.4(2, 3) = P(Binomial(4, 0.4) >= 2)
        assert!(close(regularized_incomplete_beta(2.0, 3.0, 0.4), 0.5248, 1e-10));
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 1.0), 1.0);
    }

    #[test]
    fn t_distribution_should_match_closed_forms() {
        // Cauchy: P(|T| >= 1) = 0.5
        assert!(close(student_t_two_tailed(1.0, 1.0), 0.5, 1e-10));
        // df = 2: P(|T| >= t) = 1 - t / sqrt(2 + t^2)
        assert!(close(student_t_two_tailed(2.0, 2.0), 1.0 - 2.0 / 6f64.sqrt(), 1e-10));
        assert!(close(student_t_two_tailed(0.0, 5.0), 1.0, 1e-12));
        assert!(student_t_two_tailed(1.0, 0.0).is_nan());
    }

    #[test]
    fn pearson_should_match_reference() {
        let c = pearson(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 5.0, 4.0, 5.0]).unwrap();
        assert!(close(c.r, 0.774_596_669, 1e-6));
        assert!(close(c.p_value, 0.124_027, 1e-5));
        assert_eq!(c.n, 5);

        let negative = pearson(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.5]).unwrap();
        assert!(close(negative.r, -0.989_778, 1e-5));
        assert!(close(negative.p_value, 0.010_222, 1e-5));
    }

    #[test]
    fn perfect_correlation_should_have_zero_p_value() {
        let c = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!(close(c.r, 1.0, 1e-12));
        assert_eq!(c.p_value, 0.0);
    }

    #[test]
    fn pearson_should_not_be_computable_for_small_or_constant_samples() {
        assert_eq!(pearson(&[1.0, 2.0], &[3.0, 4.0]), None);
        assert_eq!(pearson(&[], &[]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[3.0, 4.0, 5.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 4.0]), None);
    }

    #[test]
    fn non_finite_values_should_make_statistics_unavailable() {
        assert_eq!(mean(&[1.0, f64::NAN]), None);
        assert_eq!(mean(&[1.0, f64::INFINITY]), None);
        assert_eq!(pearson(&[10.0, f64::NAN, 90.0, 100.0], &[50.0, 40.0, 10.0, 0.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, f64::INFINITY], &[3.0, 4.0, 5.0]), None);
        assert_eq!(welch_t_test(&[1.0, f64::NAN, 3.0], &[2.0, 4.0]), None);
    }

    #[test]
    fn welch_should_match_reference() {
        let test = welch_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
        assert!(close(test.t_statistic, -1.897_366_6, 1e-6));
        assert!(close(test.df, 5.882_352_9, 1e-6));
        assert!(close(test.p_value, 0.107_531, 1e-5));
        assert!(!test.is_significant(0.05));

        let gym = welch_t_test(&[0.6, 3.0, 3.2, 4.0, 4.6], &[9.2, 9.5, 11.5, 13.4, 15.3]).unwrap();
        assert!(close(gym.p_value, 0.000_480, 1e-5));
        assert!(gym.is_significant(0.05));
    }

    #[test]
    fn welch_should_not_be_computable_for_tiny_or_constant_groups() {
        assert_eq!(welch_t_test(&[1.0], &[2.0, 3.0]), None);
        assert_eq!(welch_t_test(&[], &[2.0, 3.0]), None);
        assert_eq!(welch_t_test(&[1.0, 1.0], &[2.0, 2.0]), None);
        // One constant group is fine
        assert!(welch_t_test(&[1.0, 1.0], &[2.0, 3.0]).is_some());
    }

    #[test]
    fn group_means_should_follow_strata() {
        let gym = [1.0, 2.0, 3.0, 4.0];
        let obesity = [10.0, 20.0, 30.0, 50.0];
        let strata = MedianSplit::default().stratify(&gym);
        let means = group_means(&obesity, &strata);
        assert_eq!(
            means,
            vec![
                GroupMean {
                    label: "Low (<=Median)".into(),
                    n: 2,
                    mean: Some(15.0)
                },
                GroupMean {
                    label: "High (>Median)".into(),
                    n: 2,
                    mean: Some(40.0)
                },
            ]
        );
    }
}
