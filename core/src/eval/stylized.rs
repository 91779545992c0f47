/// eval/stylized.rs — stylized-fact metrics
///
/// Sample moments (mean, variance, skewness, excess kurtosis); ACF of r,
/// |r|, r² at lags 1..20; a Hill tail-index estimate with k = ⌈T^0.3⌉.
use crate::numerics::{acf, excess_kurtosis, mean, skewness, sorted, variance};

#[derive(Debug, Clone)]
pub struct StylizedFacts {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    pub acf_r: Vec<f64>,
    pub acf_abs_r: Vec<f64>,
    pub acf_r2: Vec<f64>,
    pub hill_tail_index: f64,
}

const ACF_LAGS: usize = 20;

pub fn stylized_facts(r: &[f64]) -> StylizedFacts {
    let abs_r: Vec<f64> = r.iter().map(|x| x.abs()).collect();
    let r2: Vec<f64> = r.iter().map(|x| x * x).collect();

    let lags: Vec<usize> = (1..=ACF_LAGS).collect();
    StylizedFacts {
        mean: mean(r),
        variance: variance(r),
        skewness: skewness(r),
        excess_kurtosis: excess_kurtosis(r),
        acf_r: lags.iter().map(|&l| acf(r, l)).collect(),
        acf_abs_r: lags.iter().map(|&l| acf(&abs_r, l)).collect(),
        acf_r2: lags.iter().map(|&l| acf(&r2, l)).collect(),
        hill_tail_index: hill_estimator(r),
    }
}

/// Hill (1975) tail-index estimator over the upper tail of |r|, using
/// k = ⌈T^0.3⌉ order statistics.
pub fn hill_estimator(r: &[f64]) -> f64 {
    let t = r.len();
    if t < 10 {
        return f64::NAN;
    }
    let abs_sorted = sorted(&r.iter().map(|x| x.abs()).collect::<Vec<_>>());
    let k = (t as f64).powf(0.3).ceil() as usize;
    let k = k.clamp(2, t - 1);

    // Largest k order statistics: abs_sorted[t-k..t], threshold is the
    // (k+1)-th largest value abs_sorted[t-k-1].
    let threshold = abs_sorted[t - k - 1].max(1e-300);
    let tail = &abs_sorted[t - k..t];
    let sum_log_ratio: f64 = tail.iter().map(|&x| (x.max(1e-300) / threshold).ln()).sum();
    if sum_log_ratio <= 0.0 {
        return f64::NAN;
    }
    k as f64 / sum_log_ratio
}

pub fn information_criteria(log_likelihood: f64, k: usize, t: usize) -> (f64, f64) {
    let kf = k as f64;
    let tf = t as f64;
    let aic = 2.0 * kf - 2.0 * log_likelihood;
    let bic = kf * tf.ln() - 2.0 * log_likelihood;
    (aic, bic)
}

pub fn mean_squared_error(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.len() != predicted.len() || observed.is_empty() {
        return f64::NAN;
    }
    observed.iter().zip(predicted.iter()).map(|(o, p)| (o - p).powi(2)).sum::<f64>() / observed.len() as f64
}

pub fn mean_absolute_error(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.len() != predicted.len() || observed.is_empty() {
        return f64::NAN;
    }
    observed.iter().zip(predicted.iter()).map(|(o, p)| (o - p).abs()).sum::<f64>() / observed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylized_facts_reports_full_acf_lag_range() {
        let r: Vec<f64> = (0..500).map(|i| 0.01 * ((i as f64) * 0.05).sin()).collect();
        let facts = stylized_facts(&r);
        assert_eq!(facts.acf_r.len(), 20);
        assert_eq!(facts.acf_abs_r.len(), 20);
        assert_eq!(facts.acf_r2.len(), 20);
    }

    #[test]
    fn hill_estimator_is_positive_on_heavy_tailed_data() {
        use rand::{Rng, SeedableRng};
        use rand_distr::Pareto;
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let r: Vec<f64> = (0..2000).map(|_| rng.sample::<f64, _>(Pareto::new(1.0, 3.0).unwrap())).collect();
        let tail_index = hill_estimator(&r);
        assert!(tail_index.is_finite() && tail_index > 0.0);
    }

    #[test]
    fn information_criteria_match_closed_form() {
        let (aic, bic) = information_criteria(-100.0, 4, 500);
        assert!((aic - (8.0 + 200.0)).abs() < 1e-9);
        assert!((bic - (4.0 * (500f64).ln() + 200.0)).abs() < 1e-9);
    }
}
