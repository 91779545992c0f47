/// eval/distance.rs — distributional distances between two samples
///
/// Kolmogorov-Smirnov two-sample statistic with an asymptotic p-value (the
/// Kolmogorov distribution), falling back to a permutation test when either
/// sample has fewer than 30 points (the asymptotic approximation is
/// unreliable there). 1-Wasserstein distance on sorted order statistics,
/// computed by interpolating both samples onto a common grid of quantiles.
use crate::numerics::sorted;

#[derive(Debug, Clone, Copy)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// The two-sample empirical CDF sup-distance.
pub fn ks_statistic(a_sorted: &[f64], b_sorted: &[f64]) -> f64 {
    let (n, m) = (a_sorted.len(), b_sorted.len());
    if n == 0 || m == 0 {
        return f64::NAN;
    }
    let mut merged: Vec<f64> = a_sorted.iter().chain(b_sorted.iter()).copied().collect();
    merged.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

    let mut max_diff = 0.0_f64;
    for x in merged {
        let fa = a_sorted.partition_point(|&v| v <= x) as f64 / n as f64;
        let fb = b_sorted.partition_point(|&v| v <= x) as f64 / m as f64;
        max_diff = max_diff.max((fa - fb).abs());
    }
    max_diff
}

/// Kolmogorov asymptotic CDF Q(λ) = 1 - 2·Σ_{k=1}^∞ (-1)^{k-1}·e^{-2k²λ²}.
fn kolmogorov_cdf(lambda: f64) -> f64 {
    if lambda < 1e-6 {
        return 0.0;
    }
    let mut sum = 0.0;
    for k in 1..100 {
        let term = (-1.0_f64).powi(k - 1) * (-2.0 * (k as f64).powi(2) * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
    }
    (1.0 - 2.0 * sum).clamp(0.0, 1.0)
}

fn permutation_p_value(a: &[f64], b: &[f64], observed: f64, permutations: usize, seed: u64) -> f64 {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let (n, m) = (a.len(), b.len());
    let mut pooled: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let mut exceed = 0usize;

    for _ in 0..permutations {
        pooled.shuffle(&mut rng);
        let a_perm = sorted(&pooled[..n]);
        let b_perm = sorted(&pooled[n..n + m]);
        let stat = ks_statistic(&a_perm, &b_perm);
        if stat >= observed {
            exceed += 1;
        }
    }
    (exceed as f64 + 1.0) / (permutations as f64 + 1.0)
}

/// `samples_a`/`samples_b` need not be pre-sorted.
pub fn two_sample_ks(samples_a: &[f64], samples_b: &[f64]) -> KsResult {
    let a_sorted = sorted(samples_a);
    let b_sorted = sorted(samples_b);
    let statistic = ks_statistic(&a_sorted, &b_sorted);
    if !statistic.is_finite() {
        return KsResult { statistic, p_value: f64::NAN };
    }

    let (n, m) = (a_sorted.len(), b_sorted.len());
    let p_value = if n < 30 || m < 30 {
        permutation_p_value(&a_sorted, &b_sorted, statistic, 2000, 1234)
    } else {
        let ne = (n * m) as f64 / (n + m) as f64;
        let lambda = (ne.sqrt() + 0.12 + 0.11 / ne.sqrt()) * statistic;
        1.0 - kolmogorov_cdf(lambda)
    };

    KsResult { statistic, p_value }
}

/// 1-Wasserstein distance: ∫|F_A⁻¹(q) − F_B⁻¹(q)|dq, approximated on a
/// fine grid of quantiles shared by both samples' order statistics.
pub fn wasserstein_distance(samples_a: &[f64], samples_b: &[f64]) -> f64 {
    let a_sorted = sorted(samples_a);
    let b_sorted = sorted(samples_b);
    if a_sorted.is_empty() || b_sorted.is_empty() {
        return f64::NAN;
    }
    let grid_n = 1000;
    let mut acc = 0.0;
    for i in 0..grid_n {
        let q = (i as f64 + 0.5) / grid_n as f64;
        let qa = crate::numerics::quantile_sorted(&a_sorted, q);
        let qb = crate::numerics::quantile_sorted(&b_sorted, q);
        acc += (qa - qb).abs();
    }
    acc / grid_n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ks_statistic_is_zero_for_identical_samples() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let s = ks_statistic(&sorted(&a), &sorted(&a));
        assert!(s.abs() < 1e-12);
    }

    #[test]
    fn ks_p_value_is_small_for_clearly_different_samples() {
        let a: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..200).map(|i| i as f64 + 1000.0).collect();
        let result = two_sample_ks(&a, &b);
        assert!(result.statistic > 0.9);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn wasserstein_distance_is_zero_for_identical_samples() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let d = wasserstein_distance(&a, &a);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn wasserstein_distance_matches_constant_shift() {
        let a: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|x| x + 3.0).collect();
        let d = wasserstein_distance(&a, &b);
        assert!((d - 3.0).abs() < 0.1, "d={d}");
    }
}
