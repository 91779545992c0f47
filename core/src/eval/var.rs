/// eval/var.rs — VaR violation counting and backtests
///
/// violations v[t] = 𝟙[r_test[t] < −VaR_series[t]]; N = Σv[t], T = |r_test|.
///
///   Kupiec LR_uc = −2·(ln((1−α)^(T−N)·α^N) − ln((1−N/T)^(T−N)·(N/T)^N))
///   Christoffersen LR_ind from the 2×2 transition matrix of (v[t−1], v[t])
///   Dynamic Quantile: regress v[t]−α on lagged v and lagged VaR; Wald stat
///
/// All three compare to χ²(1) (DQ uses χ² with df = number of regressors).
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::diagnostics::TestResult;

#[derive(Debug, Clone)]
pub struct VarBacktestReport {
    pub alpha: f64,
    pub total_obs: usize,
    pub violations: usize,
    pub violation_rate: f64,
    pub kupiec: TestResult,
    pub christoffersen: TestResult,
    pub dq: TestResult,
}

fn chi_squared_p_value(statistic: f64, df: f64) -> f64 {
    if !statistic.is_finite() || statistic < 0.0 {
        return f64::NAN;
    }
    match ChiSquared::new(df) {
        Ok(dist) => 1.0 - dist.cdf(statistic),
        Err(_) => f64::NAN,
    }
}

pub fn violations(r_test: &[f64], var_series: &[f64]) -> Vec<bool> {
    r_test.iter().zip(var_series.iter()).map(|(&r, &v)| r < -v).collect()
}

fn kupiec(v: &[bool], alpha: f64) -> TestResult {
    let t = v.len() as f64;
    let n = v.iter().filter(|&&x| x).count() as f64;
    if t == 0.0 {
        return TestResult { statistic: f64::NAN, p_value: f64::NAN };
    }
    let pi_hat = (n / t).clamp(1e-12, 1.0 - 1e-12);
    let alpha_c = alpha.clamp(1e-12, 1.0 - 1e-12);

    let ln_null = (t - n) * (1.0 - alpha_c).ln() + n * alpha_c.ln();
    let ln_alt = (t - n) * (1.0 - pi_hat).ln() + n * pi_hat.ln();
    let lr = -2.0 * (ln_null - ln_alt);
    TestResult { statistic: lr, p_value: chi_squared_p_value(lr, 1.0) }
}

fn christoffersen(v: &[bool]) -> TestResult {
    if v.len() < 2 {
        return TestResult { statistic: f64::NAN, p_value: f64::NAN };
    }
    let (mut n00, mut n01, mut n10, mut n11) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for w in v.windows(2) {
        match (w[0], w[1]) {
            (false, false) => n00 += 1.0,
            (false, true) => n01 += 1.0,
            (true, false) => n10 += 1.0,
            (true, true) => n11 += 1.0,
        }
    }
    let pi01 = n01 / (n00 + n01).max(1e-12);
    let pi11 = n11 / (n10 + n11).max(1e-12);
    let pi = (n01 + n11) / (n00 + n01 + n10 + n11).max(1e-12);

    let log_lik = |n: f64, p: f64| -> f64 {
        if n <= 0.0 {
            0.0
        } else {
            n * p.clamp(1e-12, 1.0 - 1e-12).ln()
        }
    };

    let ln_restricted = log_lik(n00 + n10, 1.0 - pi) + log_lik(n01 + n11, pi);
    let ln_unrestricted = log_lik(n00, 1.0 - pi01) + log_lik(n01, pi01) + log_lik(n10, 1.0 - pi11) + log_lik(n11, pi11);
    let lr = -2.0 * (ln_restricted - ln_unrestricted);
    TestResult { statistic: lr, p_value: chi_squared_p_value(lr, 1.0) }
}

/// Dynamic Quantile test (Engle & Manganelli 2004), simplified to a Wald
/// statistic on an OLS regression of `v[t] - alpha` on an intercept, `q`
/// lags of `v`, and the contemporaneous VaR level.
fn dynamic_quantile(v: &[bool], var_series: &[f64], alpha: f64, lags: usize) -> TestResult {
    let t = v.len();
    if t <= lags + 2 {
        return TestResult { statistic: f64::NAN, p_value: f64::NAN };
    }
    let hit: Vec<f64> = v.iter().map(|&b| if b { 1.0 - alpha } else { -alpha }).collect();
    let n = t - lags;
    let k = 2 + lags; // intercept + VaR + `lags` hit-lags

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(n);
    let mut y: Vec<f64> = Vec::with_capacity(n);
    for i in lags..t {
        let mut row = vec![1.0, var_series[i]];
        for l in 1..=lags {
            row.push(hit[i - l]);
        }
        rows.push(row);
        y.push(hit[i]);
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in rows.iter().zip(y.iter()) {
        for a in 0..k {
            xty[a] += row[a] * yi;
            for b in 0..k {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }

    let beta = match solve_linear_system(&xtx, &xty) {
        Some(b) => b,
        None => return TestResult { statistic: f64::NAN, p_value: f64::NAN },
    };

    let mut ss_res = 0.0;
    for (row, &yi) in rows.iter().zip(y.iter()) {
        let pred: f64 = row.iter().zip(beta.iter()).map(|(x, b)| x * b).sum();
        ss_res += (yi - pred).powi(2);
    }
    let sigma2 = ss_res / n as f64;
    let variance_term = alpha * (1.0 - alpha);
    let wald = if sigma2 > 1e-300 {
        beta.iter().map(|b| b * b).sum::<f64>() * n as f64 * variance_term / sigma2.max(1e-300)
    } else {
        f64::NAN
    };
    TestResult { statistic: wald, p_value: chi_squared_p_value(wald, k as f64) }
}

fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut m: Vec<Vec<f64>> = a.to_vec();
    let mut rhs = b.to_vec();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| m[i][col].abs().partial_cmp(&m[j][col].abs()).unwrap())?;
        if m[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);
        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - sum) / m[i][i];
    }
    Some(x)
}

/// Runs the full VaR backtest suite for a single α level. `lags`
/// controls the Dynamic Quantile regression's lag depth.
pub fn var_backtest(r_test: &[f64], var_series: &[f64], alpha: f64, dq_lags: usize) -> VarBacktestReport {
    let v = violations(r_test, var_series);
    let total_obs = v.len();
    let n = v.iter().filter(|&&x| x).count();
    let violation_rate = if total_obs > 0 { n as f64 / total_obs as f64 } else { f64::NAN };

    VarBacktestReport {
        alpha,
        total_obs,
        violations: n,
        violation_rate,
        kupiec: kupiec(&v, alpha),
        christoffersen: christoffersen(&v),
        dq: dynamic_quantile(&v, var_series, alpha, dq_lags),
    }
}
