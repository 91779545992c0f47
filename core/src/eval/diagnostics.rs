/// eval/diagnostics.rs — residual diagnostics
///
/// Ljung-Box on z and z² at lag 10; ARCH-LM at lag 10. Both reduce to a
/// chi-squared statistic via `statrs`.
use statrs::distribution::{ChiSquared, ContinuousCDF};

#[derive(Debug, Clone, Copy)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
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

/// Ljung-Box Q statistic at `lags`: Q = T(T+2)·Σ_{k=1}^{lags} ρ_k²/(T−k).
/// Compared against χ²(lags).
pub fn ljung_box(x: &[f64], lags: usize) -> TestResult {
    let t = x.len();
    if t <= lags + 1 {
        return TestResult { statistic: f64::NAN, p_value: f64::NAN };
    }
    let tf = t as f64;
    let mut q = 0.0;
    for k in 1..=lags {
        let rho = crate::numerics::acf(x, k);
        q += rho * rho / (tf - k as f64);
    }
    q *= tf * (tf + 2.0);
    TestResult { statistic: q, p_value: chi_squared_p_value(q, lags as f64) }
}

/// ARCH-LM test at `lags`: regress squared residuals on `lags` of their own
/// past values; the LM statistic is T·R² from that auxiliary regression,
/// compared against χ²(lags).
pub fn arch_lm(eps: &[f64], lags: usize) -> TestResult {
    let t = eps.len();
    if t <= lags + 1 {
        return TestResult { statistic: f64::NAN, p_value: f64::NAN };
    }
    let sq: Vec<f64> = eps.iter().map(|e| e * e).collect();
    let n = t - lags;

    // Design matrix: column 0 is the intercept, columns 1..=lags are
    // lagged squared residuals. Solved via normal equations.
    let mut xtx = vec![vec![0.0; lags + 1]; lags + 1];
    let mut xty = vec![0.0; lags + 1];
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(n);
    let mut y: Vec<f64> = Vec::with_capacity(n);

    for i in lags..t {
        let mut row = vec![1.0];
        for l in 1..=lags {
            row.push(sq[i - l]);
        }
        y.push(sq[i]);
        rows.push(row);
    }

    for (row, &yi) in rows.iter().zip(y.iter()) {
        for a in 0..=lags {
            xty[a] += row[a] * yi;
            for b in 0..=lags {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }

    let beta = match solve_linear_system(&xtx, &xty) {
        Some(b) => b,
        None => return TestResult { statistic: f64::NAN, p_value: f64::NAN },
    };

    let y_mean = crate::numerics::mean(&y);
    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for (row, &yi) in rows.iter().zip(y.iter()) {
        let pred: f64 = row.iter().zip(beta.iter()).map(|(x, b)| x * b).sum();
        ss_res += (yi - pred).powi(2);
        ss_tot += (yi - y_mean).powi(2);
    }
    let r2 = if ss_tot > 1e-300 { 1.0 - ss_res / ss_tot } else { 0.0 };
    let lm = n as f64 * r2;
    TestResult { statistic: lm, p_value: chi_squared_p_value(lm, lags as f64) }
}

/// Gaussian elimination with partial pivoting; returns `None` on a
/// (near-)singular design matrix rather than propagating garbage.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut m: Vec<Vec<f64>> = a.iter().cloned().collect();
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
