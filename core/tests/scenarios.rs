/// End-to-end scenarios that each cross several modules (returns preparer,
/// GARCH engine, NF subsystem, NF-GARCH simulator, evaluation kernel, the
/// pipeline sweep). Unit tests inside each module already cover individual
/// properties; these exercise the composed contracts a caller actually
/// depends on.
use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_distr::{StandardNormal, StudentT};

use nfgarch_core::cancel::{CancellationToken, Deadline};
use nfgarch_core::config::RunConfig;
use nfgarch_core::error::CoreError;
use nfgarch_core::garch::{self, simulate::simulate_path, InnovationFamily, ModelSpec, Params, VarianceFamily};
use nfgarch_core::nf::{self, NfTrainConfig};
use nfgarch_core::nfgarch;
use nfgarch_core::returns::{chrono_split, to_returns, ReturnSeries};

fn dates_from(n: usize, start: (i32, u32, u32)) -> Vec<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
    (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect()
}

/// S1 — a constant price series has zero variance once differenced; the
/// GARCH engine must reject it with `Constraints` rather than hand the
/// optimizer a degenerate likelihood surface.
#[test]
fn s1_constant_series_is_rejected_with_constraints() {
    let prices = vec![100.0; 6];
    let dates = dates_from(6, (2020, 1, 1));
    let series = to_returns("FLAT", &dates, &prices).unwrap();
    assert!(series.returns.iter().all(|&r| r == 0.0));

    let token = CancellationToken::new();
    let spec = ModelSpec::new(VarianceFamily::SGarch, InnovationFamily::Normal);
    let err = garch::fit(&series.asset_id, spec, &series.returns, &token, None).unwrap_err();
    assert!(matches!(err, CoreError::Constraints(_)));
}

/// S2 — sGARCH-normal fit on a Gaussian series with known generating
/// process: stationarity holds by construction, AIC/BIC are finite, and the
/// standardized residuals show no remaining autocorrelation at the 1% level.
#[test]
fn s2_sgarch_normal_sanity_fit() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let returns: Vec<f64> = (0..2000).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect();

    let token = CancellationToken::new();
    let spec = ModelSpec::new(VarianceFamily::SGarch, InnovationFamily::Normal);
    let fit = garch::fit("SIM", spec, &returns, &token, None).unwrap();

    assert!(fit.params.satisfies_stationarity());
    assert!(fit.aic.is_finite());
    assert!(fit.bic.is_finite());

    let lb = nfgarch_core::eval::ljung_box(&fit.z, 10);
    assert!(lb.p_value > 0.01, "Ljung-Box p-value {} should exceed 0.01 on i.i.d. residuals", lb.p_value);
}

/// Builds a return series with the exact generating dynamics S3/S4 specify:
/// a fixed sGARCH(1,1) with (alpha=0.08, beta=0.9, omega=1e-6) driven by t5
/// innovations normalized to unit variance.
fn fixed_garch_student_t_series(n: usize, seed: u64) -> Vec<f64> {
    let omega = 1e-6;
    let alpha = 0.08;
    let beta = 0.9;
    let params = Params::SGarch { mu: 0.0, omega, alpha, beta };

    let nu = 5.0_f64;
    let scale = (nu / (nu - 2.0)).sqrt();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let dist = StudentT::new(nu).unwrap();
    let z: Vec<f64> = (0..n).map(|_| rng.sample(&dist) / scale).collect();

    let h0 = omega / (1.0 - alpha - beta);
    let path = simulate_path(VarianceFamily::SGarch, &params, h0, 0.0, &z);
    path.r
}

/// S3 — VaR backtest under Student-t innovations: at alpha=0.05 the
/// empirical violation rate stays close to the nominal rate and the Kupiec
/// unconditional-coverage test does not reject calibration.
#[test]
fn s3_var_backtest_on_student_t_innovations() {
    let returns = fixed_garch_student_t_series(4000, 7);
    let dates = dates_from(returns.len() + 1, (2010, 1, 1));
    let series = ReturnSeries { asset_id: "FIXED".to_string(), dates: dates[1..].to_vec(), returns };
    let (train, test) = chrono_split(&series, 0.65);

    let token = CancellationToken::new();
    let spec = ModelSpec::new(VarianceFamily::SGarch, InnovationFamily::StudentT);
    let fit = garch::fit(&series.asset_id, spec, train.returns, &token, None).unwrap();

    let h_t = *fit.h.last().unwrap();
    let eps_t = *fit.eps.last().unwrap();
    let h_forecast = garch::forecast::forecast_closed_form(&fit.params, h_t, eps_t, test.returns.len());

    let alpha = 0.05;
    let q_alpha = garch::innovation_quantile(alpha, &fit.innovation);
    let mu = fit.params.mu();
    let var_series: Vec<f64> = h_forecast.iter().map(|h| -(mu - h.sqrt() * q_alpha)).collect();

    let report = nfgarch_core::eval::var_backtest(test.returns, &var_series, alpha, 4);
    assert!(
        (0.02..=0.08).contains(&report.violation_rate),
        "violation rate {} outside tolerance band around nominal 0.05",
        report.violation_rate
    );
    assert!(report.kupiec.p_value > 0.01, "Kupiec p-value {} should not reject calibration", report.kupiec.p_value);
}

/// S4 — on the same heavy-tailed generating process as S3, an NF trained
/// on a Gaussian-GARCH fit's standardized residuals should reproduce the
/// held-out return distribution at least as well as the plain Gaussian
/// model's own simulated distribution (the NF's whole purpose is to absorb
/// the leptokurtosis the Normal innovation law cannot).
#[test]
fn s4_nf_garch_distributional_fit_improves_on_gaussian() {
    let returns = fixed_garch_student_t_series(3000, 11);
    let dates = dates_from(returns.len() + 1, (2011, 1, 1));
    let series = ReturnSeries { asset_id: "HEAVY".to_string(), dates: dates[1..].to_vec(), returns };
    let (train, test) = chrono_split(&series, 0.7);

    let token = CancellationToken::new();
    let spec = ModelSpec::new(VarianceFamily::SGarch, InnovationFamily::Normal);
    let fit = garch::fit(&series.asset_id, spec, train.returns, &token, None).unwrap();

    let train_config = NfTrainConfig { blocks: 5, hidden_dim: 16, lr: 0.01, max_epochs: 80, batch_size: 64, seed: 5, patience: 12 };
    let nf_fit = nfgarch::train(&fit, train_config, &token, None).unwrap();

    let horizon = test.returns.len();
    let replicates = 300;

    let mut nf_pool = Vec::with_capacity(horizon * replicates);
    for rep in 0..replicates {
        let path = nfgarch::simulate(&fit, &nf_fit, horizon, 1000 + rep as u64).unwrap();
        nf_pool.extend(path.r);
    }

    let h_t = *fit.h.last().unwrap();
    let eps_t = *fit.eps.last().unwrap();
    let mut gaussian_pool = Vec::with_capacity(horizon * replicates);
    for rep in 0..replicates {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2000 + rep as u64);
        let z: Vec<f64> = (0..horizon).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        let path = simulate_path(VarianceFamily::SGarch, &fit.params, h_t, eps_t, &z);
        gaussian_pool.extend(path.r);
    }

    let ks_nf = nfgarch_core::eval::two_sample_ks(&nf_pool, test.returns);
    let ks_gaussian = nfgarch_core::eval::two_sample_ks(&gaussian_pool, test.returns);

    assert!(
        ks_nf.statistic <= ks_gaussian.statistic + 1e-6,
        "NF-GARCH KS statistic {} should not exceed the plain Gaussian model's {}",
        ks_nf.statistic,
        ks_gaussian.statistic
    );
}

/// S5 — reproducibility: two pipeline runs with identical config and seeds
/// on the same input produce byte-identical output sheets.
#[test]
fn s5_identical_config_and_seed_reproduces_output() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    let returns: Vec<f64> = (0..500).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect();
    let dates = dates_from(returns.len() + 1, (2015, 1, 1));
    let series = ReturnSeries { asset_id: "REPRO".to_string(), dates: dates[1..].to_vec(), returns };

    let mut config = RunConfig::default();
    config.window = 150;
    config.step = 75;
    config.horizon = 10;
    config.mc_replicates = 50;
    config.sim_replicates = 20;
    config.nf.epochs = 10;
    config.nf.blocks = 2;
    config.nf.width = 8;
    config.nf.seed = 123;
    config.mc_seed = 1;
    config.sample_seed = 2;

    let token_a = CancellationToken::new();
    let report_a = nfgarch_core::pipeline::run_pipeline(std::slice::from_ref(&series), &config, &token_a, None).unwrap();

    let token_b = CancellationToken::new();
    let report_b = nfgarch_core::pipeline::run_pipeline(std::slice::from_ref(&series), &config, &token_b, None).unwrap();

    let dir_a = std::env::temp_dir().join(format!("nfgarch_scenario_s5_a_{}", std::process::id()));
    let dir_b = std::env::temp_dir().join(format!("nfgarch_scenario_s5_b_{}", std::process::id()));
    let paths_a = report_a.write_to_dir(&dir_a).unwrap();
    let paths_b = report_b.write_to_dir(&dir_b).unwrap();

    assert_eq!(paths_a.len(), paths_b.len());
    for (pa, pb) in paths_a.iter().zip(paths_b.iter()) {
        let hash_a = nfgarch_core::eval::report::hash_file(pa).unwrap();
        let hash_b = nfgarch_core::eval::report::hash_file(pb).unwrap();
        assert_eq!(hash_a, hash_b, "sheet {} differs between identically-configured runs", pa.display());
    }

    let _ = std::fs::remove_dir_all(&dir_a);
    let _ = std::fs::remove_dir_all(&dir_b);
}

/// S6 — cancellation/timeout: a run whose deadline has already elapsed
/// aborts with `CoreError::Timeout`, which the CLI maps to exit code 7,
/// rather than silently completing or panicking.
#[test]
fn s6_expired_deadline_aborts_with_timeout_exit_code_seven() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(5);
    let returns: Vec<f64> = (0..20_000).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect();
    let dates = dates_from(returns.len() + 1, (2000, 1, 1));
    let series = ReturnSeries { asset_id: "HUGE".to_string(), dates: dates[1..].to_vec(), returns };

    let config = RunConfig::default();
    let token = CancellationToken::new();
    let deadline = Deadline::from_secs(0.0);
    // Deadline is already expired at construction, so the first
    // cooperation point inside the per-spec sweep trips it.
    std::thread::sleep(std::time::Duration::from_millis(5));

    let err = nfgarch_core::pipeline::run_pipeline(&[series], &config, &token, Some(&deadline)).unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
    assert_eq!(err.exit_code(), 7);
}

/// S6b — a deadline that expires a few tens of milliseconds into a
/// large GARCH fit, not before the call even starts, still aborts with
/// `Timeout`: the optimizer's chunked cooperation points (between LBFGS
/// restarts) catch it even though no single chunk runs to MAX_ITERS.
#[test]
fn s6b_deadline_expiring_mid_fit_still_aborts_with_timeout() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let returns: Vec<f64> = (0..300_000).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect();

    let token = CancellationToken::new();
    let deadline = Deadline::from_secs(0.02);
    let spec = ModelSpec::new(VarianceFamily::SGarch, InnovationFamily::Normal);

    let err = garch::fit("MIDFIT", spec, &returns, &token, Some(&deadline)).unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
}

/// S6c — same contract for the Monte Carlo variance forecast: a deadline
/// expiring partway through a multi-million-replicate sweep aborts rather
/// than running to completion, since the cooperation point sits between
/// replicates rather than only before/after the whole sweep.
#[test]
fn s6c_deadline_expiring_mid_monte_carlo_still_aborts_with_timeout() {
    let params = Params::TGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, eta: 0.1, beta: 0.85, tau: 0.0 };
    let token = CancellationToken::new();
    let deadline = Deadline::from_secs(0.02);

    let err = garch::forecast::forecast_monte_carlo(VarianceFamily::TGarch, &params, 2e-6, 0.001, 5, 5_000_000, 99, &token, Some(&deadline))
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
}

/// A bare training-loop divergence contract check: NF training over a
/// pathologically short, degenerate series is rejected rather than handed
/// back a model trained on too little signal.
#[test]
fn nf_training_rejects_too_short_a_series() {
    let z = vec![0.1, -0.2, 0.05];
    let token = CancellationToken::new();
    let config = NfTrainConfig::default();
    let err = nf::fit(&z, config, &token, None).unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}
