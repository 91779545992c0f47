/// pipeline.rs — the (asset × spec) sweep that produces the five output
/// sheets (§4.6, §6)
///
/// For every asset and every `ModelSpec` in the grid (4 variance families ×
/// 3 innovation families), this module:
///
///   1. splits the asset's returns (chronological by default, §4.1);
///   2. fits the manual GARCH engine on the training slice;
///   3. forecasts the conditional variance over the test horizon and scores
///      it against the held-out returns (Model_Performance_Summary);
///   4. backtests a parametric VaR series against the test returns at each
///      configured α (VaR_Performance_Summary);
///   5. trains a normalizing flow on the fit's standardized residuals and
///      repeats steps 3-4 for the resulting NF-GARCH composition;
///   6. compares simulated return distributions against the held-out
///      returns via KS/Wasserstein (Distributional_Fit_Summary);
///   7. re-fits the spec across a rolling-window sweep of the full series
///      to score stability (Stress_Test_Summary).
///
/// A failed GARCH fit or diverged NF training is recorded and the spec is
/// skipped, never aborting the run (§7's "degrade gracefully" policy) — the
/// exceptions are `Cancelled`/`Timeout`, which abort the whole run so the
/// caller can report the partial manifest named in §5/§6.
use rayon::prelude::*;

use crate::cancel::{CancellationToken, Deadline};
use crate::config::RunConfig;
use crate::error::{CoreError, CoreResult};
use crate::eval::report::{DistributionalFitRow, ModelPerformanceRow, NfWinnersRow, StressTestRow, VarPerformanceRow};
use crate::eval::{self, EvalReport};
use crate::garch::{self, GarchFit, InnovationFamily, ModelSpec, VarianceFamily};
use crate::nf::NfTrainConfig;
use crate::nfgarch::{self, NfGarchFit};
use crate::returns::ReturnSeries;

const DQ_LAGS: usize = 4;
const DIAGNOSTIC_LAGS: usize = 10;
const DIST_QUANTILE_SAMPLE: usize = 5000;

/// The full (variance × innovation) grid this engine supports, §4.2.
pub fn model_grid(config: &RunConfig) -> Vec<ModelSpec> {
    let variances = [VarianceFamily::SGarch, VarianceFamily::EGarch, VarianceFamily::GjrGarch, VarianceFamily::TGarch];
    let innovations = [InnovationFamily::Normal, InnovationFamily::StudentT, InnovationFamily::SkewStudentT];
    let mut grid = Vec::with_capacity(variances.len() * innovations.len());
    for &v in &variances {
        for &i in &innovations {
            let mut spec = ModelSpec::new(v, i);
            if v == VarianceFamily::TGarch {
                spec = spec.with_tgarch_threshold(config.tgarch_threshold);
            }
            grid.push(spec);
        }
    }
    grid
}

fn model_label(spec: &ModelSpec) -> String {
    format!("{}_{}", spec.variance.as_str(), spec.innovation.as_str())
}

fn forecast_variance(
    fit: &GarchFit,
    horizon: usize,
    config: &RunConfig,
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<Vec<f64>> {
    let h_t = *fit.h.last().expect("GarchFit.h is never empty");
    let eps_t = *fit.eps.last().expect("GarchFit.eps is never empty");
    match fit.spec.variance {
        VarianceFamily::SGarch | VarianceFamily::GjrGarch => Ok(garch::forecast::forecast_closed_form(&fit.params, h_t, eps_t, horizon)),
        VarianceFamily::EGarch | VarianceFamily::TGarch => garch::forecast::forecast_monte_carlo(
            fit.spec.variance,
            &fit.params,
            h_t,
            eps_t,
            horizon,
            config.mc_replicates,
            config.mc_seed,
            token,
            deadline,
        ),
    }
}

/// VaR_α(t+1) = -(μ̂ − √ĥ[t+1]·Q_α) — the same sign convention
/// `nfgarch::simulate_aggregate` uses for the NF-sourced quantile, applied
/// here to the manual engine's own parametric innovation quantile.
fn var_series(mu: f64, h_forecast: &[f64], q_alpha: f64) -> Vec<f64> {
    h_forecast.iter().map(|h| -(mu - h.sqrt() * q_alpha)).collect()
}

struct SpecRunResult {
    model_performance: Option<ModelPerformanceRow>,
    var_performance: Vec<VarPerformanceRow>,
    distributional_fit: Option<DistributionalFitRow>,
}

fn pool_simulated_returns(
    garch_fit: &GarchFit,
    nf_fit: &NfGarchFit,
    horizon: usize,
    replicates: usize,
    base_seed: u64,
) -> CoreResult<Vec<f64>> {
    let mut pooled = Vec::with_capacity(horizon * replicates);
    for rep in 0..replicates {
        let path = nfgarch::simulate(garch_fit, nf_fit, horizon, base_seed.wrapping_add(rep as u64 * 7919))?;
        pooled.extend(path.r);
    }
    Ok(pooled)
}

fn run_manual(
    asset: &ReturnSeries,
    spec: ModelSpec,
    train: &[f64],
    test: &[f64],
    config: &RunConfig,
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<(GarchFit, SpecRunResult)> {
    let fit = garch::fit(&asset.asset_id, spec, train, token, deadline)?;

    let h_forecast = forecast_variance(&fit, test.len(), config, token, deadline)?;
    let mu = fit.params.mu();
    let r2_test: Vec<f64> = test.iter().map(|r| r * r).collect();
    let avg_mse = eval::stylized::mean_squared_error(&r2_test, &h_forecast);
    let avg_mae = eval::stylized::mean_absolute_error(&r2_test, &h_forecast);

    let model = model_label(&spec);
    let mut var_performance = Vec::with_capacity(config.var_levels.len());
    for &alpha in &config.var_levels {
        let q_alpha = garch::innovation_quantile(alpha, &fit.innovation);
        let var = var_series(mu, &h_forecast, q_alpha);
        let report = eval::var_backtest(test, &var, alpha, DQ_LAGS);
        var_performance.push(VarPerformanceRow {
            model: model.clone(),
            asset: asset.asset_id.clone(),
            confidence_level: 1.0 - alpha,
            total_obs: report.total_obs,
            expected_rate: alpha,
            violations: report.violations,
            violation_rate: report.violation_rate,
            kupiec_p_value: report.kupiec.p_value,
            christoffersen_p_value: report.christoffersen.p_value,
            dq_p_value: report.dq.p_value,
        });
    }

    let sim_horizon = test.len().max(1);
    let mc_returns: Vec<f64> = {
        let q = |a: f64| garch::innovation_quantile(a, &fit.innovation);
        // A light-weight pseudo-sample of the innovation law via its own
        // quantile function on a regular probability grid, used only to
        // compare against held-out returns distributionally (no RNG
        // stream is spent on the manual engine's own innovation law).
        let grid_n = config.sim_replicates.max(1) * sim_horizon;
        (1..=grid_n)
            .map(|i| {
                let p = i as f64 / (grid_n as f64 + 1.0);
                mu + h_forecast[(i - 1) % sim_horizon].sqrt() * q(p)
            })
            .collect()
    };
    let ks = eval::two_sample_ks(&mc_returns, test);
    let wasserstein = eval::wasserstein_distance(&mc_returns, test);
    let distributional_fit = Some(DistributionalFitRow::new(&model, &asset.asset_id, ks.statistic, ks.p_value, wasserstein, "manual"));

    let model_performance = Some(ModelPerformanceRow::new(&model, "manual", fit.aic, fit.bic, fit.log_likelihood, avg_mse, avg_mae));

    Ok((fit, SpecRunResult { model_performance, var_performance, distributional_fit }))
}

fn run_nf_garch(
    asset: &ReturnSeries,
    fit: &GarchFit,
    test: &[f64],
    config: &RunConfig,
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<SpecRunResult> {
    let train_config = NfTrainConfig {
        blocks: config.nf.blocks,
        hidden_dim: config.nf.width,
        lr: config.nf.lr,
        max_epochs: config.nf.epochs,
        batch_size: 64,
        seed: config.nf.seed,
        patience: 10,
    };
    let nf_fit = nfgarch::train(fit, train_config, token, deadline)?;

    let h_forecast = forecast_variance(fit, test.len(), config, token, deadline)?;
    let mu = fit.params.mu();

    let model = format!("{}_NF", model_label(&fit.spec));
    let mut var_performance = Vec::with_capacity(config.var_levels.len());
    for &alpha in &config.var_levels {
        let q_alpha = crate::nf::sample::quantile(&nf_fit.nf, alpha, DIST_QUANTILE_SAMPLE, config.sample_seed.wrapping_add(alpha.to_bits()));
        let var = var_series(mu, &h_forecast, q_alpha);
        let report = eval::var_backtest(test, &var, alpha, DQ_LAGS);
        var_performance.push(VarPerformanceRow {
            model: model.clone(),
            asset: asset.asset_id.clone(),
            confidence_level: 1.0 - alpha,
            total_obs: report.total_obs,
            expected_rate: alpha,
            violations: report.violations,
            violation_rate: report.violation_rate,
            kupiec_p_value: report.kupiec.p_value,
            christoffersen_p_value: report.christoffersen.p_value,
            dq_p_value: report.dq.p_value,
        });
    }

    let sim_horizon = test.len().max(1);
    let pooled = pool_simulated_returns(fit, &nf_fit, sim_horizon, config.sim_replicates.max(1), config.sample_seed)?;
    let ks = eval::two_sample_ks(&pooled, test);
    let wasserstein = eval::wasserstein_distance(&pooled, test);
    let distributional_fit = Some(DistributionalFitRow::new(&model, &asset.asset_id, ks.statistic, ks.p_value, wasserstein, "nf-garch"));

    let r2_test: Vec<f64> = test.iter().map(|r| r * r).collect();
    let avg_mse = eval::stylized::mean_squared_error(&r2_test, &h_forecast);
    let avg_mae = eval::stylized::mean_absolute_error(&r2_test, &h_forecast);
    // The NF swaps only the innovation law; the conditional-mean/variance
    // likelihood is inherited unchanged from the parent GARCH fit.
    let model_performance = Some(ModelPerformanceRow::new(&model, "nf-garch", fit.aic, fit.bic, fit.log_likelihood, avg_mse, avg_mae));

    Ok(SpecRunResult { model_performance, var_performance, distributional_fit })
}

fn run_stress_test(asset: &ReturnSeries, spec: ModelSpec, config: &RunConfig, token: &CancellationToken, deadline: Option<&Deadline>) -> CoreResult<StressTestRow> {
    let windows = crate::returns::ts_cv_windows(asset, config.window, config.step, config.horizon);
    let model = model_label(&spec);
    if windows.is_empty() {
        return Ok(StressTestRow {
            model,
            asset: asset.asset_id.clone(),
            scenario_type: "rolling_window".to_string(),
            scenario_name: format!("W{}_S{}_H{}", config.window, config.step, config.horizon),
            convergence_rate: 0.0,
            pass_lb_test: false,
            pass_arch_test: false,
            total_tests: 0,
            robustness_score: 0.0,
        });
    }

    let mut converged = 0usize;
    let mut pass_lb = 0usize;
    let mut pass_arch = 0usize;
    let total = windows.len();

    for w in &windows {
        crate::cancel::check(token, deadline)?;
        if crate::returns::is_degenerate_slice(w.train.returns) {
            continue;
        }
        match garch::fit(&asset.asset_id, spec, w.train.returns, token, deadline) {
            Ok(fit) => {
                converged += 1;
                let lb = eval::ljung_box(&fit.z, DIAGNOSTIC_LAGS);
                if lb.p_value.is_finite() && lb.p_value > 0.05 {
                    pass_lb += 1;
                }
                let arch = eval::arch_lm(&fit.eps, DIAGNOSTIC_LAGS);
                if arch.p_value.is_finite() && arch.p_value > 0.05 {
                    pass_arch += 1;
                }
            }
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(CoreError::Timeout { elapsed_secs }) => return Err(CoreError::Timeout { elapsed_secs }),
            Err(e) => {
                tracing::warn!(asset = %asset.asset_id, model = %model, error = %e, "stress-test window failed to converge");
            }
        }
    }

    let convergence_rate = converged as f64 / total as f64;
    let lb_rate = pass_lb as f64 / total as f64;
    let arch_rate = pass_arch as f64 / total as f64;

    Ok(StressTestRow {
        model,
        asset: asset.asset_id.clone(),
        scenario_type: "rolling_window".to_string(),
        scenario_name: format!("W{}_S{}_H{}", config.window, config.step, config.horizon),
        convergence_rate,
        pass_lb_test: lb_rate > 0.5,
        pass_arch_test: arch_rate > 0.5,
        total_tests: total,
        robustness_score: (convergence_rate + lb_rate + arch_rate) / 3.0,
    })
}

/// Everything produced for a single asset across the full model grid.
#[derive(Default)]
pub struct AssetRunOutput {
    pub model_performance: Vec<ModelPerformanceRow>,
    pub var_performance: Vec<VarPerformanceRow>,
    pub distributional_fit: Vec<DistributionalFitRow>,
    pub nf_winners: Vec<NfWinnersRow>,
    pub stress_test: Vec<StressTestRow>,
}

/// Runs the full model grid for one asset. Ordinary fit/training failures
/// are logged and skipped (§7); `Cancelled`/`Timeout` abort and propagate.
pub fn run_asset(asset: &ReturnSeries, config: &RunConfig, token: &CancellationToken, deadline: Option<&Deadline>) -> CoreResult<AssetRunOutput> {
    let mut out = AssetRunOutput::default();
    let (train, test) = crate::returns::chrono_split(asset, config.chrono_ratio);

    if crate::returns::is_degenerate_slice(train.returns) {
        tracing::warn!(asset = %asset.asset_id, "training slice is degenerate (near-zero variance); skipping asset");
        return Ok(out);
    }

    let mut best_ks: Option<(String, f64)> = None;

    for spec in model_grid(config) {
        crate::cancel::check(token, deadline)?;
        let model = model_label(&spec);

        let fit = match run_manual(asset, spec, train.returns, test.returns, config, token, deadline) {
            Ok((fit, result)) => {
                if let Some(row) = result.model_performance {
                    out.model_performance.push(row);
                }
                out.var_performance.extend(result.var_performance);
                if let Some(row) = result.distributional_fit {
                    if row.ks_statistic.is_finite() {
                        let better = best_ks.as_ref().map(|(_, s)| row.ks_statistic < *s).unwrap_or(true);
                        if better {
                            best_ks = Some((row.model.clone(), row.ks_statistic));
                        }
                    }
                    out.distributional_fit.push(row);
                }
                fit
            }
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(CoreError::Timeout { elapsed_secs }) => return Err(CoreError::Timeout { elapsed_secs }),
            Err(e) => {
                tracing::warn!(asset = %asset.asset_id, model = %model, error = %e, "GARCH fit failed; recording and skipping");
                out.model_performance.push(ModelPerformanceRow::new(&model, "manual", f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN));
                continue;
            }
        };

        match run_nf_garch(asset, &fit, test.returns, config, token, deadline) {
            Ok(result) => {
                if let Some(row) = result.model_performance {
                    out.model_performance.push(row);
                }
                out.var_performance.extend(result.var_performance);
                if let Some(row) = result.distributional_fit {
                    if row.ks_statistic.is_finite() {
                        let better = best_ks.as_ref().map(|(_, s)| row.ks_statistic < *s).unwrap_or(true);
                        if better {
                            best_ks = Some((row.model.clone(), row.ks_statistic));
                        }
                    }
                    out.distributional_fit.push(row);
                }
            }
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(CoreError::Timeout { elapsed_secs }) => return Err(CoreError::Timeout { elapsed_secs }),
            Err(e) => {
                tracing::warn!(asset = %asset.asset_id, model = %model, error = %e, "NF training diverged; skipping NF-GARCH rows for this spec");
            }
        }

        out.stress_test.push(run_stress_test(asset, spec, config, token, deadline)?);
    }

    if let Some((winning_model, value)) = best_ks {
        out.nf_winners.push(NfWinnersRow {
            asset: asset.asset_id.clone(),
            winning_model,
            split: "chrono".to_string(),
            metric: "KS_Statistic".to_string(),
            value,
        });
    }

    Ok(out)
}

/// Runs every asset (in parallel, §5's independent-fits concurrency model)
/// and merges their outputs into one `EvalReport`. The first
/// `Cancelled`/`Timeout` encountered on any asset aborts the whole run.
pub fn run_pipeline(assets: &[ReturnSeries], config: &RunConfig, token: &CancellationToken, deadline: Option<&Deadline>) -> CoreResult<EvalReport> {
    let results: Vec<CoreResult<AssetRunOutput>> = assets.par_iter().map(|asset| run_asset(asset, config, token, deadline)).collect();

    let mut report = EvalReport::default();
    for r in results {
        let out = r?;
        report.model_performance.extend(out.model_performance);
        report.var_performance.extend(out.var_performance);
        report.distributional_fit.extend(out.distributional_fit);
        report.nf_winners.extend(out.nf_winners);
        report.stress_test.extend(out.stress_test);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn gaussian_series(asset_id: &str, n: usize, seed: u64) -> ReturnSeries {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let returns: Vec<f64> = (0..n).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect();
        let dates: Vec<NaiveDate> = (0..n).map(|i| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64)).collect();
        ReturnSeries { asset_id: asset_id.to_string(), dates, returns }
    }

    fn small_config() -> RunConfig {
        let mut config = RunConfig::default();
        config.window = 120;
        config.step = 60;
        config.horizon = 10;
        config.mc_replicates = 50;
        config.sim_replicates = 20;
        config.nf.epochs = 10;
        config.nf.blocks = 2;
        config.nf.width = 8;
        config
    }

    #[test]
    fn model_grid_has_twelve_specs() {
        let config = RunConfig::default();
        assert_eq!(model_grid(&config).len(), 12);
    }

    #[test]
    fn run_asset_produces_rows_for_every_sheet_kind() {
        let asset = gaussian_series("AAA", 400, 11);
        let config = small_config();
        let token = CancellationToken::new();
        let out = run_asset(&asset, &config, &token, None).unwrap();
        assert!(!out.model_performance.is_empty());
        assert!(!out.var_performance.is_empty());
        assert!(!out.distributional_fit.is_empty());
        assert_eq!(out.nf_winners.len(), 1);
        assert!(!out.stress_test.is_empty());
    }

    #[test]
    fn degenerate_asset_is_skipped_without_error() {
        let mut asset = gaussian_series("FLAT", 100, 1);
        for r in asset.returns.iter_mut() {
            *r = 0.0;
        }
        let config = small_config();
        let token = CancellationToken::new();
        let out = run_asset(&asset, &config, &token, None).unwrap();
        assert!(out.model_performance.is_empty());
    }

    #[test]
    fn cancellation_aborts_run_asset() {
        let asset = gaussian_series("AAA", 400, 3);
        let config = small_config();
        let token = CancellationToken::new();
        token.cancel();
        let err = run_asset(&asset, &config, &token, None).unwrap_err();
        assert_eq!(err, CoreError::Cancelled);
    }

    #[test]
    fn run_pipeline_merges_multiple_assets() {
        let assets = vec![gaussian_series("AAA", 400, 21), gaussian_series("BBB", 400, 22)];
        let config = small_config();
        let token = CancellationToken::new();
        let report = run_pipeline(&assets, &config, &token, None).unwrap();
        assert_eq!(report.nf_winners.len(), 2);
    }
}
