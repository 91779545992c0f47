/// eval/report.rs — the run output, realized as one CSV sheet per summary
/// table inside a per-run output directory. No spreadsheet-writing crate
/// is available, so a multi-sheet workbook is realized as multiple CSV
/// files instead. Missing numeric cells are written as the literal 0,
/// missing text cells as the literal "N/A".
use std::io::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

fn text_or_na(s: &str) -> String {
    if s.is_empty() {
        "N/A".to_string()
    } else {
        s.to_string()
    }
}

fn num_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelPerformanceRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Avg_AIC")]
    pub avg_aic: f64,
    #[serde(rename = "Avg_BIC")]
    pub avg_bic: f64,
    #[serde(rename = "Avg_LogLik")]
    pub avg_log_lik: f64,
    #[serde(rename = "Avg_MSE")]
    pub avg_mse: f64,
    #[serde(rename = "Avg_MAE")]
    pub avg_mae: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarPerformanceRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "Confidence_Level")]
    pub confidence_level: f64,
    #[serde(rename = "Total_Obs")]
    pub total_obs: usize,
    #[serde(rename = "Expected_Rate")]
    pub expected_rate: f64,
    #[serde(rename = "Violations")]
    pub violations: usize,
    #[serde(rename = "Violation_Rate")]
    pub violation_rate: f64,
    #[serde(rename = "Kupiec_PValue")]
    pub kupiec_p_value: f64,
    #[serde(rename = "Christoffersen_PValue")]
    pub christoffersen_p_value: f64,
    #[serde(rename = "DQ_PValue")]
    pub dq_p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StressTestRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "Scenario_Type")]
    pub scenario_type: String,
    #[serde(rename = "Scenario_Name")]
    pub scenario_name: String,
    #[serde(rename = "Convergence_Rate")]
    pub convergence_rate: f64,
    #[serde(rename = "Pass_LB_Test")]
    pub pass_lb_test: bool,
    #[serde(rename = "Pass_ARCH_Test")]
    pub pass_arch_test: bool,
    #[serde(rename = "Total_Tests")]
    pub total_tests: usize,
    #[serde(rename = "Robustness_Score")]
    pub robustness_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NfWinnersRow {
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "Winning_Model")]
    pub winning_model: String,
    #[serde(rename = "Split")]
    pub split: String,
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionalFitRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "KS_Statistic")]
    pub ks_statistic: f64,
    #[serde(rename = "KS_PValue")]
    pub ks_p_value: f64,
    #[serde(rename = "Wasserstein_Distance")]
    pub wasserstein_distance: f64,
    #[serde(rename = "Notes")]
    pub notes: String,
}

impl ModelPerformanceRow {
    pub fn new(model: &str, source: &str, avg_aic: f64, avg_bic: f64, avg_ll: f64, avg_mse: f64, avg_mae: f64) -> Self {
        Self {
            model: text_or_na(model),
            source: text_or_na(source),
            avg_aic: num_or_zero(avg_aic),
            avg_bic: num_or_zero(avg_bic),
            avg_log_lik: num_or_zero(avg_ll),
            avg_mse: num_or_zero(avg_mse),
            avg_mae: num_or_zero(avg_mae),
        }
    }
}

impl DistributionalFitRow {
    pub fn new(model: &str, asset: &str, ks_statistic: f64, ks_p_value: f64, wasserstein: f64, notes: &str) -> Self {
        Self {
            model: text_or_na(model),
            asset: text_or_na(asset),
            ks_statistic: num_or_zero(ks_statistic),
            ks_p_value: num_or_zero(ks_p_value),
            wasserstein_distance: num_or_zero(wasserstein),
            notes: text_or_na(notes),
        }
    }
}

/// A complete set of sheets for one run, ready to be written to a
/// directory via `write_to_dir`.
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    pub model_performance: Vec<ModelPerformanceRow>,
    pub var_performance: Vec<VarPerformanceRow>,
    pub stress_test: Vec<StressTestRow>,
    pub nf_winners: Vec<NfWinnersRow>,
    pub distributional_fit: Vec<DistributionalFitRow>,
}

fn write_sheet<T: Serialize>(dir: &Path, filename: &str, rows: &[T]) -> CoreResult<()> {
    let path = dir.join(filename);
    let mut wtr = csv::Writer::from_path(&path)
        .map_err(|e| CoreError::InvalidInput(format!("cannot open {}: {e}", path.display())))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| CoreError::InvalidInput(format!("cannot write row to {}: {e}", path.display())))?;
    }
    wtr.flush().map_err(|e| CoreError::InvalidInput(format!("cannot flush {}: {e}", path.display())))?;
    Ok(())
}

impl EvalReport {
    /// Writes the five output sheets as CSV files into `dir` (created if
    /// absent) and returns their paths, in a stable order, for the run
    /// manifest to hash.
    pub fn write_to_dir(&self, dir: &Path) -> CoreResult<Vec<std::path::PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| CoreError::InvalidInput(format!("cannot create {}: {e}", dir.display())))?;

        write_sheet(dir, "Model_Performance_Summary.csv", &self.model_performance)?;
        write_sheet(dir, "VaR_Performance_Summary.csv", &self.var_performance)?;
        write_sheet(dir, "Stress_Test_Summary.csv", &self.stress_test)?;
        write_sheet(dir, "NF_Winners_By_Asset.csv", &self.nf_winners)?;
        write_sheet(dir, "Distributional_Fit_Summary.csv", &self.distributional_fit)?;

        Ok([
            "Model_Performance_Summary.csv",
            "VaR_Performance_Summary.csv",
            "Stress_Test_Summary.csv",
            "NF_Winners_By_Asset.csv",
            "Distributional_Fit_Summary.csv",
        ]
        .iter()
        .map(|name| dir.join(name))
        .collect())
    }
}

/// SHA-256 of a sheet's bytes, for the run manifest's reproducibility
/// record: identical runs must hash identically.
pub fn hash_file(path: &Path) -> CoreResult<String> {
    use sha2::{Digest, Sha256};
    let bytes = std::fs::read(path).map_err(|e| CoreError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_text_cell_becomes_n_a() {
        let row = ModelPerformanceRow::new("", "manual", f64::NAN, 1.0, 2.0, 3.0, 4.0);
        assert_eq!(row.model, "N/A");
        assert_eq!(row.avg_aic, 0.0);
    }

    #[test]
    fn write_to_dir_produces_all_five_sheets() {
        let dir = std::env::temp_dir().join(format!("nfgarch_report_test_{}", std::process::id()));
        let mut report = EvalReport::default();
        report.model_performance.push(ModelPerformanceRow::new("sGARCH", "manual", 100.0, 110.0, -45.0, 0.01, 0.02));
        let paths = report.write_to_dir(&dir).unwrap();
        assert_eq!(paths.len(), 5);
        for p in &paths {
            assert!(p.exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
