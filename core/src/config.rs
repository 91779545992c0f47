/// config.rs — run configuration loaded from .env / the process environment
///
/// Covers `engine`, `family`, `innovation`, `split` (+ window/step/horizon),
/// `nf.*`, `var.levels`, `mc.replicates`, `timeout_seconds`,
/// `output_dir`. Every field has a documented, frozen default so a run
/// with no `.env` at all is still fully specified and reproducible.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::garch::spec::TgarchThreshold;
use crate::garch::{InnovationFamily, VarianceFamily};

/// `engine: {manual | external}`. The `external` arm names an optional
/// third-party comparator; it is contract-only here (out of scope for
/// this crate) and exists so a config file that names it is recognized
/// rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    Manual,
    External,
}

impl FromStr for EngineChoice {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(EngineChoice::Manual),
            "external" => Ok(EngineChoice::External),
            other => Err(anyhow!("unknown engine '{other}', expected 'manual' or 'external'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    Chrono,
    Tscv,
}

impl FromStr for SplitMode {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chrono" => Ok(SplitMode::Chrono),
            "tscv" => Ok(SplitMode::Tscv),
            other => Err(anyhow!("unknown split '{other}', expected 'chrono' or 'tscv'")),
        }
    }
}

impl FromStr for VarianceFamily {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sGARCH" => Ok(VarianceFamily::SGarch),
            "eGARCH" => Ok(VarianceFamily::EGarch),
            "gjrGARCH" => Ok(VarianceFamily::GjrGarch),
            "TGARCH" => Ok(VarianceFamily::TGarch),
            other => Err(anyhow!("unknown family '{other}'")),
        }
    }
}

impl FromStr for InnovationFamily {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(InnovationFamily::Normal),
            "student_t" => Ok(InnovationFamily::StudentT),
            "skew_student_t" => Ok(InnovationFamily::SkewStudentT),
            other => Err(anyhow!("unknown innovation '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NfConfig {
    pub blocks: usize,
    pub width: usize,
    pub lr: f64,
    pub epochs: usize,
    pub seed: u64,
}

impl Default for NfConfig {
    fn default() -> Self {
        Self { blocks: 6, width: 32, lr: 0.01, epochs: 200, seed: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub engine: EngineChoice,
    pub family: VarianceFamily,
    pub innovation: InnovationFamily,
    pub tgarch_threshold: TgarchThreshold,

    pub split: SplitMode,
    pub chrono_ratio: f64,
    pub window: usize,
    pub step: usize,
    pub horizon: usize,

    pub nf: NfConfig,

    pub var_levels: Vec<f64>,
    pub mc_replicates: usize,
    pub timeout_seconds: f64,
    pub output_dir: PathBuf,

    /// Independent seed streams: GARCH Monte Carlo forecasting, NF
    /// sampling. NF training's seed lives in `nf.seed`.
    pub mc_seed: u64,
    pub sample_seed: u64,
    pub sim_replicates: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineChoice::Manual,
            family: VarianceFamily::SGarch,
            innovation: InnovationFamily::Normal,
            tgarch_threshold: TgarchThreshold::Fixed(0.0),
            split: SplitMode::Chrono,
            chrono_ratio: 0.65,
            window: 500,
            step: 50,
            horizon: 20,
            nf: NfConfig::default(),
            var_levels: vec![0.05, 0.01],
            mc_replicates: crate::garch::forecast::DEFAULT_MC_REPLICATES,
            timeout_seconds: 60.0,
            output_dir: PathBuf::from("./run_output"),
            mc_seed: 1,
            sample_seed: 2,
            sim_replicates: 200,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v.parse::<T>().map_err(|e| anyhow!("config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_csv_f64(key: &str, default: &[f64]) -> Result<Vec<f64>> {
    match env::var(key) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().parse::<f64>().map_err(|e| anyhow!("config key {key}: {e}")))
            .collect(),
        Err(_) => Ok(default.to_vec()),
    }
}

impl RunConfig {
    /// Loads configuration from environment variables (after `.env`),
    /// falling back to the documented default for every absent key.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = RunConfig::default();

        let tgarch_threshold = match env::var("TGARCH_TAU") {
            Ok(v) if v.eq_ignore_ascii_case("estimated") => TgarchThreshold::Estimated,
            Ok(v) => TgarchThreshold::Fixed(v.parse::<f64>().map_err(|e| anyhow!("TGARCH_TAU: {e}"))?),
            Err(_) => defaults.tgarch_threshold,
        };

        Ok(Self {
            engine: parse_env("ENGINE", defaults.engine)?,
            family: parse_env("FAMILY", defaults.family)?,
            innovation: parse_env("INNOVATION", defaults.innovation)?,
            tgarch_threshold,

            split: parse_env("SPLIT", defaults.split)?,
            chrono_ratio: parse_env("CHRONO_RATIO", defaults.chrono_ratio)?,
            window: parse_env("WINDOW", defaults.window)?,
            step: parse_env("STEP", defaults.step)?,
            horizon: parse_env("HORIZON", defaults.horizon)?,

            nf: NfConfig {
                blocks: parse_env("NF_BLOCKS", defaults.nf.blocks)?,
                width: parse_env("NF_WIDTH", defaults.nf.width)?,
                lr: parse_env("NF_LR", defaults.nf.lr)?,
                epochs: parse_env("NF_EPOCHS", defaults.nf.epochs)?,
                seed: parse_env("NF_SEED", defaults.nf.seed)?,
            },

            var_levels: parse_csv_f64("VAR_LEVELS", &defaults.var_levels)?,
            mc_replicates: parse_env("MC_REPLICATES", defaults.mc_replicates)?,
            timeout_seconds: parse_env("TIMEOUT_SECONDS", defaults.timeout_seconds)?,
            output_dir: parse_env::<String>("OUTPUT_DIR", defaults.output_dir.to_string_lossy().to_string())?.into(),

            mc_seed: parse_env("MC_SEED", defaults.mc_seed)?,
            sample_seed: parse_env("SAMPLE_SEED", defaults.sample_seed)?,
            sim_replicates: parse_env("SIM_REPLICATES", defaults.sim_replicates)?,
        })
    }
}

impl FromStr for TgarchThreshold {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("estimated") {
            Ok(TgarchThreshold::Estimated)
        } else {
            Ok(TgarchThreshold::Fixed(s.parse::<f64>().map_err(|e| anyhow!("{e}"))?))
        }
    }
}
