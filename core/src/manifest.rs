/// manifest.rs — the run manifest
///
/// One directory per run holds the output sheets (`eval::report`), a JSON
/// manifest pinning seeds + config + a SHA-256 hash of each output sheet,
/// and a reproducibility log.
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::RunConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct SheetHash {
    pub sheet: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
struct ConfigSnapshot {
    engine: String,
    family: String,
    innovation: String,
    split: String,
    chrono_ratio: f64,
    window: usize,
    step: usize,
    horizon: usize,
    nf_blocks: usize,
    nf_width: usize,
    nf_lr: f64,
    nf_epochs: usize,
    nf_seed: u64,
    var_levels: Vec<f64>,
    mc_replicates: usize,
    mc_seed: u64,
    sample_seed: u64,
    sim_replicates: usize,
    timeout_seconds: f64,
}

impl From<&RunConfig> for ConfigSnapshot {
    fn from(c: &RunConfig) -> Self {
        Self {
            engine: format!("{:?}", c.engine),
            family: format!("{:?}", c.family),
            innovation: format!("{:?}", c.innovation),
            split: format!("{:?}", c.split),
            chrono_ratio: c.chrono_ratio,
            window: c.window,
            step: c.step,
            horizon: c.horizon,
            nf_blocks: c.nf.blocks,
            nf_width: c.nf.width,
            nf_lr: c.nf.lr,
            nf_epochs: c.nf.epochs,
            nf_seed: c.nf.seed,
            var_levels: c.var_levels.clone(),
            mc_replicates: c.mc_replicates,
            mc_seed: c.mc_seed,
            sample_seed: c.sample_seed,
            sim_replicates: c.sim_replicates,
            timeout_seconds: c.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    config: ConfigSnapshot,
    sheet_hashes: Vec<SheetHash>,
    reproducibility_log: Vec<String>,
}

impl RunManifest {
    pub fn new(config: &RunConfig) -> Self {
        Self { config: ConfigSnapshot::from(config), sheet_hashes: Vec::new(), reproducibility_log: Vec::new() }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.reproducibility_log.push(line.into());
    }

    /// Hashes every sheet path (as produced by `EvalReport::write_to_dir`)
    /// and records the digests — the bitwise-reproducibility contract of
    /// P7 is checked by comparing these hashes across two runs with
    /// identical config and seeds.
    pub fn record_sheet_hashes(&mut self, sheet_paths: &[PathBuf]) -> CoreResult<()> {
        for path in sheet_paths {
            let sha256 = crate::eval::report::hash_file(path)?;
            let sheet = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            self.sheet_hashes.push(SheetHash { sheet, sha256 });
        }
        Ok(())
    }

    pub fn write_to_dir(&self, dir: &Path) -> CoreResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| CoreError::InvalidInput(format!("cannot create {}: {e}", dir.display())))?;
        let path = dir.join("manifest.json");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::InvalidInput(format!("cannot serialize manifest: {e}")))?;
        std::fs::write(&path, json).map_err(|e| CoreError::InvalidInput(format!("cannot write {}: {e}", path.display())))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let cfg = RunConfig::default();
        let mut manifest = RunManifest::new(&cfg);
        manifest.log("started run");
        let dir = std::env::temp_dir().join(format!("nfgarch_manifest_test_{}", std::process::id()));
        let path = manifest.write_to_dir(&dir).unwrap();
        assert!(path.exists());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("started run"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
