/// garch/spec.rs — Model specification value objects
///
/// `ModelSpec` is freely copied and compared; it carries no owned heap data
/// so two fits can be told apart (and an NF model matched to its GARCH
/// parent) purely by `==`/hashing its serialized form in `identity.rs`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarianceFamily {
    SGarch,
    EGarch,
    GjrGarch,
    TGarch,
}

impl VarianceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarianceFamily::SGarch => "sGARCH",
            VarianceFamily::EGarch => "eGARCH",
            VarianceFamily::GjrGarch => "gjrGARCH",
            VarianceFamily::TGarch => "TGARCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InnovationFamily {
    Normal,
    StudentT,
    SkewStudentT,
}

impl InnovationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            InnovationFamily::Normal => "normal",
            InnovationFamily::StudentT => "student_t",
            InnovationFamily::SkewStudentT => "skew_student_t",
        }
    }
}

/// The TGARCH threshold is a configuration-level choice per `ModelSpec`
/// rather than a single global default, and is recorded in the run config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TgarchThreshold {
    Fixed(f64),
    Estimated,
}

impl Default for TgarchThreshold {
    fn default() -> Self {
        TgarchThreshold::Fixed(0.0)
    }
}

/// Orders are pinned to (p=1, q=1) — the only orders this engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub variance: VarianceFamily,
    pub innovation: InnovationFamily,
    pub tgarch_threshold: TgarchThreshold,
}

impl ModelSpec {
    pub fn new(variance: VarianceFamily, innovation: InnovationFamily) -> Self {
        Self { variance, innovation, tgarch_threshold: TgarchThreshold::default() }
    }

    pub fn with_tgarch_threshold(mut self, t: TgarchThreshold) -> Self {
        self.tgarch_threshold = t;
        self
    }

    /// A stable string key, used both for logging and as grist for the
    /// content-addressed identifier in `identity.rs`.
    pub fn canonical_key(&self) -> String {
        let tau = match self.tgarch_threshold {
            TgarchThreshold::Fixed(v) => format!("fixed({v})"),
            TgarchThreshold::Estimated => "estimated".to_string(),
        };
        format!("{}/{}/tau={}", self.variance.as_str(), self.innovation.as_str(), tau)
    }
}
