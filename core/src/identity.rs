/// identity.rs — content-addressed identity check for NF-GARCH composition
///
/// The NFModel used in simulation must always be the one trained on the
/// exact standardized residuals of the accompanying GarchFit. Cross-
/// contamination across assets or families is a programming error and must
/// be rejected by an identity check (asset id + spec hash comparison),
/// realized here as a content-addressed identifier: a hash of (asset id,
/// ModelSpec, training-slice checksum).
use sha2::{Digest, Sha256};

use crate::garch::ModelSpec;

/// A 32-byte SHA-256 digest over `asset_id`, the spec's canonical key, and
/// a checksum of the exact training slice, rendered as a hex string for
/// logging/serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FitIdentity(String);

impl FitIdentity {
    pub fn compute(asset_id: &str, spec: &ModelSpec, training_slice: &[f64]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(asset_id.as_bytes());
        hasher.update(b"|");
        hasher.update(spec.canonical_key().as_bytes());
        hasher.update(b"|");
        for &x in training_slice {
            hasher.update(x.to_le_bytes());
        }
        let digest = hasher.finalize();
        FitIdentity(hex_encode(&digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
