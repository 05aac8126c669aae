//! Deterministic identifiers for findings.
//!
//! Every value here is a pure hash of finding content, so parsing the same
//! output twice yields identical ids and re-scans of the same issue line up.

use sha2::{Digest, Sha256};

/// Length of the hex digest kept in synthesized identifiers.
const SHORT_ID_LEN: usize = 16;

/// Synthesize an identifier for a finding whose tool supplied none.
///
/// Inputs: tool, matched target, and a discriminator (title or description)
/// separating different observations on the same target.
pub fn synthesize_id(tool: &str, target: &str, discriminator: &str) -> String {
    let digest = hash(&format!("ID:{tool}:{target}:{discriminator}"));
    format!("{tool}:{}", &digest[..SHORT_ID_LEN])
}

/// Compute a finding fingerprint.
///
/// Inputs: tool, identifier, matched target. Excludes severity and
/// description because tools re-grade and re-word findings between versions.
pub fn compute_finding(tool: &str, identifier: &str, target: &str) -> String {
    hash(&format!("FINDING:{tool}:{identifier}:{target}"))
}

/// SHA-256 hash a string and return hex-encoded digest.
fn hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
