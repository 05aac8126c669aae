//! Tool-reported findings not tied to a specific port.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl SeverityLevel {
    /// Map a tool severity string, ignoring case and surrounding whitespace.
    /// Returns `None` for anything outside the known vocabulary.
    pub fn from_tool(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedFinding {
    /// Template or rule id from the tool, or a deterministic synthesized id.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub severity: SeverityLevel,
    pub matched_target: String,
    pub description: String,
    /// SHA-256 over tool, identifier and target; stable across re-scans.
    pub fingerprint: String,
    /// Tool-specific fields kept verbatim for audit and report display.
    pub raw_tool_metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ParsedFinding {
    /// Return a copy carrying an extra free-text note, such as AI commentary
    /// produced by the caller.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}
