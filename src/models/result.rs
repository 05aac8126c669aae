//! Top-level value returned from every parse call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::finding::ParsedFinding;
use crate::models::host::ParsedHost;
use crate::parsers::ToolFormat;

/// Normalized result of parsing one tool output blob.
///
/// `warnings` describe data that was recovered with an omission or default;
/// `parse_errors` describe records that were dropped entirely. Both keep the
/// order in which the problems were found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseResult {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scan_info: BTreeMap<String, String>,
    pub format: ToolFormat,
    pub hosts: Vec<ParsedHost>,
    pub findings: Vec<ParsedFinding>,
    pub warnings: Vec<String>,
    pub parse_errors: Vec<String>,
}

impl ParseResult {
    /// True when nothing had to be skipped or defaulted.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.parse_errors.is_empty()
    }

    pub fn open_port_count(&self) -> usize {
        self.hosts.iter().map(|h| h.open_ports().count()).sum()
    }
}
