//! Scanner output parsers for normalizing records from various tools.
//!
//! Each parser implements the `Parser` trait, producing a tool-specific
//! `ToolOutput` that still carries the tool's own field names and raw
//! strings. The normalization service turns that into a `ParseResult`.
//! Parsers never fail: bad records land in `errors`, recovered oddities in
//! `warnings`, and parsing continues with the next record.

pub mod fuzz_result;
pub mod http_probe;
pub mod json_records;
pub mod scan_report_xml;
pub mod subdomain_list;
pub mod text;
pub mod vuln_finding;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ParserConfig;

/// Recognized output formats. Adding a tool means adding a variant here and
/// an arm in [`parser_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFormat {
    ScanReportXml,
    ScanReportText,
    SubdomainListText,
    HttpProbeJson,
    #[serde(rename = "vuln_finding_jsonlines")]
    VulnFindingJsonLines,
    FuzzResultJson,
    BannerText,
    UnstructuredText,
}

impl ToolFormat {
    pub const ALL: [ToolFormat; 8] = [
        Self::ScanReportXml,
        Self::ScanReportText,
        Self::SubdomainListText,
        Self::HttpProbeJson,
        Self::VulnFindingJsonLines,
        Self::FuzzResultJson,
        Self::BannerText,
        Self::UnstructuredText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanReportXml => "scan_report_xml",
            Self::ScanReportText => "scan_report_text",
            Self::SubdomainListText => "subdomain_list_text",
            Self::HttpProbeJson => "http_probe_json",
            Self::VulnFindingJsonLines => "vuln_finding_jsonlines",
            Self::FuzzResultJson => "fuzz_result_json",
            Self::BannerText => "banner_text",
            Self::UnstructuredText => "unstructured_text",
        }
    }

    /// Tool normally responsible for this format.
    pub fn default_tool(&self) -> &'static str {
        match self {
            Self::ScanReportXml | Self::ScanReportText => "nmap",
            Self::SubdomainListText => "subfinder",
            Self::HttpProbeJson => "httpx",
            Self::VulnFindingJsonLines => "nuclei",
            Self::FuzzResultJson => "ffuf",
            Self::BannerText => "whatweb",
            Self::UnstructuredText => "unknown",
        }
    }

    /// Formats whose input is JSON (an array, an object or JSON lines).
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            Self::HttpProbeJson | Self::VulnFindingJsonLines | Self::FuzzResultJson
        )
    }

    /// Resolve a caller hint: a canonical identifier, a legacy tool key, or a
    /// bare tool name with a single output format. Case-insensitive. Bare
    /// `nmap` needs the content to choose and is resolved by detection.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_lowercase();
        if let Some(format) = Self::ALL.iter().find(|f| f.as_str() == hint) {
            return Some(*format);
        }
        match hint.as_str() {
            "nmap_xml" => Some(Self::ScanReportXml),
            "nmap_simple" | "nmap_text" => Some(Self::ScanReportText),
            "subfinder" => Some(Self::SubdomainListText),
            "httpx" | "httpx_json" => Some(Self::HttpProbeJson),
            "nuclei" | "nuclei_json" => Some(Self::VulnFindingJsonLines),
            "ffuf" | "ffuf_json" => Some(Self::FuzzResultJson),
            "whatweb" => Some(Self::BannerText),
            _ => None,
        }
    }
}

impl fmt::Display for ToolFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFormat {
    type Err = crate::errors::ParseFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hint(s).ok_or_else(|| crate::errors::ParseFailure::UnknownToolHint(s.to_string()))
    }
}

/// Where a record sat in the input: always an index, plus the 1-based line
/// when the format is line-oriented or the position is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOrigin {
    pub index: usize,
    pub line: Option<usize>,
}

impl RecordOrigin {
    pub fn record(index: usize) -> Self {
        Self { index, line: None }
    }

    pub fn at_line(index: usize, line: usize) -> Self {
        Self {
            index,
            line: Some(line),
        }
    }
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}"),
            None => write!(f, "record {}", self.index + 1),
        }
    }
}

/// A record that was dropped entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub origin: RecordOrigin,
    pub field: String,
    pub message: String,
}

impl ParseError {
    pub fn new(origin: RecordOrigin, field: &str, message: impl Into<String>) -> Self {
        Self {
            origin,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.origin, self.field, self.message)
    }
}

/// An address exactly as the tool reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub addr_type: Option<String>,
    pub value: String,
}

/// A port exactly as the tool reported it. `service_fields` uses the tool's
/// own key names; `probe_fields` are HTTP probe facts folded into
/// `extra_info` during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRecord {
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub state: Option<String>,
    pub service_fields: Vec<(String, String)>,
    pub probe_fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub origin: RecordOrigin,
    pub addresses: Vec<AddressRecord>,
    pub hostnames: Vec<String>,
    pub status: Option<String>,
    pub ports: Vec<PortRecord>,
    pub os_guesses: Vec<(String, Option<String>)>,
}

impl HostRecord {
    pub fn new(origin: RecordOrigin) -> Self {
        Self {
            origin,
            addresses: Vec::new(),
            hostnames: Vec::new(),
            status: None,
            ports: Vec::new(),
            os_guesses: Vec::new(),
        }
    }

    /// Record a target that may be an IP literal or a hostname.
    pub fn add_target(&mut self, target: &str) {
        let target = target.trim().trim_start_matches('[').trim_end_matches(']');
        if target.is_empty() {
            return;
        }
        if target.parse::<std::net::IpAddr>().is_ok() {
            self.add_address(None, target);
        } else if !self.hostnames.iter().any(|h| h.eq_ignore_ascii_case(target)) {
            self.hostnames.push(target.to_string());
        }
    }

    pub fn add_address(&mut self, addr_type: Option<&str>, value: &str) {
        let value = value.trim();
        if value.is_empty() || self.addresses.iter().any(|a| a.value == value) {
            return;
        }
        self.addresses.push(AddressRecord {
            addr_type: addr_type.map(String::from),
            value: value.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindingRecord {
    pub origin: RecordOrigin,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub matched_target: Option<String>,
    pub description: Option<String>,
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// Tool-specific parse output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub source_tool: String,
    pub source_tool_version: Option<String>,
    /// Run-level attributes such as scan type or probed service ranges.
    pub scan_info: BTreeMap<String, String>,
    pub format: ToolFormat,
    pub hosts: Vec<HostRecord>,
    pub findings: Vec<FindingRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<ParseError>,
}

impl ToolOutput {
    pub fn new(source_tool: &str, format: ToolFormat) -> Self {
        Self {
            source_tool: source_tool.to_string(),
            source_tool_version: None,
            scan_info: BTreeMap::new(),
            format,
            hosts: Vec::new(),
            findings: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn reject(&mut self, origin: RecordOrigin, field: &str, message: impl Into<String>) {
        self.errors.push(ParseError::new(origin, field, message));
    }
}

/// Trait for pluggable tool output parsers.
pub trait Parser: Send + Sync {
    /// Parse decoded tool output. Must not fail on malformed content.
    fn parse(&self, text: &str) -> ToolOutput;

    /// The format this parser handles.
    fn format(&self) -> ToolFormat;

    /// The tool name reported when the output does not identify itself.
    fn source_tool(&self) -> &str {
        self.format().default_tool()
    }
}

/// Select the parser for a resolved format.
pub fn parser_for(format: ToolFormat, config: &ParserConfig) -> Box<dyn Parser> {
    match format {
        ToolFormat::ScanReportXml => Box::new(scan_report_xml::ScanReportXmlParser::new()),
        ToolFormat::SubdomainListText => Box::new(subdomain_list::SubdomainListParser::new()),
        ToolFormat::HttpProbeJson => Box::new(http_probe::HttpProbeParser::new()),
        ToolFormat::VulnFindingJsonLines => Box::new(vuln_finding::VulnFindingParser::new()),
        ToolFormat::FuzzResultJson => Box::new(fuzz_result::FuzzResultParser::new(
            config.include_unsuccessful_fuzz,
        )),
        ToolFormat::ScanReportText | ToolFormat::BannerText | ToolFormat::UnstructuredText => {
            Box::new(text::TextParser::new(format))
        }
    }
}

/// Render a JSON scalar the way a tool would have printed it.
pub(crate) fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty scalar among several alternative key spellings.
pub(crate) fn first_field(
    object: &serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(scalar_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_identifiers_round_trip() {
        for format in ToolFormat::ALL {
            assert_eq!(ToolFormat::from_hint(format.as_str()), Some(format));
            let json = serde_json::to_value(format).unwrap();
            assert_eq!(json, format.as_str());
        }
    }

    #[test]
    fn legacy_hints_resolve() {
        assert_eq!(ToolFormat::from_hint("nmap_xml"), Some(ToolFormat::ScanReportXml));
        assert_eq!(ToolFormat::from_hint("NMAP_SIMPLE"), Some(ToolFormat::ScanReportText));
        assert_eq!(ToolFormat::from_hint("nuclei"), Some(ToolFormat::VulnFindingJsonLines));
        assert_eq!(ToolFormat::from_hint("whatweb"), Some(ToolFormat::BannerText));
        assert_eq!(ToolFormat::from_hint("masscan"), None);
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "masscan".parse::<ToolFormat>().unwrap_err();
        assert!(err.is_unknown_hint());
    }

    #[test]
    fn origin_display_prefers_line() {
        assert_eq!(RecordOrigin::at_line(1, 2).to_string(), "line 2");
        assert_eq!(RecordOrigin::record(2).to_string(), "record 3");
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::new(RecordOrigin::at_line(1, 2), "json", "expected value");
        assert_eq!(err.to_string(), "line 2: json: expected value");
    }

    #[test]
    fn add_target_splits_ips_and_names() {
        let mut host = HostRecord::new(RecordOrigin::record(0));
        host.add_target("198.51.100.7");
        host.add_target("www.example.com");
        host.add_target("WWW.example.com");
        host.add_target("[2001:db8::1]");
        assert_eq!(host.addresses.len(), 2);
        assert_eq!(host.hostnames, vec!["www.example.com".to_string()]);
    }

    #[test]
    fn scalar_text_renders_numbers_and_skips_blanks() {
        assert_eq!(scalar_text(&serde_json::json!(200)), Some("200".to_string()));
        assert_eq!(scalar_text(&serde_json::json!(" x ")), Some("x".to_string()));
        assert_eq!(scalar_text(&serde_json::json!("")), None);
        assert_eq!(scalar_text(&serde_json::json!(null)), None);
    }
}
