//! ffuf fuzz result parser.
//!
//! Accepts the `-of json` wrapper (`{"commandline": ..., "results": [...]}`),
//! a bare array of results, or JSON lines. Only hits with a success or
//! redirect status become findings unless configured otherwise, since a
//! wordlist run is mostly misses.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::parsers::json_records::{parse_object, read_records, split_array};
use crate::parsers::{
    first_field, FindingRecord, ParseError, Parser, RecordOrigin, ToolFormat, ToolOutput,
};
use crate::services::normalization::coerce_integer;

fn results_key() -> &'static Regex {
    static RESULTS_KEY: OnceLock<Regex> = OnceLock::new();
    RESULTS_KEY.get_or_init(|| Regex::new(r#""results"\s*:\s*\["#).expect("valid regex"))
}

/// Parser for ffuf JSON output.
#[derive(Debug, Default)]
pub struct FuzzResultParser {
    include_unsuccessful: bool,
}

impl FuzzResultParser {
    pub fn new(include_unsuccessful: bool) -> Self {
        Self {
            include_unsuccessful,
        }
    }

    /// Split input into candidate result objects, whatever the envelope.
    fn collect_records(
        &self,
        text: &str,
        output: &mut ToolOutput,
    ) -> Vec<(RecordOrigin, Result<Map<String, Value>, ParseError>)> {
        if text.trim_start().starts_with('{') {
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(mut wrapper)) => {
                    let is_wrapper = wrapper.contains_key("commandline");
                    match wrapper.remove("results") {
                        Some(Value::Array(results)) => {
                            return results
                                .into_iter()
                                .enumerate()
                                .map(|(i, value)| {
                                    let origin = RecordOrigin::record(i);
                                    match value {
                                        Value::Object(map) => (origin, Ok(map)),
                                        _ => (
                                            origin,
                                            Err(ParseError::new(origin, "json", "result is not an object")),
                                        ),
                                    }
                                })
                                .collect();
                        }
                        // A run with no hits may omit the array or write null.
                        None | Some(Value::Null) if is_wrapper => return Vec::new(),
                        Some(_) if is_wrapper => {
                            output.warn("ffuf \"results\" field is not an array; no results read");
                            return Vec::new();
                        }
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if let Some(found) = results_key().find(text) {
                        output.warn(format!(
                            "output is not valid JSON ({e}); recovered results present before the cut"
                        ));
                        let split = split_array(text, found.end() - 1);
                        return split
                            .records
                            .iter()
                            .map(|r| (r.origin, parse_object(r)))
                            .collect();
                    }
                }
            }
        }

        let set = read_records(text);
        output.warnings.extend(set.warnings);
        set.records
            .iter()
            .map(|r| (r.origin, parse_object(r)))
            .collect()
    }

    fn convert_result(
        &self,
        result: Map<String, Value>,
        origin: RecordOrigin,
        output: &mut ToolOutput,
    ) -> Option<FindingRecord> {
        let Some(url) = first_field(&result, &["url"]) else {
            output.reject(origin, "url", "result has no url");
            return None;
        };

        let status_text = first_field(&result, &["status", "status_code"]);
        let status = status_text.as_deref().and_then(coerce_integer);
        if let (Some(raw), None) = (&status_text, status) {
            output.warn(format!("{origin}: non-numeric status {raw:?} ignored"));
        }
        let successful = matches!(status, Some(200..=399));
        if !successful && !self.include_unsuccessful {
            return None;
        }

        let path = Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.clone());
        let word = match result.get("input") {
            Some(Value::Object(input)) => first_field(input, &["FUZZ"]),
            _ => None,
        };

        Some(FindingRecord {
            origin,
            identifier: None,
            title: Some(format!("Discovered {}", word.unwrap_or(path))),
            severity: Some("info".to_string()),
            matched_target: Some(url),
            description: Some(describe(&result, status)),
            raw: result,
        })
    }
}

impl Parser for FuzzResultParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let mut skipped = 0usize;

        for (origin, record) in self.collect_records(text, &mut output) {
            match record {
                Ok(result) => match self.convert_result(result, origin, &mut output) {
                    Some(finding) => output.findings.push(finding),
                    None => skipped += 1,
                },
                Err(err) => output.errors.push(err),
            }
        }

        tracing::debug!(
            kept = output.findings.len(),
            skipped,
            "Filtered fuzz results"
        );
        output
    }

    fn format(&self) -> ToolFormat {
        ToolFormat::FuzzResultJson
    }
}

/// One-line summary: status, sizes and redirect target when present.
fn describe(result: &Map<String, Value>, status: Option<i64>) -> String {
    let mut description = match status {
        Some(status) => format!("HTTP {status}"),
        None => "HTTP status unknown".to_string(),
    };
    let sizes: Vec<String> = ["length", "words", "lines"]
        .iter()
        .filter_map(|&key| first_field(result, &[key]).map(|v| format!("{key} {v}")))
        .collect();
    if !sizes.is_empty() {
        description.push_str(&format!(" ({})", sizes.join(", ")));
    }
    if let Some(location) = first_field(result, &["redirectlocation"]) {
        description.push_str(&format!(" -> {location}"));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"{"commandline":"ffuf -u https://example.com/FUZZ -w words.txt -of json","time":"2024-05-01T10:00:00Z","results":[
{"input":{"FUZZ":"admin"},"position":1,"status":200,"length":1534,"words":120,"lines":40,"url":"https://example.com/admin","redirectlocation":"","duration":120000000},
{"input":{"FUZZ":"old"},"position":2,"status":301,"length":0,"words":1,"lines":1,"url":"https://example.com/old","redirectlocation":"https://example.com/new/","duration":90000000},
{"input":{"FUZZ":"secret"},"position":3,"status":403,"length":199,"words":14,"lines":8,"url":"https://example.com/secret","redirectlocation":"","duration":80000000}
]}"#;

    #[test]
    fn wrapper_without_results_yields_nothing() {
        let parser = FuzzResultParser::new(false);
        for input in [
            r#"{"commandline":"ffuf -u x","time":"t"}"#,
            r#"{"commandline":"ffuf -u x","time":"t","results":null}"#,
        ] {
            let output = parser.parse(input);
            assert!(output.findings.is_empty(), "{input}");
            assert!(output.errors.is_empty(), "{input}: {:?}", output.errors);
            assert!(output.warnings.is_empty(), "{input}: {:?}", output.warnings);
        }
    }

    #[test]
    fn wrapper_with_non_array_results_warns() {
        let output = FuzzResultParser::new(false).parse(r#"{"commandline":"ffuf -u x","results":"none"}"#);
        assert!(output.findings.is_empty());
        assert!(output.errors.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn keeps_success_and_redirect_by_default() {
        let output = FuzzResultParser::new(false).parse(WRAPPED);
        assert_eq!(output.findings.len(), 2);
        assert!(output.errors.is_empty());
        assert!(output.warnings.is_empty());
        assert_eq!(output.findings[0].title.as_deref(), Some("Discovered admin"));
        assert_eq!(output.findings[0].severity.as_deref(), Some("info"));
    }

    #[test]
    fn includes_unsuccessful_when_configured() {
        let output = FuzzResultParser::new(true).parse(WRAPPED);
        assert_eq!(output.findings.len(), 3);
        assert_eq!(
            output.findings[2].matched_target.as_deref(),
            Some("https://example.com/secret")
        );
    }

    #[test]
    fn description_summarizes_sizes_and_redirect() {
        let output = FuzzResultParser::new(false).parse(WRAPPED);
        assert_eq!(
            output.findings[1].description.as_deref(),
            Some("HTTP 301 (length 0, words 1, lines 1) -> https://example.com/new/")
        );
    }

    #[test]
    fn truncated_wrapper_recovers_complete_results() {
        let cut = WRAPPED.find("{\"input\":{\"FUZZ\":\"old\"}").unwrap() + 20;
        let output = FuzzResultParser::new(false).parse(&WRAPPED[..cut]);
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn bare_array_and_json_lines_are_accepted() {
        let array = r#"[{"url":"https://e.example/a","status":204}]"#;
        assert_eq!(FuzzResultParser::new(false).parse(array).findings.len(), 1);

        let lines = "{\"url\":\"https://e.example/a\",\"status\":\"200\"}\n{\"url\":\"https://e.example/b\",\"status\":404}\n";
        assert_eq!(FuzzResultParser::new(false).parse(lines).findings.len(), 1);
    }

    #[test]
    fn result_without_url_is_rejected() {
        let output = FuzzResultParser::new(false).parse(r#"[{"status":200}]"#);
        assert!(output.findings.is_empty());
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn non_numeric_status_warns_and_is_excluded() {
        let output = FuzzResultParser::new(false).parse(r#"[{"url":"https://e.example/a","status":"ok"}]"#);
        assert!(output.findings.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }
}
