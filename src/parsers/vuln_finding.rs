//! Nuclei finding parser (JSON lines, or the `-json-export` array form).
//!
//! Each record is one template match. A record that is not valid JSON is
//! reported with its line number and skipped; the rest of the stream is
//! still read.

use serde_json::{Map, Value};

use crate::parsers::json_records::{parse_object, read_records};
use crate::parsers::{first_field, FindingRecord, Parser, RecordOrigin, ToolFormat, ToolOutput};

/// Parser for nuclei JSON-lines output.
#[derive(Debug, Default)]
pub struct VulnFindingParser;

impl VulnFindingParser {
    pub fn new() -> Self {
        Self
    }

    fn convert_record(&self, record: Map<String, Value>, origin: RecordOrigin) -> FindingRecord {
        let info = match record.get("info") {
            Some(Value::Object(info)) => info.clone(),
            _ => Map::new(),
        };

        FindingRecord {
            origin,
            identifier: first_field(&record, &["template-id", "templateID", "template_id"]),
            title: first_field(&info, &["name"]),
            severity: first_field(&info, &["severity"])
                .or_else(|| first_field(&record, &["severity"])),
            matched_target: first_field(&record, &["matched-at", "matched", "url", "host"]),
            description: first_field(&info, &["description"]),
            raw: record,
        }
    }
}

impl Parser for VulnFindingParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let set = read_records(text);
        output.warnings.extend(set.warnings);

        for record in &set.records {
            match parse_object(record) {
                Ok(object) => output
                    .findings
                    .push(self.convert_record(object, record.origin)),
                Err(err) => output.errors.push(err),
            }
        }
        output
    }

    fn format(&self) -> ToolFormat {
        ToolFormat::VulnFindingJsonLines
    }
}
