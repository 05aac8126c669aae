//! Record splitting shared by the JSON-based parsers.
//!
//! Tools emit either one JSON array or one JSON object per line, and both
//! get cut short when a scan is killed. Records are split out *before* any
//! JSON parsing so that one malformed or truncated record never hides the
//! ones around it.

use serde_json::{Map, Value};

use crate::parsers::{ParseError, RecordOrigin};

/// One candidate record: its source slice and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRecord<'a> {
    pub origin: RecordOrigin,
    pub text: &'a str,
    /// False when input ended before the record's closing delimiter.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySplit<'a> {
    pub records: Vec<JsonRecord<'a>>,
    /// Byte offset just past the closing `]`, if one was found.
    pub end: Option<usize>,
}

/// A split record stream plus any anomalies noticed while splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet<'a> {
    pub records: Vec<JsonRecord<'a>>,
    pub warnings: Vec<String>,
}

/// Split the elements of the JSON array whose `[` sits at byte `open`.
pub fn split_array(text: &str, open: usize) -> ArraySplit<'_> {
    let body_start = open + 1;
    let mut records = Vec::new();
    let mut line = 1 + text[..body_start].matches('\n').count();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start: Option<(usize, usize)> = None;
    let mut end = None;

    for (offset, ch) in text[body_start..].char_indices() {
        let pos = body_start + offset;
        if ch == '\n' {
            line += 1;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                start.get_or_insert((pos, line));
            }
            '{' | '[' => {
                depth += 1;
                start.get_or_insert((pos, line));
            }
            '}' | ']' if depth > 0 => depth -= 1,
            ']' => {
                if let Some(from) = start.take() {
                    push_record(&mut records, text, from, pos, true);
                }
                end = Some(pos + 1);
                break;
            }
            ',' if depth == 0 => {
                // An empty slot (`[1,,2]`) still counts as a record so the
                // JSON error is reported against it.
                let from = start.take().unwrap_or((pos, line));
                push_record(&mut records, text, from, pos, true);
            }
            c if c.is_whitespace() => {}
            _ => {
                start.get_or_insert((pos, line));
            }
        }
    }

    if end.is_none() {
        if let Some(from) = start {
            // A container whose brackets balanced before the cut is whole.
            let tail = text[from.0..].trim_start();
            let closed = depth == 0 && !in_string && tail.starts_with(['{', '[']);
            push_record(&mut records, text, from, text.len(), closed);
        }
    }

    ArraySplit { records, end }
}

fn push_record<'a>(
    records: &mut Vec<JsonRecord<'a>>,
    text: &'a str,
    from: (usize, usize),
    to: usize,
    complete: bool,
) {
    let index = records.len();
    records.push(JsonRecord {
        origin: RecordOrigin::at_line(index, from.1),
        text: text[from.0..to].trim_end(),
        complete,
    });
}

/// One record per non-blank line, numbered by 1-based line.
pub fn split_lines(text: &str) -> Vec<JsonRecord<'_>> {
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        records.push(JsonRecord {
            origin: RecordOrigin::at_line(records.len(), i + 1),
            text: trimmed,
            complete: true,
        });
    }
    records
}

/// Split either a top-level array or a JSON-lines stream.
pub fn read_records(text: &str) -> RecordSet<'_> {
    let trimmed_start = text.len() - text.trim_start().len();
    if text[trimmed_start..].starts_with('[') {
        return read_array(text, trimmed_start);
    }
    RecordSet {
        records: split_lines(text),
        warnings: Vec::new(),
    }
}

/// Split the array at `open` and note truncation or trailing junk.
pub fn read_array(text: &str, open: usize) -> RecordSet<'_> {
    let split = split_array(text, open);
    let mut warnings = Vec::new();
    match split.end {
        Some(end) => {
            if !text[end..].trim().is_empty() {
                warnings.push("ignored trailing content after the JSON array".to_string());
            }
        }
        None => {
            let last_complete = split.records.last().map_or(true, |r| r.complete);
            if last_complete {
                warnings.push(
                    "JSON array is not terminated; input appears truncated".to_string(),
                );
            }
        }
    }
    RecordSet {
        records: split.records,
        warnings,
    }
}

/// Parse one split record into a JSON object.
pub fn parse_object(record: &JsonRecord<'_>) -> Result<Map<String, Value>, ParseError> {
    if !record.complete {
        return Err(ParseError::new(
            record.origin,
            "json",
            "record truncated at end of input",
        ));
    }
    match serde_json::from_str::<Value>(record.text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::new(
            record.origin,
            "json",
            format!("expected an object, found {}", kind(&other)),
        )),
        Err(e) => Err(ParseError::new(record.origin, "json", e.to_string())),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
