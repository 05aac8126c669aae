//! Parser facade: decode, detect, parse and normalize one tool output blob.
//!
//! This is the only entry point callers need. It fails only when the input
//! cannot be read as text or the caller names a format that does not exist;
//! everything wrong inside the output itself comes back as warnings and
//! parse errors on the result.

use crate::config::ParserConfig;
use crate::errors::ParseFailure;
use crate::models::{ParseResult, RawOutput};
use crate::parsers::parser_for;
use crate::services::{detection, normalization};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse with the default [`ParserConfig`].
///
/// `tool_hint` takes precedence over a hint carried on `raw`.
pub fn parse(raw: &RawOutput<'_>, tool_hint: Option<&str>) -> Result<ParseResult, ParseFailure> {
    parse_with_config(raw, tool_hint, &ParserConfig::default())
}

/// Run the full pipeline for one blob.
///
/// Warnings are concatenated in discovery order: decoding, then the
/// parser, then normalization.
pub fn parse_with_config(
    raw: &RawOutput<'_>,
    tool_hint: Option<&str>,
    config: &ParserConfig,
) -> Result<ParseResult, ParseFailure> {
    let hint = tool_hint
        .or(raw.tool_hint)
        .filter(|h| !h.trim().is_empty());

    let (text, mut warnings) = decode(raw.data)?;
    let hinted = hint
        .map(|h| {
            detection::resolve_hint(h, text)
                .ok_or_else(|| ParseFailure::UnknownToolHint(h.to_string()))
        })
        .transpose()?;
    let format = hinted.unwrap_or_else(|| detection::detect_text(text, raw.source));
    tracing::debug!(
        format = %format,
        hinted = hinted.is_some(),
        source = raw.source.unwrap_or("-"),
        bytes = raw.data.len(),
        "Detected tool output format"
    );

    let output = parser_for(format, config).parse(text);
    let mut result = normalization::normalize(output, config);
    warnings.append(&mut result.warnings);
    result.warnings = warnings;

    tracing::debug!(
        format = %format,
        tool = %result.tool,
        hosts = result.hosts.len(),
        findings = result.findings.len(),
        warnings = result.warnings.len(),
        "Parsed tool output"
    );
    if !result.parse_errors.is_empty() {
        tracing::warn!(
            format = %format,
            source = raw.source.unwrap_or("-"),
            dropped = result.parse_errors.len(),
            "Dropped unparseable records"
        );
    }
    Ok(result)
}

/// Decode input as UTF-8, stripping a BOM. A multi-byte sequence cut off
/// at the very end is dropped with a warning; any other invalid byte is
/// fatal.
fn decode(data: &[u8]) -> Result<(&str, Vec<String>), ParseFailure> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(text) => Ok((text, Vec::new())),
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = std::str::from_utf8(&data[..valid])?;
            let warning = format!(
                "input ends inside a multi-byte UTF-8 sequence; dropped {} trailing bytes",
                data.len() - valid
            );
            Ok((text, vec![warning]))
        }
        Err(e) => Err(e.into()),
    }
}
