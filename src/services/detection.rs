//! Format detection for tool output whose producer the caller did not name.
//!
//! Checks run in a fixed priority order and the first match wins:
//! explicit hint, blank input, XML prefix, JSON parse, tool-specific text
//! markers, the source file name, then the unstructured fallback. JSON whose
//! keys identify no tool consults the source name before guessing from its
//! shape. Detection never fails.

use serde_json::{Map, Value};

use crate::models::RawOutput;
use crate::parsers::subdomain_list::is_hostname;
use crate::parsers::text::{is_banner_line, is_whatweb_line};
use crate::parsers::ToolFormat;

/// Keys only nuclei emits (top level or under `info`).
const VULN_KEYS: &[&str] = &[
    "template-id",
    "templateID",
    "template_id",
    "matcher-name",
    "matched-at",
    "severity",
];
/// Keys of the ffuf `-of json` wrapper object.
const FUZZ_WRAPPER_KEYS: &[&str] = &["commandline", "results"];
const PROBE_KEYS: &[&str] = &[
    "status_code",
    "status-code",
    "statusCode",
    "content_length",
    "content-length",
    "webserver",
    "tech",
    "a",
    "chain_status_codes",
];
/// Per-result ffuf keys, only meaningful next to `status`.
const FUZZ_RESULT_KEYS: &[&str] = &["words", "lines", "length"];

/// Pick the format for a raw blob. A recognized hint is trusted; an
/// unrecognized one is ignored here.
pub fn detect(raw: &RawOutput<'_>) -> ToolFormat {
    let text = String::from_utf8_lossy(raw.data);
    if let Some(format) = raw.tool_hint.and_then(|hint| resolve_hint(hint, &text)) {
        return format;
    }
    detect_text(&text, raw.source)
}

/// Resolve a caller hint to a format. Format identifiers and legacy tool
/// keys map directly; bare `nmap` names a tool that writes both XML and
/// normal text, so the content picks between the two.
pub fn resolve_hint(hint: &str, text: &str) -> Option<ToolFormat> {
    if hint.trim().eq_ignore_ascii_case("nmap") {
        let format = if looks_like_xml(strip_leading(text)) {
            ToolFormat::ScanReportXml
        } else {
            ToolFormat::ScanReportText
        };
        return Some(format);
    }
    ToolFormat::from_hint(hint)
}

/// Content-based detection (every step after the hint).
pub fn detect_text(text: &str, source: Option<&str>) -> ToolFormat {
    let trimmed = strip_leading(text);

    if trimmed.is_empty() {
        return ToolFormat::UnstructuredText;
    }
    if looks_like_xml(trimmed) {
        return ToolFormat::ScanReportXml;
    }
    if let Some(format) = detect_json(trimmed, source) {
        return format;
    }
    if let Some(format) = detect_text_markers(trimmed) {
        return format;
    }
    source
        .and_then(detect_from_source)
        .unwrap_or(ToolFormat::UnstructuredText)
}

fn strip_leading(text: &str) -> &str {
    text.trim_start_matches('\u{feff}').trim_start()
}

fn looks_like_xml(trimmed: &str) -> bool {
    trimmed.starts_with("<?xml")
        || trimmed.starts_with("<nmaprun")
        || trimmed.starts_with("<!DOCTYPE nmaprun")
}

/// Strictly parse the first top-level JSON value. Input that fails only
/// because it ended early still counts as JSON and is classified by the
/// keys present in the text.
fn detect_json(trimmed: &str, source: Option<&str>) -> Option<ToolFormat> {
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return None;
    }
    let is_array = trimmed.starts_with('[');
    let mut values = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();

    let by_keys = match values.next()? {
        Ok(first) => match first_object(&first) {
            Some(object) => classify(|key| object_has(object, key)),
            None => classify(|key| text_has(trimmed, key)),
        },
        Err(e) if e.is_eof() => classify(|key| text_has(trimmed, key)),
        Err(_) => return None,
    };
    let format = by_keys
        .or_else(|| source.and_then(detect_from_source).filter(ToolFormat::is_json))
        .unwrap_or(if is_array {
            ToolFormat::HttpProbeJson
        } else {
            ToolFormat::VulnFindingJsonLines
        });
    Some(format)
}

/// The object whose keys identify the producer: the value itself, or the
/// first object element of an array.
fn first_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(object) => Some(object),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }
}

fn object_has(object: &Map<String, Value>, key: &str) -> bool {
    object.contains_key(key)
        || matches!(object.get("info"), Some(Value::Object(info)) if info.contains_key(key))
}

fn text_has(text: &str, key: &str) -> bool {
    text.contains(&format!("\"{key}\""))
}

/// Identify the producer from the keys it emits, if any set matches.
fn classify(has: impl Fn(&str) -> bool) -> Option<ToolFormat> {
    let any = |keys: &[&str]| keys.iter().any(|&k| has(k));

    let format = if any(VULN_KEYS) {
        ToolFormat::VulnFindingJsonLines
    } else if any(FUZZ_WRAPPER_KEYS) {
        ToolFormat::FuzzResultJson
    } else if any(PROBE_KEYS) {
        ToolFormat::HttpProbeJson
    } else if has("status") && any(FUZZ_RESULT_KEYS) {
        ToolFormat::FuzzResultJson
    } else {
        return None;
    };
    Some(format)
}

fn detect_text_markers(trimmed: &str) -> Option<ToolFormat> {
    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.iter().any(|l| is_nmap_marker(l)) {
        return Some(ToolFormat::ScanReportText);
    }
    if lines.iter().any(|l| is_whatweb_line(l) || is_banner_line(l)) {
        return Some(ToolFormat::BannerText);
    }

    let mut data = lines
        .iter()
        .filter(|l| !l.starts_with('[') && !l.starts_with('#'))
        .peekable();
    if data.peek().is_some() && data.all(|l| is_subdomain_line(l)) {
        return Some(ToolFormat::SubdomainListText);
    }
    None
}

fn is_nmap_marker(line: &str) -> bool {
    if line
        .get(.."Starting Nmap".len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("Starting Nmap"))
    {
        return true;
    }
    if line.starts_with("Nmap scan report for") {
        return true;
    }
    let mut columns = line.split_whitespace();
    columns.next() == Some("PORT")
        && columns.next() == Some("STATE")
        && columns.next() == Some("SERVICE")
}

fn is_subdomain_line(line: &str) -> bool {
    let name = line.split(',').next().unwrap_or_default().trim();
    let name = name.strip_prefix("*.").unwrap_or(name).trim_end_matches('.');
    is_hostname(name)
}

/// Last resort before the fallback: the name of the file the output was
/// read from.
fn detect_from_source(source: &str) -> Option<ToolFormat> {
    let name = source.to_lowercase();
    let format = if name.contains("nmap") {
        if name.ends_with(".xml") {
            ToolFormat::ScanReportXml
        } else {
            ToolFormat::ScanReportText
        }
    } else if name.contains("subfinder") || name.contains("subdomain") {
        ToolFormat::SubdomainListText
    } else if name.contains("httpx") {
        ToolFormat::HttpProbeJson
    } else if name.contains("nuclei") {
        ToolFormat::VulnFindingJsonLines
    } else if name.contains("ffuf") {
        ToolFormat::FuzzResultJson
    } else if name.contains("whatweb") {
        ToolFormat::BannerText
    } else {
        return None;
    };
    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_str(text: &str) -> ToolFormat {
        detect_text(text, None)
    }

    #[test]
    fn hint_wins_over_content() {
        let raw = RawOutput::from_text("<?xml version=\"1.0\"?><nmaprun/>").with_hint("nuclei");
        assert_eq!(detect(&raw), ToolFormat::VulnFindingJsonLines);
    }

    #[test]
    fn unrecognized_hint_falls_through_to_content() {
        let raw = RawOutput::from_text("<nmaprun></nmaprun>").with_hint("masscan");
        assert_eq!(detect(&raw), ToolFormat::ScanReportXml);
    }

    #[test]
    fn xml_prefixes() {
        assert_eq!(detect_str("  <?xml version=\"1.0\"?>"), ToolFormat::ScanReportXml);
        assert_eq!(detect_str("\u{feff}<nmaprun scanner=\"nmap\">"), ToolFormat::ScanReportXml);
        assert_eq!(detect_str("<!DOCTYPE nmaprun>\n<nmaprun>"), ToolFormat::ScanReportXml);
    }

    #[test]
    fn json_shapes() {
        assert_eq!(
            detect_str(r#"{"template-id":"x","info":{"severity":"low"}}"#),
            ToolFormat::VulnFindingJsonLines
        );
        assert_eq!(
            detect_str(r#"{"url":"https://a.example","status_code":200}"#),
            ToolFormat::HttpProbeJson
        );
        assert_eq!(
            detect_str(r#"[{"url":"https://a.example","status_code":200}]"#),
            ToolFormat::HttpProbeJson
        );
        assert_eq!(
            detect_str(r#"{"commandline":"ffuf","results":[]}"#),
            ToolFormat::FuzzResultJson
        );
        assert_eq!(
            detect_str(r#"[{"url":"https://a.example/x","status":200,"words":3}]"#),
            ToolFormat::FuzzResultJson
        );
    }

    #[test]
    fn unrecognized_json_falls_back_by_shape() {
        assert_eq!(detect_str(r#"[{"foo":1}]"#), ToolFormat::HttpProbeJson);
        assert_eq!(detect_str(r#"{"foo":1}"#), ToolFormat::VulnFindingJsonLines);
    }

    #[test]
    fn truncated_json_is_still_json() {
        assert_eq!(
            detect_str(r#"{"commandline":"ffuf -u x","results":[{"input":{"FUZZ":"adm"#),
            ToolFormat::FuzzResultJson
        );
        assert_eq!(detect_str(r#"[{"url":"https://a.example","status_code":2"#), ToolFormat::HttpProbeJson);
    }

    #[test]
    fn invalid_json_falls_through() {
        assert_eq!(
            detect_str("[INF] Enumerating subdomains for example.com\nwww.example.com\n"),
            ToolFormat::SubdomainListText
        );
    }

    #[test]
    fn nmap_text_markers() {
        assert_eq!(
            detect_str("Starting Nmap 7.94 ( https://nmap.org )\n"),
            ToolFormat::ScanReportText
        );
        assert_eq!(
            detect_str("PORT   STATE SERVICE\n22/tcp open  ssh\n"),
            ToolFormat::ScanReportText
        );
    }

    #[test]
    fn banner_lines() {
        assert_eq!(
            detect_str("https://www.example.com [200 OK] HTTPServer[nginx]\n"),
            ToolFormat::BannerText
        );
        assert_eq!(
            detect_str("198.51.100.7:22 SSH-2.0-OpenSSH_8.2p1\n"),
            ToolFormat::BannerText
        );
    }

    #[test]
    fn subdomain_list_requires_every_line_to_be_a_name() {
        assert_eq!(
            detect_str("www.example.com\napi.example.com,198.51.100.7\n"),
            ToolFormat::SubdomainListText
        );
        assert_eq!(
            detect_str("www.example.com\nthis is prose\n"),
            ToolFormat::UnstructuredText
        );
    }

    #[test]
    fn source_name_is_consulted_last() {
        assert_eq!(detect_text("scan log", Some("out/nmap-run.txt")), ToolFormat::ScanReportText);
        assert_eq!(detect_text("scan log", Some("ffuf.json")), ToolFormat::FuzzResultJson);
        assert_eq!(
            detect_text("www.example.com\n", Some("nmap.txt")),
            ToolFormat::SubdomainListText
        );
    }

    #[test]
    fn empty_input_is_unstructured() {
        assert_eq!(detect_str(""), ToolFormat::UnstructuredText);
        assert_eq!(detect_str(" \n\t"), ToolFormat::UnstructuredText);
    }

    #[test]
    fn blank_input_ignores_the_source_name() {
        assert_eq!(detect_text("", Some("nmap.xml")), ToolFormat::UnstructuredText);
        assert_eq!(detect_text("\n  \n", Some("ffuf.json")), ToolFormat::UnstructuredText);
    }

    #[test]
    fn unidentified_json_prefers_the_source_name_over_its_shape() {
        let cut = r#"{"timestamp":"2024-05-01T10:05:00Z","port":"443","ur"#;
        assert_eq!(detect_text(cut, Some("httpx-out.jsonl")), ToolFormat::HttpProbeJson);
        assert_eq!(detect_text(r#"[{"input":{"FUZ"#, Some("ffuf.json")), ToolFormat::FuzzResultJson);
        assert_eq!(detect_text(r#"{"foo":1}"#, Some("nmap.txt")), ToolFormat::VulnFindingJsonLines);
    }

    #[test]
    fn bare_nmap_hint_follows_the_content() {
        assert_eq!(resolve_hint("nmap", "<?xml version=\"1.0\"?>"), Some(ToolFormat::ScanReportXml));
        assert_eq!(
            resolve_hint("NMAP", "Starting Nmap 7.94\n22/tcp open ssh\n"),
            Some(ToolFormat::ScanReportText)
        );
        assert_eq!(resolve_hint("nmap_xml", "22/tcp open ssh"), Some(ToolFormat::ScanReportXml));
        assert_eq!(resolve_hint("masscan", "22/tcp open ssh"), None);

        let raw = RawOutput::from_text("Nmap scan report for 198.51.100.7\n").with_hint("nmap");
        assert_eq!(detect(&raw), ToolFormat::ScanReportText);
    }
}
