//! Normalization layer: tool-specific records into the canonical schema.
//!
//! Field-name variants are unified, ports and status codes coerced to
//! integers, and missing optional data filled with defaults. A value that
//! cannot be coerced degrades to absent with a warning; only a port whose
//! number is unusable is dropped, and its host survives.

use crate::config::ParserConfig;
use crate::models::{
    Address, AddressType, HostStatus, OsGuess, ParseResult, ParsedFinding, ParsedHost, ParsedPort,
    PortState, Protocol, ServiceInfo, SeverityLevel,
};
use crate::parsers::{FindingRecord, HostRecord, PortRecord, RecordOrigin, ToolOutput};
use crate::services::{deduplication, fingerprint};

/// Probe facts whose values must be integers.
const NUMERIC_PROBE_KEYS: &[&str] = &["status_code", "content_length"];

/// Convert a parser's output into a [`ParseResult`].
///
/// Warnings keep discovery order: the parser's first, then those raised
/// here. Parser errors are rendered as `"<origin>: <field>: <message>"`.
pub fn normalize(output: ToolOutput, config: &ParserConfig) -> ParseResult {
    let ToolOutput {
        source_tool,
        source_tool_version,
        scan_info,
        format,
        hosts,
        findings,
        mut warnings,
        errors,
    } = output;

    let hosts: Vec<ParsedHost> = hosts
        .into_iter()
        .map(|record| normalize_host(record, &mut warnings))
        .collect();
    let hosts = deduplication::merge_hosts(hosts);

    let findings = findings
        .into_iter()
        .map(|record| normalize_finding(record, &source_tool, config, &mut warnings))
        .collect();

    ParseResult {
        tool: source_tool,
        tool_version: source_tool_version,
        scan_info,
        format,
        hosts,
        findings,
        warnings,
        parse_errors: errors.iter().map(ToString::to_string).collect(),
    }
}

fn normalize_host(record: HostRecord, warnings: &mut Vec<String>) -> ParsedHost {
    let origin = record.origin;

    let mut addresses: Vec<Address> = Vec::new();
    for address in record.addresses {
        let Some(inferred) = AddressType::infer(&address.value) else {
            warnings.push(format!("{origin}: dropped unrecognized address {:?}", address.value));
            continue;
        };
        let addr_type = address
            .addr_type
            .as_deref()
            .and_then(AddressType::from_tool)
            .unwrap_or(inferred);
        if !addresses.iter().any(|a| a.value == address.value) {
            addresses.push(Address {
                addr_type,
                value: address.value,
            });
        }
    }

    let mut hostnames: Vec<String> = Vec::new();
    for name in record.hostnames {
        if !hostnames.iter().any(|h| h.eq_ignore_ascii_case(&name)) {
            hostnames.push(name);
        }
    }

    let ports = record
        .ports
        .into_iter()
        .filter_map(|port| normalize_port(port, origin, warnings))
        .collect();

    let os_guesses = record
        .os_guesses
        .into_iter()
        .map(|(name, accuracy)| {
            let accuracy = accuracy.and_then(|raw| {
                let value = coerce_integer(&raw)
                    .filter(|v| (0..=100).contains(v))
                    .and_then(|v| u8::try_from(v).ok());
                if value.is_none() {
                    warnings.push(format!("{origin}: ignored OS accuracy {raw:?}"));
                }
                value
            });
            OsGuess { name, accuracy }
        })
        .collect();

    ParsedHost {
        addresses,
        hostnames,
        ports,
        status: record
            .status
            .as_deref()
            .map(HostStatus::from_tool)
            .unwrap_or(HostStatus::Unknown),
        os_guesses,
    }
}

fn normalize_port(
    record: PortRecord,
    origin: RecordOrigin,
    warnings: &mut Vec<String>,
) -> Option<ParsedPort> {
    let Some(raw_port) = record.port else {
        warnings.push(format!("{origin}: dropped port without a number"));
        return None;
    };
    let Some(port_number) = coerce_port(&raw_port) else {
        warnings.push(format!("{origin}: dropped port with invalid number {raw_port:?}"));
        return None;
    };

    let protocol = match record.protocol.as_deref() {
        Some(p) => Protocol::from_tool(p),
        None => Protocol::Tcp,
    };
    let state = record
        .state
        .as_deref()
        .map(PortState::from_tool)
        .unwrap_or(PortState::Unknown);

    let mut service = unify_service(&record.service_fields);
    let probe = render_probe_fields(&record.probe_fields, origin, port_number, warnings);
    if !probe.is_empty() {
        service.extra_info = Some(match service.extra_info.take() {
            Some(existing) => format!("{existing}; {probe}"),
            None => probe,
        });
    }

    Some(ParsedPort {
        port_number,
        protocol,
        state,
        service,
    })
}

/// Canonical service key for a tool-specific attribute name.
fn service_key(key: &str) -> Option<ServiceKey> {
    match key.trim().to_lowercase().replace('-', "_").as_str() {
        "name" | "service" | "service_name" | "scheme" => Some(ServiceKey::Name),
        "product" | "webserver" | "server" => Some(ServiceKey::Product),
        "version" | "product_version" => Some(ServiceKey::Version),
        "extrainfo" | "extra_info" => Some(ServiceKey::ExtraInfo),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum ServiceKey {
    Name,
    Product,
    Version,
    ExtraInfo,
}

/// Fold tool-specific service attributes into [`ServiceInfo`]. The first
/// spelling seen for a key wins; unknown keys and blank values are ignored.
fn unify_service(fields: &[(String, String)]) -> ServiceInfo {
    let mut service = ServiceInfo::default();
    for (key, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let slot = match service_key(key) {
            Some(ServiceKey::Name) => &mut service.name,
            Some(ServiceKey::Product) => &mut service.product,
            Some(ServiceKey::Version) => &mut service.version,
            Some(ServiceKey::ExtraInfo) => &mut service.extra_info,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
    service
}

/// `statusCode`, `status-code` and `status_code` all become `status_code`.
fn probe_key(key: &str) -> String {
    let compact: String = key
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();
    match compact.as_str() {
        "statuscode" | "status" => "status_code".to_string(),
        "contentlength" | "length" => "content_length".to_string(),
        _ => key.trim().to_lowercase().replace('-', "_"),
    }
}

/// Render probe facts as `key=value; key=value`, coercing numeric keys.
fn render_probe_fields(
    fields: &[(String, String)],
    origin: RecordOrigin,
    port: u16,
    warnings: &mut Vec<String>,
) -> String {
    let mut rendered: Vec<String> = Vec::new();
    for (key, value) in fields {
        let key = probe_key(key);
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if NUMERIC_PROBE_KEYS.contains(&key.as_str()) {
            match coerce_integer(value) {
                Some(number) => rendered.push(format!("{key}={number}")),
                None => warnings.push(format!(
                    "{origin}: port {port}: non-numeric {key} {value:?} ignored"
                )),
            }
        } else {
            rendered.push(format!("{key}={value}"));
        }
    }
    rendered.join("; ")
}

fn normalize_finding(
    record: FindingRecord,
    tool: &str,
    config: &ParserConfig,
    warnings: &mut Vec<String>,
) -> ParsedFinding {
    let origin = record.origin;

    let severity = match record.severity.as_deref() {
        Some(raw) => SeverityLevel::from_tool(raw).unwrap_or_else(|| {
            warnings.push(format!("{origin}: unknown severity {raw:?}; set to unknown"));
            SeverityLevel::Unknown
        }),
        None => {
            warnings.push(format!("{origin}: missing severity; set to unknown"));
            SeverityLevel::Unknown
        }
    };

    let matched_target = record.matched_target.unwrap_or_else(|| {
        warnings.push(format!("{origin}: finding has no matched target"));
        String::new()
    });

    let mut description = record.description.unwrap_or_default();
    if description.chars().count() > config.max_description_len {
        description = truncate_chars(&description, config.max_description_len);
        warnings.push(format!(
            "{origin}: description truncated to {} characters",
            config.max_description_len
        ));
    }

    let identifier = record.identifier.unwrap_or_else(|| {
        let discriminator = record.title.as_deref().unwrap_or(description.as_str());
        fingerprint::synthesize_id(tool, &matched_target, discriminator)
    });
    let fingerprint = fingerprint::compute_finding(tool, &identifier, &matched_target);

    ParsedFinding {
        identifier,
        title: record.title,
        severity,
        matched_target,
        description,
        fingerprint,
        raw_tool_metadata: record.raw,
        notes: Vec::new(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Read an integer the way tools print them: `"200"`, `" 443 "` or `"200.0"`.
pub(crate) fn coerce_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    let in_range = value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15;
    // Guarded above, so the cast is exact.
    in_range.then_some(value as i64)
}

/// A port number in 1–65535.
pub(crate) fn coerce_port(raw: &str) -> Option<u16> {
    coerce_integer(raw)
        .and_then(|v| u16::try_from(v).ok())
        .filter(|p| *p != 0)
}
