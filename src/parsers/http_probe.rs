//! httpx probe result parser (JSON array or JSON lines).
//!
//! Each probe record becomes one host with exactly one port. Status code,
//! content length, title and detected tech are carried as probe fields and
//! end up in the port's `extra_info`.

use serde_json::{Map, Value};
use url::Url;

use crate::parsers::json_records::{parse_object, read_records};
use crate::parsers::{
    first_field, scalar_text, HostRecord, Parser, PortRecord, RecordOrigin, ToolFormat,
    ToolOutput,
};

/// Key spellings seen across httpx releases, newest first.
const STATUS_KEYS: &[&str] = &["status_code", "status-code", "statusCode"];
const LENGTH_KEYS: &[&str] = &["content_length", "content-length", "contentLength"];
const TITLE_KEYS: &[&str] = &["title"];

/// Parser for httpx JSON output.
#[derive(Debug, Default)]
pub struct HttpProbeParser;

impl HttpProbeParser {
    pub fn new() -> Self {
        Self
    }

    fn convert_record(
        &self,
        record: &Map<String, Value>,
        origin: RecordOrigin,
        output: &mut ToolOutput,
    ) -> Option<HostRecord> {
        let url_text = first_field(record, &["url"]);
        let url = url_text.as_deref().and_then(|u| Url::parse(u).ok());
        if let (Some(text), None) = (&url_text, &url) {
            output.warn(format!("{origin}: unparseable url {text:?} ignored"));
        }
        let input = first_field(record, &["input"]);
        let resolved = first_field(record, &["host"]);

        if url.is_none() && input.is_none() && resolved.is_none() {
            output.reject(origin, "url", "record has no url, input or host");
            return None;
        }

        let mut host = HostRecord::new(origin);
        if let Some(name) = url.as_ref().and_then(|u| u.host_str()) {
            host.add_target(name);
        }
        if let Some(input) = input.as_deref() {
            host.add_target(&target_host(input));
        }
        if let Some(resolved) = resolved.as_deref() {
            host.add_target(resolved);
        }
        for key in ["a", "aaaa"] {
            if let Some(Value::Array(ips)) = record.get(key) {
                for ip in ips.iter().filter_map(scalar_text) {
                    host.add_address(None, &ip);
                }
            }
        }

        let scheme = first_field(record, &["scheme"])
            .or_else(|| url.as_ref().map(|u| u.scheme().to_string()));
        let port = first_field(record, &["port"])
            .or_else(|| url.as_ref().and_then(|u| u.port_or_known_default()).map(|p| p.to_string()))
            .unwrap_or_else(|| {
                output.warn(format!("{origin}: no port or URL scheme; assumed 80"));
                "80".to_string()
            });
        let failed = matches!(record.get("failed"), Some(Value::Bool(true)));

        let mut service_fields = Vec::new();
        if let Some(scheme) = scheme {
            service_fields.push(("scheme".to_string(), scheme));
        }
        if let Some(server) = first_field(record, &["webserver"]) {
            service_fields.push(("webserver".to_string(), server));
        }

        let mut probe_fields = Vec::new();
        for keys in [STATUS_KEYS, LENGTH_KEYS, TITLE_KEYS] {
            if let Some((key, value)) = keyed_field(record, keys) {
                probe_fields.push((key.to_string(), value));
            }
        }
        if let Some(Value::Array(tech)) = record.get("tech") {
            let tech: Vec<String> = tech.iter().filter_map(scalar_text).collect();
            if !tech.is_empty() {
                probe_fields.push(("tech".to_string(), tech.join(",")));
            }
        }

        host.status = Some(if failed { "unknown" } else { "up" }.to_string());
        host.ports.push(PortRecord {
            port: Some(port),
            protocol: Some("tcp".to_string()),
            state: Some(if failed { "closed" } else { "open" }.to_string()),
            service_fields,
            probe_fields,
        });
        Some(host)
    }
}

impl Parser for HttpProbeParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let set = read_records(text);
        output.warnings.extend(set.warnings);

        for record in &set.records {
            match parse_object(record) {
                Ok(object) => {
                    if let Some(host) = self.convert_record(&object, record.origin, &mut output) {
                        output.hosts.push(host);
                    }
                }
                Err(err) => output.errors.push(err),
            }
        }
        output
    }

    fn format(&self) -> ToolFormat {
        ToolFormat::HttpProbeJson
    }
}

/// First present key among alternative spellings, with its rendered value.
fn keyed_field<'k>(record: &Map<String, Value>, keys: &[&'k str]) -> Option<(&'k str, String)> {
    keys.iter()
        .find_map(|k| record.get(*k).and_then(scalar_text).map(|v| (*k, v)))
}

/// Host part of an httpx input, which may be a bare name, `name:port`,
/// or a full URL.
fn target_host(input: &str) -> String {
    if input.contains("://") {
        if let Some(host) = Url::parse(input).ok().and_then(|u| u.host_str().map(String::from)) {
            return host;
        }
    }
    let authority = input.split(['/', '?']).next().unwrap_or(input);
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host.to_string()
        }
        _ => authority.to_string(),
    }
}
