//! Line-oriented fallback parser shared by nmap normal output, banner text
//! and unstructured text.
//!
//! An ordered list of matchers is tried against each line; the first hit
//! wins. Lines nothing matches are progress chatter and are skipped without
//! comment.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::parsers::{HostRecord, Parser, PortRecord, RecordOrigin, ToolFormat, ToolOutput};

struct Patterns {
    ansi: Regex,
    starting: Regex,
    report_header: Regex,
    host_status: Regex,
    mac: Regex,
    port_line: Regex,
    whatweb: Regex,
    banner_grab: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        ansi: Regex::new(r"\x1b\[[0-9;]*m").expect("ansi regex compiles"),
        starting: Regex::new(r"(?i)^Starting Nmap (\S+)").expect("starting regex compiles"),
        report_header: Regex::new(r"^Nmap scan report for (\S+)(?: \(([^)]+)\))?")
            .expect("header regex compiles"),
        host_status: Regex::new(r"^(?:Note: )?Host (is up|seems down|is down)")
            .expect("status regex compiles"),
        mac: Regex::new(r"^MAC Address: ([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})(?: \((.+)\))?")
            .expect("mac regex compiles"),
        port_line: Regex::new(
            r"^(\d+)/([a-z]+)\s+(open\|filtered|closed\|filtered|open|closed|filtered|unfiltered)\s+(\S+)(?:\s+(.+))?$",
        )
        .expect("port regex compiles"),
        whatweb: Regex::new(r"^(\S+://\S+) \[(\d{3})(?: [^\]]*)?\](.*)$")
            .expect("whatweb regex compiles"),
        banner_grab: Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9._-]+):(\d{1,5})\s+(\S.*)$")
            .expect("banner regex compiles"),
    })
}

/// Whether a line looks like a WhatWeb result.
pub(crate) fn is_whatweb_line(line: &str) -> bool {
    let line = patterns().ansi.replace_all(line.trim(), "");
    patterns().whatweb.is_match(&line)
}

/// Whether a line looks like `host:port banner` from a banner grab.
pub(crate) fn is_banner_line(line: &str) -> bool {
    banner_grab(line.trim()).is_some()
}

/// Split a banner-grab line into host, port and banner. The host must look
/// like a network name so that ordinary `key: value` prose does not match.
fn banner_grab(line: &str) -> Option<(&str, &str, &str)> {
    let caps = patterns().banner_grab.captures(line)?;
    let host = caps.get(1)?.as_str();
    let plausible = host.contains('.') || host.starts_with('[') || host.eq_ignore_ascii_case("localhost");
    if !plausible {
        return None;
    }
    Some((host, caps.get(2)?.as_str(), caps.get(3)?.as_str()))
}

/// Parser for the three line-oriented formats.
#[derive(Debug)]
pub struct TextParser {
    format: ToolFormat,
}

impl TextParser {
    pub fn new(format: ToolFormat) -> Self {
        Self { format }
    }
}

impl Parser for TextParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let mut scan = ScanState::default();

        for (n, raw_line) in text.lines().enumerate() {
            let line = patterns().ansi.replace_all(raw_line.trim_end(), "");
            let line = line.trim_start();
            if line.is_empty() {
                continue;
            }
            scan.line(line, n + 1, self.format, &mut output);
        }
        scan.flush(&mut output);

        // Only a scan report promises host sections; other text may hold none.
        if self.format == ToolFormat::ScanReportText
            && output.hosts.is_empty()
            && !text.trim().is_empty()
        {
            output.warn("no host sections found in scan report text");
        }
        output
    }

    fn format(&self) -> ToolFormat {
        self.format
    }
}

#[derive(Default)]
struct ScanState {
    current: Option<HostRecord>,
    records: usize,
}

impl ScanState {
    fn next_origin(&mut self, line: usize) -> RecordOrigin {
        let origin = RecordOrigin::at_line(self.records, line);
        self.records += 1;
        origin
    }

    fn flush(&mut self, output: &mut ToolOutput) {
        if let Some(host) = self.current.take() {
            output.hosts.push(host);
        }
    }

    fn line(&mut self, line: &str, line_no: usize, format: ToolFormat, output: &mut ToolOutput) {
        let p = patterns();

        if let Some(caps) = p.starting.captures(line) {
            output.source_tool_version = caps.get(1).map(|m| m.as_str().to_string());
        } else if let Some(caps) = p.report_header.captures(line) {
            self.flush(output);
            let mut host = HostRecord::new(self.next_origin(line_no));
            for group in [1, 2] {
                if let Some(target) = caps.get(group) {
                    host.add_target(target.as_str());
                }
            }
            self.current = Some(host);
        } else if let Some(caps) = p.host_status.captures(line) {
            if let Some(host) = self.current.as_mut() {
                let state = if &caps[1] == "is up" { "up" } else { "down" };
                host.status = Some(state.to_string());
            }
        } else if let Some(caps) = p.mac.captures(line) {
            if let Some(host) = self.current.as_mut() {
                host.add_address(Some("mac"), &caps[1]);
            }
        } else if let Some(caps) = p.port_line.captures(line) {
            let port = port_from_columns(&caps[1], &caps[2], &caps[3], &caps[4], caps.get(5).map(|m| m.as_str()));
            if self.current.is_none() {
                let origin = self.next_origin(line_no);
                if format == ToolFormat::ScanReportText {
                    output.warn(format!(
                        "{origin}: port lines before any scan report header; collected under an unnamed host"
                    ));
                }
                self.current = Some(HostRecord::new(origin));
            }
            if let Some(host) = self.current.as_mut() {
                host.ports.push(port);
            }
        } else if let Some(caps) = p.whatweb.captures(line) {
            let origin = self.next_origin(line_no);
            if let Some(host) = whatweb_host(&caps[1], &caps[2], &caps[3], origin, output) {
                output.hosts.push(host);
            }
        } else if let Some((target, port, banner)) = banner_grab(line) {
            let origin = self.next_origin(line_no);
            output.hosts.push(banner_host(target, port, banner, origin));
        }
    }
}

fn port_from_columns(
    port: &str,
    protocol: &str,
    state: &str,
    service: &str,
    version: Option<&str>,
) -> PortRecord {
    let mut service_fields = Vec::new();
    let name = service.trim_end_matches('?');
    if !name.is_empty() && name != "unknown" {
        service_fields.push(("name".to_string(), name.to_string()));
    }
    if let Some(version) = version {
        service_fields.extend(split_version_column(version));
    }
    PortRecord {
        port: Some(port.to_string()),
        protocol: Some(protocol.to_string()),
        state: Some(state.to_string()),
        service_fields,
        probe_fields: Vec::new(),
    }
}

/// Split nmap's VERSION column into product, version and extra info.
///
/// The first token starting with a digit is the version; everything before
/// it is the product, everything after it (parentheses removed) is extra.
fn split_version_column(column: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = column.split_whitespace().collect();
    let mut fields = Vec::new();
    let Some(at) = tokens
        .iter()
        .position(|t| t.starts_with(|c: char| c.is_ascii_digit()))
    else {
        fields.push(("product".to_string(), tokens.join(" ")));
        return fields;
    };

    if at > 0 {
        fields.push(("product".to_string(), tokens[..at].join(" ")));
    }
    fields.push(("version".to_string(), tokens[at].to_string()));
    let extra = tokens[at + 1..]
        .join(" ")
        .replace(['(', ')'], "")
        .trim()
        .to_string();
    if !extra.is_empty() {
        fields.push(("extrainfo".to_string(), extra));
    }
    fields
}

/// Build a host from `URL [status] Plugin[value], Plugin[value], ...`.
fn whatweb_host(
    url: &str,
    status: &str,
    plugins: &str,
    origin: RecordOrigin,
    output: &mut ToolOutput,
) -> Option<HostRecord> {
    let Ok(parsed) = Url::parse(url) else {
        output.reject(origin, "url", format!("unparseable url {url:?}"));
        return None;
    };
    let Some(name) = parsed.host_str() else {
        output.reject(origin, "url", format!("url has no host: {url:?}"));
        return None;
    };

    let mut host = HostRecord::new(origin);
    host.add_target(name);
    host.status = Some("up".to_string());

    let mut service_fields = vec![("scheme".to_string(), parsed.scheme().to_string())];
    let mut probe_fields = vec![("status_code".to_string(), status.to_string())];
    let mut tech = Vec::new();

    for plugin in split_plugins(plugins) {
        let (plugin_name, value) = match plugin.split_once('[') {
            Some((n, rest)) => (n.trim(), rest.strip_suffix(']').unwrap_or(rest).trim()),
            None => (plugin.trim(), ""),
        };
        match plugin_name {
            "IP" => host.add_target(value),
            // HTTPServer[os][server string]: the server string comes last.
            "HTTPServer" if !value.is_empty() => {
                let server = value.rsplit("][").next().unwrap_or(value);
                service_fields.push(("server".to_string(), server.to_string()))
            }
            "Title" if !value.is_empty() => probe_fields.push(("title".to_string(), value.to_string())),
            "" => {}
            _ if value.is_empty() => tech.push(plugin_name.to_string()),
            _ => tech.push(format!("{plugin_name}[{value}]")),
        }
    }
    if !tech.is_empty() {
        probe_fields.push(("tech".to_string(), tech.join(",")));
    }

    let port = parsed.port_or_known_default().map(|p| p.to_string());
    if port.is_none() {
        output.warn(format!("{origin}: no port for scheme {:?}; port omitted", parsed.scheme()));
        return Some(host);
    }
    host.ports.push(PortRecord {
        port,
        protocol: Some("tcp".to_string()),
        state: Some("open".to_string()),
        service_fields,
        probe_fields,
    });
    Some(host)
}

/// Split the plugin list on commas that are not inside brackets.
fn split_plugins(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn banner_host(target: &str, port: &str, banner: &str, origin: RecordOrigin) -> HostRecord {
    let mut host = HostRecord::new(origin);
    host.add_target(target);
    host.status = Some("up".to_string());

    let banner = banner.trim();
    let mut service_fields = Vec::new();
    if let Some(software) = banner.strip_prefix("SSH-") {
        service_fields.push(("name".to_string(), "ssh".to_string()));
        // SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5
        let software = software.split_once('-').map_or(software, |(_, s)| s);
        let (product, rest) = software.split_once(' ').unwrap_or((software, ""));
        match product.split_once('_') {
            Some((name, version)) => {
                service_fields.push(("product".to_string(), name.to_string()));
                service_fields.push(("version".to_string(), version.to_string()));
            }
            None => service_fields.push(("product".to_string(), product.to_string())),
        }
        if !rest.trim().is_empty() {
            service_fields.push(("extrainfo".to_string(), rest.trim().to_string()));
        }
    } else {
        if banner.starts_with("HTTP/") {
            service_fields.push(("name".to_string(), "http".to_string()));
        }
        service_fields.push(("extrainfo".to_string(), banner.to_string()));
    }

    host.ports.push(PortRecord {
        port: Some(port.to_string()),
        protocol: Some("tcp".to_string()),
        state: Some("open".to_string()),
        service_fields,
        probe_fields: Vec::new(),
    });
    host
}
