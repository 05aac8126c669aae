//! Subdomain enumerator output: one hostname per line.
//!
//! subfinder's `-oI` mode appends the resolved address (`name,ip[,source]`);
//! that address is kept. Banner and comment lines are skipped.

use std::net::IpAddr;

use crate::parsers::{HostRecord, Parser, RecordOrigin, ToolFormat, ToolOutput};

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Default)]
pub struct SubdomainListParser;

impl SubdomainListParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for SubdomainListParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let mut index = 0;

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('[') || line.starts_with('#') {
                continue;
            }
            let origin = RecordOrigin::at_line(index, n + 1);
            index += 1;

            let mut fields = line.split(',').map(str::trim);
            let name = fields.next().unwrap_or_default();
            let name = name.strip_prefix("*.").unwrap_or(name).trim_end_matches('.');
            if !is_hostname(name) {
                output.reject(origin, "hostname", format!("not a valid hostname: {name:?}"));
                continue;
            }

            let mut host = HostRecord::new(origin);
            host.add_target(name);
            host.status = Some("unknown".to_string());
            if let Some(ip) = fields.next().filter(|f| !f.is_empty()) {
                if ip.parse::<IpAddr>().is_ok() {
                    host.add_address(None, ip);
                } else {
                    output.warn(format!("{origin}: ignored unparseable address {ip:?}"));
                }
            }
            output.hosts.push(host);
        }
        output
    }

    fn format(&self) -> ToolFormat {
        ToolFormat::SubdomainListText
    }
}

/// A dotted DNS name: labels of letters, digits, `-` or `_`, no label
/// starting or ending with `-`.
pub(crate) fn is_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN || !name.contains('.') {
        return false;
    }
    if name.parse::<IpAddr>().is_ok() {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}
