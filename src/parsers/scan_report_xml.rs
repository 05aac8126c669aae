//! Nmap XML (`-oX`) scan report parser.
//!
//! Walks the document as an event stream rather than deserializing it whole,
//! so a report cut off mid-scan still yields every host that was closed
//! before the cut. Attributes are kept as the tool wrote them; coercion
//! happens during normalization.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::parsers::{HostRecord, Parser, PortRecord, RecordOrigin, ToolFormat, ToolOutput};

/// Parser for nmap XML reports.
#[derive(Debug, Default)]
pub struct ScanReportXmlParser;

impl ScanReportXmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for ScanReportXmlParser {
    fn parse(&self, text: &str) -> ToolOutput {
        let mut output = ToolOutput::new(self.source_tool(), self.format());
        let mut walk = Walk::new(text);
        let mut reader = Reader::from_str(text);

        let failure = loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    walk.seek(reader.buffer_position());
                    walk.open(&e, &mut output);
                }
                Ok(Event::Empty(e)) => {
                    walk.seek(reader.buffer_position());
                    walk.open(&e, &mut output);
                    let qname = e.name();
                    walk.close(qname.as_ref(), &mut output);
                }
                Ok(Event::End(e)) => {
                    let qname = e.name();
                    walk.close(qname.as_ref(), &mut output);
                }
                Ok(Event::Eof) => break None,
                Ok(_) => {}
                Err(e) => {
                    walk.seek(reader.buffer_position());
                    break Some(format!("XML error near line {}: {e}", walk.line));
                }
            }
        };

        walk.finish(failure, &mut output);
        output
    }

    fn format(&self) -> ToolFormat {
        ToolFormat::ScanReportXml
    }
}

/// Position in the element tree plus the records under construction.
struct Walk<'a> {
    text: &'a str,
    scanned_to: usize,
    line: usize,
    saw_root: bool,
    root_closed: bool,
    hosts_seen: usize,
    host: Option<HostRecord>,
    port: Option<PortRecord>,
}

impl<'a> Walk<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            scanned_to: 0,
            line: 1,
            saw_root: false,
            root_closed: false,
            hosts_seen: 0,
            host: None,
            port: None,
        }
    }

    /// Advance the line counter to the reader's byte position.
    fn seek<P>(&mut self, position: P)
    where
        usize: TryFrom<P>,
    {
        let target = usize::try_from(position)
            .unwrap_or(usize::MAX)
            .min(self.text.len());
        if target > self.scanned_to {
            self.line += self.text.as_bytes()[self.scanned_to..target]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.scanned_to = target;
        }
    }

    fn open(&mut self, element: &BytesStart<'_>, output: &mut ToolOutput) {
        let attrs = attributes(element, output);
        let qname = element.name();
        match qname.as_ref() {
            b"nmaprun" => {
                self.saw_root = true;
                if let Some(scanner) = attr(&attrs, "scanner") {
                    output.source_tool = scanner.to_string();
                }
                output.source_tool_version = attr(&attrs, "version").map(String::from);
            }
            b"scaninfo" => {
                for (key, value) in attrs {
                    output.scan_info.entry(key).or_insert(value);
                }
            }
            b"host" => {
                if let Some(previous) = self.host.take() {
                    output.reject(previous.origin, "host", "host element never closed; dropped");
                }
                self.host = Some(HostRecord::new(RecordOrigin::at_line(
                    self.hosts_seen,
                    self.line,
                )));
                self.hosts_seen += 1;
            }
            b"port" if self.host.is_some() => {
                self.port = Some(PortRecord {
                    port: attr(&attrs, "portid").map(String::from),
                    protocol: attr(&attrs, "protocol").map(String::from),
                    ..PortRecord::default()
                });
            }
            b"state" => {
                if let Some(port) = self.port.as_mut() {
                    port.state = attr(&attrs, "state").map(String::from);
                }
            }
            b"service" => {
                if let Some(port) = self.port.as_mut() {
                    port.service_fields = attrs
                        .into_iter()
                        .filter(|(_, v)| !v.trim().is_empty())
                        .collect();
                }
            }
            _ => self.open_host_child(qname.as_ref(), &attrs, output),
        }
    }

    fn open_host_child(&mut self, name: &[u8], attrs: &[(String, String)], output: &mut ToolOutput) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        match name {
            b"status" => host.status = attr(attrs, "state").map(String::from),
            b"address" => match attr(attrs, "addr") {
                Some(addr) => host.add_address(attr(attrs, "addrtype"), addr),
                None => output.warn(format!("{}: address element without addr attribute", host.origin)),
            },
            b"hostname" => {
                if let Some(name) = attr(attrs, "name") {
                    host.add_target(name);
                }
            }
            b"osmatch" => {
                if let Some(name) = attr(attrs, "name") {
                    host.os_guesses
                        .push((name.to_string(), attr(attrs, "accuracy").map(String::from)));
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8], output: &mut ToolOutput) {
        match name {
            b"port" => {
                if let (Some(port), Some(host)) = (self.port.take(), self.host.as_mut()) {
                    host.ports.push(port);
                }
            }
            b"host" => {
                if let Some(mut host) = self.host.take() {
                    if host.addresses.is_empty() {
                        output.warn(format!(
                            "{}: host has no address; status set to unknown",
                            host.origin
                        ));
                        host.status = Some("unknown".to_string());
                    }
                    output.hosts.push(host);
                }
            }
            b"nmaprun" => self.root_closed = true,
            _ => {}
        }
    }

    fn finish(self, failure: Option<String>, output: &mut ToolOutput) {
        let reason = failure
            .clone()
            .unwrap_or_else(|| "input ended".to_string());
        if let Some(host) = self.host {
            output.reject(
                host.origin,
                "host",
                format!("{reason} inside host element; partial host dropped"),
            );
        } else {
            if let Some(message) = failure {
                output.warn(format!("{message}; remaining content ignored"));
            }
            if self.saw_root && !self.root_closed {
                output.warn("document ended before </nmaprun>; input appears truncated");
            }
        }
        if !self.saw_root {
            output.warn("no <nmaprun> root element found");
        }
    }
}

/// Decode every attribute, unescaping entities. Malformed attributes are
/// skipped with a warning.
fn attributes(element: &BytesStart<'_>, output: &mut ToolOutput) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for attribute in element.attributes() {
        match attribute {
            Ok(attribute) => {
                let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                let raw = String::from_utf8_lossy(&attribute.value);
                let value = match quick_xml::escape::unescape(&raw) {
                    Ok(value) => value.into_owned(),
                    Err(_) => raw.to_string(),
                };
                attrs.push((key, value));
            }
            Err(e) => output.warn(format!("skipped malformed XML attribute: {e}")),
        }
    }
    attrs
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sV -oX - 198.51.100.7" version="7.94" xmloutputversion="1.05">
<scaninfo type="syn" protocol="tcp" numservices="1000" services="1-1000"/>
<host starttime="1700000000" endtime="1700000010">
<status state="up" reason="echo-reply" reason_ttl="54"/>
<address addr="198.51.100.7" addrtype="ipv4"/>
<address addr="00:11:22:33:44:55" addrtype="mac" vendor="Acme"/>
<hostnames><hostname name="www.example.com" type="PTR"/></hostnames>
<ports>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="54"/><service name="http" product="nginx" version="1.18.0" extrainfo="Ubuntu" method="probed" conf="10"/></port>
<port protocol="tcp" portid="443"><state state="closed" reason="reset" reason_ttl="54"/><service name="https" method="table" conf="3"/></port>
</ports>
<os><osmatch name="Linux 5.4" accuracy="96" line="1"/></os>
</host>
<host><status state="down" reason="no-response" reason_ttl="0"/></host>
<runstats><finished time="1700000011"/><hosts up="1" down="1" total="2"/></runstats>
</nmaprun>
"#;

    #[test]
    fn parses_hosts_ports_and_services() {
        let output = ScanReportXmlParser::new().parse(REPORT);
        assert_eq!(output.source_tool, "nmap");
        assert_eq!(output.source_tool_version.as_deref(), Some("7.94"));
        assert_eq!(output.scan_info.get("type").map(String::as_str), Some("syn"));
        assert_eq!(output.scan_info.get("services").map(String::as_str), Some("1-1000"));
        assert_eq!(output.hosts.len(), 2);
        assert!(output.errors.is_empty());

        let host = &output.hosts[0];
        assert_eq!(host.status.as_deref(), Some("up"));
        assert_eq!(host.addresses.len(), 2);
        assert_eq!(host.addresses[0].value, "198.51.100.7");
        assert_eq!(host.hostnames, vec!["www.example.com".to_string()]);
        assert_eq!(host.ports.len(), 2);
        assert_eq!(host.ports[0].port.as_deref(), Some("80"));
        assert_eq!(host.ports[0].state.as_deref(), Some("open"));
        assert!(host.ports[0]
            .service_fields
            .contains(&("product".to_string(), "nginx".to_string())));
        assert_eq!(host.os_guesses[0], ("Linux 5.4".to_string(), Some("96".to_string())));
    }

    #[test]
    fn host_without_address_gets_unknown_status_and_warning() {
        let output = ScanReportXmlParser::new().parse(REPORT);
        let down = &output.hosts[1];
        assert_eq!(down.status.as_deref(), Some("unknown"));
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("host has no address"));
    }

    #[test]
    fn truncated_report_keeps_closed_hosts() {
        let cut = REPORT.find("<host><status state=\"down\"").unwrap() + 10;
        let output = ScanReportXmlParser::new().parse(&REPORT[..cut]);
        assert_eq!(output.hosts.len(), 1);
        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].message.contains("partial host dropped"));
    }

    #[test]
    fn truncated_between_hosts_warns() {
        let cut = REPORT.find("<runstats>").unwrap();
        let output = ScanReportXmlParser::new().parse(&REPORT[..cut]);
        assert_eq!(output.hosts.len(), 2);
        assert!(output.errors.is_empty());
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("input appears truncated")));
    }

    #[test]
    fn missing_root_warns() {
        let output = ScanReportXmlParser::new().parse("<?xml version=\"1.0\"?><report/>");
        assert!(output.hosts.is_empty());
        assert_eq!(output.warnings, vec!["no <nmaprun> root element found".to_string()]);
    }

    #[test]
    fn escaped_attributes_are_unescaped() {
        let xml = r#"<nmaprun><host><address addr="198.51.100.9" addrtype="ipv4"/><ports><port protocol="tcp" portid="8080"><state state="open"/><service name="http" product="Tom &amp; Jerry"/></port></ports></host></nmaprun>"#;
        let output = ScanReportXmlParser::new().parse(xml);
        let fields = &output.hosts[0].ports[0].service_fields;
        assert!(fields.contains(&("product".to_string(), "Tom & Jerry".to_string())));
    }
}
