//! Within-call deduplication of hosts and ports.
//!
//! Hosts reported more than once (one httpx record per URL, repeated nmap
//! sections) are merged when they describe the same machine name: a shared
//! hostname, or a shared primary address where at most one side is named.
//! Distinct names behind one address (vhosts, CDN fronts) stay separate.
//! Ports repeated on one host collapse to the most complete observation of
//! each `(port_number, protocol)` pair.

use std::collections::HashMap;

use crate::models::{HostStatus, ParsedHost, ParsedPort, Protocol};

/// Lookup keys for candidate matches: the primary address and every name.
fn host_keys(host: &ParsedHost) -> Vec<String> {
    host.primary_address()
        .map(|address| format!("addr:{}", address.to_lowercase()))
        .into_iter()
        .chain(host.hostnames.iter().map(|name| format!("name:{}", name.to_lowercase())))
        .collect()
}

fn names_overlap(a: &ParsedHost, b: &ParsedHost) -> bool {
    a.hostnames
        .iter()
        .any(|name| b.hostnames.iter().any(|other| other.eq_ignore_ascii_case(name)))
}

/// Two records describe the same host when their names overlap and their
/// primary addresses do not disagree, or when they share a primary address
/// and at most one of them carries names.
fn same_host(a: &ParsedHost, b: &ParsedHost) -> bool {
    match (a.primary_address(), b.primary_address()) {
        (Some(x), Some(y)) if !x.eq_ignore_ascii_case(y) => false,
        (Some(_), Some(_)) => {
            names_overlap(a, b) || a.hostnames.is_empty() || b.hostnames.is_empty()
        }
        _ => names_overlap(a, b),
    }
}

/// Merge records of the same host, keeping first-seen order, then
/// deduplicate each host's ports. Hosts without any address or name are
/// never merged.
pub fn merge_hosts(hosts: Vec<ParsedHost>) -> Vec<ParsedHost> {
    let before = hosts.len();
    let mut merged: Vec<ParsedHost> = Vec::with_capacity(hosts.len());
    let mut slots: HashMap<String, Vec<usize>> = HashMap::new();

    for host in hosts {
        let target = host_keys(&host)
            .iter()
            .filter_map(|key| slots.get(key))
            .flatten()
            .copied()
            .find(|&at| same_host(&merged[at], &host));

        let at = match target {
            Some(at) => {
                absorb(&mut merged[at], host);
                at
            }
            None => {
                merged.push(host);
                merged.len() - 1
            }
        };
        for key in host_keys(&merged[at]) {
            let indexes = slots.entry(key).or_default();
            if !indexes.contains(&at) {
                indexes.push(at);
            }
        }
    }

    for host in &mut merged {
        host.ports = dedup_ports(std::mem::take(&mut host.ports));
    }

    if merged.len() < before {
        tracing::debug!(before, after = merged.len(), "Merged duplicate hosts");
    }
    merged
}

/// Fold `other` into `host`: union of addresses, names, ports and OS
/// guesses. A known status replaces `unknown`; otherwise the first wins.
fn absorb(host: &mut ParsedHost, other: ParsedHost) {
    for address in other.addresses {
        if !host.addresses.iter().any(|a| a.value == address.value) {
            host.addresses.push(address);
        }
    }
    for name in other.hostnames {
        if !host.hostnames.iter().any(|h| h.eq_ignore_ascii_case(&name)) {
            host.hostnames.push(name);
        }
    }
    for guess in other.os_guesses {
        if !host.os_guesses.iter().any(|g| g.name == guess.name) {
            host.os_guesses.push(guess);
        }
    }
    host.ports.extend(other.ports);
    if host.status == HostStatus::Unknown {
        host.status = other.status;
    }
}

/// Keep one port per `(port_number, protocol)`: the one with the most
/// populated optional fields, the first seen on a tie. Order follows first
/// appearance.
pub fn dedup_ports(ports: Vec<ParsedPort>) -> Vec<ParsedPort> {
    let mut kept: Vec<ParsedPort> = Vec::with_capacity(ports.len());
    let mut positions: HashMap<(u16, Protocol), usize> = HashMap::new();

    for port in ports {
        let key = (port.port_number, port.protocol);
        match positions.get(&key) {
            Some(&at) => {
                if port.completeness() > kept[at].completeness() {
                    kept[at] = port;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(port);
            }
        }
    }
    kept
}
