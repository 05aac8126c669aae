//! Host and port records shared by every scan-oriented parser.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    Unknown,
}

impl HostStatus {
    /// Map a tool-reported host state, case-insensitively.
    pub fn from_tool(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Unknown,
}

impl Protocol {
    pub fn from_tool(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
    Unknown,
}

impl PortState {
    /// Map a tool-reported port state. Nmap's combined states
    /// (`open|filtered`, `closed|filtered`) collapse to `Filtered`.
    pub fn from_tool(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "filtered" | "open|filtered" | "closed|filtered" => Self::Filtered,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Ipv4,
    Ipv6,
    Mac,
}

impl AddressType {
    pub fn from_tool(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ipv4" | "ip" => Some(Self::Ipv4),
            "ipv6" => Some(Self::Ipv6),
            "mac" => Some(Self::Mac),
            _ => None,
        }
    }

    /// Infer the address family from the literal itself.
    pub fn infer(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(ip) = value.parse::<std::net::IpAddr>() {
            return Some(if ip.is_ipv4() { Self::Ipv4 } else { Self::Ipv6 });
        }
        let octets: Vec<&str> = value.split([':', '-']).collect();
        let is_mac = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        is_mac.then_some(Self::Mac)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    #[serde(rename = "type")]
    pub addr_type: AddressType,
    pub value: String,
}

/// Service details for a port. Keys a tool did not report stay `None`
/// and are omitted from serialized output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
}

impl ServiceInfo {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Number of populated keys.
    pub fn populated(&self) -> usize {
        [&self.name, &self.product, &self.version, &self.extra_info]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedPort {
    pub port_number: u16,
    pub protocol: Protocol,
    pub state: PortState,
    pub service: ServiceInfo,
}

impl ParsedPort {
    /// How much optional information this observation carries; used to pick
    /// the survivor when the same port is reported twice.
    pub fn completeness(&self) -> usize {
        let state = usize::from(self.state != PortState::Unknown);
        self.service.populated() + state
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsGuess {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedHost {
    pub addresses: Vec<Address>,
    pub hostnames: Vec<String>,
    pub ports: Vec<ParsedPort>,
    pub status: HostStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os_guesses: Vec<OsGuess>,
}

impl ParsedHost {
    pub fn primary_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type != AddressType::Mac)
            .or_else(|| self.addresses.first())
            .map(|a| a.value.as_str())
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &ParsedPort> {
        self.ports.iter().filter(|p| p.is_open())
    }
}
