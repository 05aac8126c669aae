//! Normalizes raw security-tool output into one host/port/finding model.
//!
//! ```no_run
//! use toolparse::{parse, RawOutput};
//!
//! let raw = RawOutput::from_text("198.51.100.7:22 SSH-2.0-OpenSSH_8.2p1");
//! let result = parse(&raw, None)?;
//! println!("{} hosts from {}", result.hosts.len(), result.tool);
//! # Ok::<(), toolparse::ParseFailure>(())
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod parsers;
pub mod services;

pub use config::ParserConfig;
pub use errors::ParseFailure;
pub use models::{
    Address, AddressType, HostStatus, OsGuess, ParseResult, ParsedFinding, ParsedHost, ParsedPort,
    PortState, Protocol, RawOutput, ServiceInfo, SeverityLevel,
};
pub use parsers::ToolFormat;
pub use services::detection::detect;
pub use services::ingestion::{parse, parse_with_config};
