//! Canonical, tool-agnostic record shapes every parser converges to.

pub mod finding;
pub mod host;
pub mod raw;
pub mod result;

pub use finding::{ParsedFinding, SeverityLevel};
pub use host::{
    Address, AddressType, HostStatus, OsGuess, ParsedHost, ParsedPort, PortState, Protocol,
    ServiceInfo,
};
pub use raw::RawOutput;
pub use result::ParseResult;
