//! IntelliCenter controller discovery library
//!
//! This crate finds Pentair IntelliCenter controllers on a local network by
//! browsing `_http._tcp.local.` services with the `mdns-sd` daemon and keeping
//! only answers whose instance name identifies a controller.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use intellicenter_discovery::discover;
//!
//! # async fn run() -> intellicenter_discovery::Result<()> {
//! // Search every 5 seconds until a controller answers
//! let unit = discover("", Duration::from_secs(5)).await?;
//! println!("Found {} at {}:{}", unit.name, unit.address, unit.port);
//! # Ok(())
//! # }
//! ```
//!
//! # Pluggable finders
//!
//! The search loop in [`search_until_found`] works against the [`UnitFinder`]
//! trait, so callers can swap the mDNS finder for an in-memory one in tests.

mod error;
mod finder;

use std::net::IpAddr;
use std::time::Duration;

pub use error::{DiscoveryError, Result};
pub use finder::{
    deadline_after, parse_interface, search_until_found, unit_from_service, FinderFactory,
    MdnsFinder, MdnsFinderFactory, UnitFinder, SERVICE_TYPE,
};

/// Port controllers serve their WebSocket API on when the announcement carries none
pub const DEFAULT_UNIT_PORT: u16 = 6680;

/// A controller that answered a discovery search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Instance name from the announcement, e.g. "Pentair -: 00-11-22"
    pub name: String,
    /// IPv4/IPv6 address to dial
    pub address: IpAddr,
    /// WebSocket port
    pub port: u16,
}

impl Unit {
    /// `ws://` URL of the controller's API endpoint
    pub fn ws_url(&self) -> String {
        match self.address {
            IpAddr::V4(addr) => format!("ws://{}:{}", addr, self.port),
            IpAddr::V6(addr) => format!("ws://[{}]:{}", addr, self.port),
        }
    }
}

/// Events emitted while listening for controllers.
#[derive(Debug)]
pub enum UnitEvent {
    /// A controller answered
    Found(Unit),
    /// The finder failed and will not produce further answers
    Error(DiscoveryError),
}

/// Discover the first controller reachable through `interface_hint`.
///
/// An empty hint listens on all interfaces. The search is repeated every
/// `retry_interval` until a controller answers.
pub async fn discover(interface_hint: &str, retry_interval: Duration) -> Result<Unit> {
    let interface = parse_interface(interface_hint)?;
    let mut finder = MdnsFinder::bind(interface)?;
    search_until_found(&mut finder, retry_interval).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_ws_url() {
        let unit = Unit {
            name: "Pentair -: 00-11-22".to_string(),
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
            port: DEFAULT_UNIT_PORT,
        };
        assert_eq!(unit.ws_url(), "ws://192.168.1.50:6680");

        let unit = Unit {
            address: IpAddr::V6(Ipv6Addr::LOCALHOST),
            ..unit
        };
        assert_eq!(unit.ws_url(), "ws://[::1]:6680");
    }
}
