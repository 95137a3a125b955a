//! Search loop and the mDNS-backed finder.
//!
//! The discovery algorithm:
//! 1. Browses for `_http._tcp.local.` services
//! 2. Drops every resolved service that is not a controller
//! 3. Restarts the browse every retry interval while nothing answered
//! 4. Stops at the first controller that answers

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::{IfKind, Receiver, ServiceDaemon, ServiceEvent};
use tokio::time::{interval_at, Instant};

use crate::error::{DiscoveryError, Result};
use crate::{Unit, UnitEvent, DEFAULT_UNIT_PORT};

/// Service type controllers announce themselves under
pub const SERVICE_TYPE: &str = "_http._tcp.local.";

/// Instance-name marker of a controller announcement
const CONTROLLER_MARKER: &str = "Pentair";

/// Deadline used when `now + period` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Source of discovery searches and their answers.
///
/// `search` starts one query round; `next_event` waits for the next controller answer
/// or a daemon error. `next_event` must be cancel-safe: the supervisor races it
/// against its retry timer.
#[async_trait]
pub trait UnitFinder: Send {
    async fn search(&mut self) -> Result<()>;

    async fn next_event(&mut self) -> UnitEvent;
}

/// Opens a fresh finder for every discovery round.
pub trait FinderFactory: Send + Sync {
    type Finder: UnitFinder;

    fn open(&self, interface: Option<Ipv4Addr>) -> Result<Self::Finder>;
}

/// Parse a multicast interface hint; an empty hint means "all interfaces".
pub fn parse_interface(hint: &str) -> Result<Option<Ipv4Addr>> {
    let hint = hint.trim();
    if hint.is_empty() {
        return Ok(None);
    }
    hint.parse::<Ipv4Addr>()
        .map(Some)
        .map_err(|_| DiscoveryError::InvalidInterface(hint.to_string()))
}

/// `now + period`, or a deadline decades away when that overflows.
pub fn deadline_after(period: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(period)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Search until a controller answers.
///
/// Starts the first search immediately and another one every `retry_interval`
/// for as long as nothing answers. The first responder wins; a finder error
/// ends the search with that error. A zero interval is rejected.
pub async fn search_until_found<F: UnitFinder>(
    finder: &mut F,
    retry_interval: Duration,
) -> Result<Unit> {
    if retry_interval.is_zero() {
        return Err(DiscoveryError::InvalidRetryInterval);
    }

    finder.search().await?;
    let mut retry = interval_at(deadline_after(retry_interval), retry_interval);

    loop {
        tokio::select! {
            event = finder.next_event() => {
                return match event {
                    UnitEvent::Found(unit) => Ok(unit),
                    UnitEvent::Error(e) => Err(e),
                };
            }
            _ = retry.tick() => {
                tracing::info!(
                    "didn't find any units within {} seconds, trying again...",
                    retry_interval.as_secs()
                );
                finder.search().await?;
            }
        }
    }
}

/// Build a [`Unit`] from a resolved service, or `None` when the service is
/// not a controller or has no usable address.
///
/// IPv4 addresses are preferred; a port of zero falls back to
/// [`DEFAULT_UNIT_PORT`].
pub fn unit_from_service<I, A>(fullname: &str, addresses: I, port: u16) -> Option<Unit>
where
    I: IntoIterator<Item = A>,
    A: ToString,
{
    let name = fullname
        .strip_suffix(SERVICE_TYPE)
        .map(|instance| instance.trim_end_matches('.'))
        .unwrap_or(fullname);
    if !name.contains(CONTROLLER_MARKER) {
        return None;
    }

    let mut parsed: Vec<IpAddr> = addresses
        .into_iter()
        .filter_map(|addr| addr.to_string().parse().ok())
        .collect();
    parsed.sort_by_key(|addr| !addr.is_ipv4());
    let address = parsed.into_iter().next()?;

    Some(Unit {
        name: name.to_string(),
        address,
        port: if port == 0 { DEFAULT_UNIT_PORT } else { port },
    })
}

fn daemon_error(context: &str, e: mdns_sd::Error) -> DiscoveryError {
    DiscoveryError::NetworkError(format!("{}: {}", context, e))
}

/// Finder backed by an `mdns-sd` service daemon.
///
/// When an interface hint is given every other interface is disabled on the
/// daemon, which pins both the outgoing queries and the answers it accepts.
pub struct MdnsFinder {
    daemon: ServiceDaemon,
    events: Option<Receiver<ServiceEvent>>,
}

impl MdnsFinder {
    pub fn bind(interface: Option<Ipv4Addr>) -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| daemon_error("Failed to start mDNS daemon", e))?;

        if let Some(addr) = interface {
            daemon
                .disable_interface(IfKind::All)
                .map_err(|e| daemon_error("Failed to disable interfaces", e))?;
            daemon
                .enable_interface(IfKind::Addr(IpAddr::V4(addr)))
                .map_err(|e| daemon_error("Failed to enable interface", e))?;
            tracing::debug!("mDNS pinned to interface {}", addr);
        }

        Ok(Self {
            daemon,
            events: None,
        })
    }
}

#[async_trait]
impl UnitFinder for MdnsFinder {
    async fn search(&mut self) -> Result<()> {
        if self.events.take().is_some() {
            // restart so the daemon sends a fresh query right away
            if let Err(e) = self.daemon.stop_browse(SERVICE_TYPE) {
                tracing::debug!("stop_browse failed: {}", e);
            }
        }
        let events = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| daemon_error("Failed to browse for controllers", e))?;
        self.events = Some(events);
        Ok(())
    }

    async fn next_event(&mut self) -> UnitEvent {
        let Some(events) = &self.events else {
            return std::future::pending().await;
        };

        loop {
            let event = match events.recv_async().await {
                Ok(event) => event,
                Err(e) => {
                    return UnitEvent::Error(DiscoveryError::NetworkError(format!(
                        "mDNS daemon stopped: {}",
                        e
                    )))
                }
            };

            match event {
                ServiceEvent::ServiceResolved(info) => {
                    let found = unit_from_service(
                        info.get_fullname(),
                        info.get_addresses().iter(),
                        info.get_port(),
                    );
                    match found {
                        Some(unit) => return UnitEvent::Found(unit),
                        None => tracing::debug!("ignoring service {}", info.get_fullname()),
                    }
                }
                // the receiver of a replaced browse; the next search installs a new one
                ServiceEvent::SearchStopped(_) => return std::future::pending().await,
                _ => {}
            }
        }
    }
}

impl Drop for MdnsFinder {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            tracing::debug!("mDNS daemon shutdown failed: {}", e);
        }
    }
}

/// Opens [`MdnsFinder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdnsFinderFactory;

impl FinderFactory for MdnsFinderFactory {
    type Finder = MdnsFinder;

    fn open(&self, interface: Option<Ipv4Addr>) -> Result<MdnsFinder> {
        MdnsFinder::bind(interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interface() {
        assert_eq!(parse_interface("").unwrap(), None);
        assert_eq!(parse_interface("  ").unwrap(), None);
        assert_eq!(
            parse_interface("192.168.1.10").unwrap(),
            Some(Ipv4Addr::new(192, 168, 1, 10))
        );
        assert!(matches!(
            parse_interface("eth0"),
            Err(DiscoveryError::InvalidInterface(_))
        ));
    }

    #[test]
    fn test_unit_from_controller_service() {
        let unit = unit_from_service(
            "Pentair -i: 01-60-6E._http._tcp.local.",
            ["fe80::1", "192.168.1.50"],
            6680,
        )
        .unwrap();

        assert_eq!(unit.name, "Pentair -i: 01-60-6E");
        assert_eq!(unit.address, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)));
        assert_eq!(unit.port, 6680);
    }

    #[test]
    fn test_other_services_are_ignored() {
        assert!(unit_from_service("Printer._http._tcp.local.", ["192.168.1.9"], 80).is_none());
    }

    #[test]
    fn test_service_without_address_is_ignored() {
        let none: [&str; 0] = [];
        assert!(unit_from_service("Pentair -: 00-11-22._http._tcp.local.", none, 6680).is_none());
    }

    #[test]
    fn test_missing_port_uses_default() {
        let unit =
            unit_from_service("Pentair -: 00-11-22._http._tcp.local.", ["10.0.0.7"], 0).unwrap();
        assert_eq!(unit.port, DEFAULT_UNIT_PORT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_huge_period() {
        let now = Instant::now();
        assert_eq!(deadline_after(Duration::from_secs(5)), now + Duration::from_secs(5));
        assert!(deadline_after(Duration::MAX) > now + Duration::from_secs(86_400 * 365));
    }
}
