//! Source address admission filtering.
//!
//! The upstream platform publishes the address ranges its webhook senders
//! use. This module keeps a refreshable in-memory copy of those ranges and
//! answers "may this source address reach the webhook endpoint at all"
//! before any body bytes are read.
//!
//! The filter **fails closed**: until the first successful range fetch it
//! admits nothing. A failed refresh keeps the last-known-good set so a
//! transient upstream outage does not drop legitimate traffic.

use async_trait::async_trait;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Error raised by an [`AllowedRangeSource`].
#[derive(Debug, Clone, Error)]
pub enum RangeSourceError {
    #[error("failed to fetch allowed ranges: {message}")]
    FetchFailed { message: String },

    #[error("allowed range response was malformed: {message}")]
    MalformedResponse { message: String },
}

/// Error parsing a CIDR literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CIDR range: {0}")]
pub struct CidrParseError(String);

/// An IPv4 or IPv6 address range in CIDR notation.
///
/// The corpus carries no CIDR crate, so the prefix match is implemented
/// directly over the address octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    pub fn new(network: IpAddr, prefix_len: u8) -> Result<Self, CidrParseError> {
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(CidrParseError(format!(
                "prefix length {} exceeds {} for {}",
                prefix_len, max, network
            )));
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// Check whether `ip` falls inside this range.
    ///
    /// Address families never match across each other; an IPv4 range does
    /// not admit an IPv6 address or vice versa.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                prefix_matches(&net.octets(), &addr.octets(), self.prefix_len)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                prefix_matches(&net.octets(), &addr.octets(), self.prefix_len)
            }
            _ => false,
        }
    }
}

/// Compare the leading `prefix_len` bits of two equal-length octet arrays.
fn prefix_matches(network: &[u8], addr: &[u8], prefix_len: u8) -> bool {
    let full_bytes = (prefix_len / 8) as usize;
    let remaining_bits = prefix_len % 8;

    if network[..full_bytes] != addr[..full_bytes] {
        return false;
    }
    if remaining_bits == 0 {
        return true;
    }

    let mask = 0xffu8 << (8 - remaining_bits);
    (network[full_bytes] & mask) == (addr[full_bytes] & mask)
}

impl FromStr for CidrRange {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, len_part) = s
            .split_once('/')
            .ok_or_else(|| CidrParseError(format!("missing '/' in {:?}", s)))?;

        let network: IpAddr = addr_part
            .parse()
            .map_err(|_| CidrParseError(format!("invalid address in {:?}", s)))?;
        let prefix_len: u8 = len_part
            .parse()
            .map_err(|_| CidrParseError(format!("invalid prefix length in {:?}", s)))?;

        Self::new(network, prefix_len)
    }
}

impl std::fmt::Display for CidrRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Provider of the current allowed sender ranges.
///
/// The production implementation queries the platform's metadata endpoint;
/// tests substitute fixed range sets.
#[async_trait]
pub trait AllowedRangeSource: Send + Sync {
    async fn fetch_ranges(&self) -> Result<Vec<CidrRange>, RangeSourceError>;
}

/// Refreshable allow-list of sender address ranges.
pub struct IpAdmissionFilter {
    source: Arc<dyn AllowedRangeSource>,
    // None until the first successful refresh; admission is denied in that
    // state.
    ranges: RwLock<Option<Vec<CidrRange>>>,
}

impl IpAdmissionFilter {
    pub fn new(source: Arc<dyn AllowedRangeSource>) -> Self {
        Self {
            source,
            ranges: RwLock::new(None),
        }
    }

    /// Check whether a source address is inside any allowed range.
    ///
    /// Returns `false` for every address until the first successful
    /// [`refresh`](Self::refresh).
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        let ranges = self
            .ranges
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match ranges.as_deref() {
            Some(ranges) => ranges.iter().any(|r| r.contains(ip)),
            None => false,
        }
    }

    /// Whether at least one refresh has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.ranges
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Number of ranges currently loaded.
    pub fn range_count(&self) -> usize {
        self.ranges
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_deref()
            .map_or(0, |r| r.len())
    }

    /// Fetch the current ranges and replace the loaded set.
    ///
    /// # Errors
    ///
    /// Propagates the source error. The previously loaded set (if any) stays
    /// in effect on failure.
    pub async fn refresh(&self) -> Result<(), RangeSourceError> {
        match self.source.fetch_ranges().await {
            Ok(ranges) => {
                info!(count = ranges.len(), "refreshed allowed sender ranges");
                let mut guard = self
                    .ranges
                    .write()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                *guard = Some(ranges);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "range refresh failed, keeping last known set");
                Err(e)
            }
        }
    }

    /// Spawn a background task refreshing the ranges on a fixed interval.
    ///
    /// The first tick fires after `interval`; callers perform the initial
    /// refresh themselves during startup so readiness reflects it.
    pub fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let filter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick, already refreshed at startup
            loop {
                ticker.tick().await;
                // Failures keep the last-known-good set; already logged.
                let _ = filter.refresh().await;
            }
        })
    }
}

impl std::fmt::Debug for IpAdmissionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpAdmissionFilter")
            .field("loaded", &self.is_loaded())
            .field("range_count", &self.range_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "ip_filter_tests.rs"]
mod tests;
