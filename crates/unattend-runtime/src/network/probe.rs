//! Connectivity probes.
//!
//! A TCP connect to a well-known host stands in for ICMP ping, which needs
//! raw sockets (administrator rights on Windows).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tracing::debug;
use unattend_core::{AcquisitionSettings, ConnectivityProbe};

/// Reachability via a TCP handshake with a short timeout.
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    address: String,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &AcquisitionSettings) -> Self {
        Self::new(
            settings.connectivity_host.clone(),
            settings.connectivity_timeout(),
        )
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_reachable(&self) -> bool {
        let reachable = matches!(
            timeout(self.timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        );
        debug!(target: "unattend.runtime", address = %self.address, reachable, "Connectivity probe");
        reachable
    }
}

/// Caches another probe's answer for a fixed TTL.
///
/// The resolver asks once per item; without the cache a queue of offline
/// items would pay the connect timeout each time.
pub struct CachedConnectivityProbe {
    inner: Arc<dyn ConnectivityProbe>,
    ttl: Duration,
    cached: Mutex<Option<(Instant, bool)>>,
}

impl CachedConnectivityProbe {
    pub fn new(inner: Arc<dyn ConnectivityProbe>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Forget the cached answer.
    pub fn clear(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fresh(&self) -> Option<bool> {
        let cached = *self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        cached
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, reachable)| reachable)
    }
}

#[async_trait]
impl ConnectivityProbe for CachedConnectivityProbe {
    async fn is_reachable(&self) -> bool {
        if let Some(reachable) = self.fresh() {
            return reachable;
        }
        let reachable = self.inner.is_reachable().await;
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), reachable));
        reachable
    }
}
