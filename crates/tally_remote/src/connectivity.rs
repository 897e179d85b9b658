//! Connectivity probe abstraction and its TTL cache.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    /// A network interface is up.
    pub is_connected: bool,
    /// The internet is believed reachable through it.
    pub is_internet_reachable: bool,
}

impl ConnectivitySnapshot {
    /// A fully-online snapshot.
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    /// A fully-offline snapshot.
    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: false,
        }
    }

    /// Returns true if remote calls are worth attempting.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

/// Source of connectivity snapshots (typically an OS-level monitor).
pub trait ConnectivityProbe: Send + Sync {
    /// Returns the current connectivity state.
    fn snapshot(&self) -> ConnectivitySnapshot;
}

/// A probe for deployments without an OS-level monitor: always online.
/// The circuit breaker still provides fail-fast behavior.
#[derive(Debug, Default)]
pub struct AssumeOnline;

impl ConnectivityProbe for AssumeOnline {
    fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot::online()
    }
}

/// A probe with settable state, for tests.
#[derive(Debug)]
pub struct MockProbe {
    online: AtomicBool,
}

impl MockProbe {
    /// Creates a probe in the given state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Flips the reported state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for MockProbe {
    fn snapshot(&self) -> ConnectivitySnapshot {
        if self.online.load(Ordering::SeqCst) {
            ConnectivitySnapshot::online()
        } else {
            ConnectivitySnapshot::offline()
        }
    }
}

/// TTL cache in front of a probe, so pre-flight checks stay cheap.
pub(crate) struct ConnectivityCache {
    ttl: Duration,
    slot: RwLock<Option<(Instant, ConnectivitySnapshot)>>,
}

impl ConnectivityCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached snapshot, refreshing from the probe when stale.
    pub(crate) fn get(&self, probe: &dyn ConnectivityProbe) -> ConnectivitySnapshot {
        if let Some((taken_at, snapshot)) = *self.slot.read() {
            if taken_at.elapsed() < self.ttl {
                return snapshot;
            }
        }
        let snapshot = probe.snapshot();
        *self.slot.write() = Some((Instant::now(), snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_serves_within_ttl() {
        let probe = MockProbe::new(true);
        let cache = ConnectivityCache::new(Duration::from_secs(60));

        assert!(cache.get(&probe).is_online());
        probe.set_online(false);
        // Still cached as online.
        assert!(cache.get(&probe).is_online());
    }

    #[test]
    fn cache_refreshes_when_stale() {
        let probe = MockProbe::new(true);
        let cache = ConnectivityCache::new(Duration::ZERO);

        assert!(cache.get(&probe).is_online());
        probe.set_online(false);
        assert!(!cache.get(&probe).is_online());
    }

    #[test]
    fn snapshot_requires_both_flags() {
        let snapshot = ConnectivitySnapshot {
            is_connected: true,
            is_internet_reachable: false,
        };
        assert!(!snapshot.is_online());
    }
}
