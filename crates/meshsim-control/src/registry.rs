//! Peer mesh registry.
//!
//! One map of simulated mesh participants behind one lock. Registration,
//! listing, health computation and expiry all go through that lock, so a
//! reader never sees a peer half-updated and expiry never interleaves with
//! an upsert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use meshsim_common::models::{MeshHealthSnapshot, PeerRecord};
use meshsim_common::protocol::RegisterPeerRequest;

/// A peer not refreshed for longer than this is removed.
pub const PEER_TTL: Duration = Duration::from_secs(120);
/// Period of the background expiry sweep.
pub const EXPIRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
}

#[derive(Clone)]
pub struct PeerRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    ttl: Duration,
    peers: Mutex<HashMap<String, PeerRecord>>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::with_ttl(PEER_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                peers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub async fn register(&self, req: RegisterPeerRequest) -> Result<PeerRecord, RegistryError> {
        self.register_with_clock(req, Utc::now).await
    }

    /// Upserts the peer with `last_seen = now`.
    pub async fn register_at(
        &self,
        req: RegisterPeerRequest,
        now: DateTime<Utc>,
    ) -> Result<PeerRecord, RegistryError> {
        self.register_with_clock(req, move || now).await
    }

    /// Upserts the peer, reading `last_seen` from `clock` only once the map
    /// is locked, so the stored time is always that of the latest upsert.
    pub async fn register_with_clock(
        &self,
        req: RegisterPeerRequest,
        clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<PeerRecord, RegistryError> {
        let peer_id = req.peer_id.trim();
        if peer_id.is_empty() {
            return Err(RegistryError::Validation("peer_id is required".into()));
        }
        let peer_id = peer_id.to_string();

        let mut peers = self.inner.peers.lock().await;
        let record = PeerRecord {
            peer_id,
            platform: req.platform,
            address: req.address,
            port: req.port,
            last_seen: clock(),
            battery_level: req.battery_level,
            network_type: req.network_type,
        };
        let previous = peers.insert(record.peer_id.clone(), record.clone());
        drop(peers);

        if previous.is_some() {
            tracing::debug!(peer_id = %record.peer_id, "peer refreshed");
        } else {
            tracing::info!(
                peer_id = %record.peer_id,
                platform = %record.platform,
                address = %record.address,
                port = record.port,
                "peer registered"
            );
        }
        Ok(record)
    }

    pub async fn list_peers(&self) -> Vec<PeerRecord> {
        self.inner.peers.lock().await.values().cloned().collect()
    }

    pub async fn compute_health(&self) -> MeshHealthSnapshot {
        let count = self.inner.peers.lock().await.len();
        MeshHealthSnapshot::from_peer_count(count)
    }

    pub async fn expire_stale(&self) -> usize {
        self.expire_stale_at(Utc::now()).await
    }

    /// Removes every peer whose age strictly exceeds the TTL. Returns the
    /// number removed.
    pub async fn expire_stale_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.inner.ttl;
        let mut peers = self.inner.peers.lock().await;
        let before = peers.len();
        peers.retain(|peer_id, peer| {
            // A last_seen in the future (clock skew) counts as fresh.
            let expired = (now - peer.last_seen)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false);
            if expired {
                tracing::info!(peer_id = %peer_id, "removing inactive peer");
            }
            !expired
        });
        before - peers.len()
    }

    /// Runs [`expire_stale`](Self::expire_stale) every `period` until the
    /// runtime shuts down.
    pub fn spawn_expiry(&self, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = registry.expire_stale().await;
                if removed > 0 {
                    tracing::info!(removed, "expired stale peers");
                }
            }
        })
    }
}
