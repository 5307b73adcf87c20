use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use lbus_types::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// How the next nonce for an identity is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoncePolicy {
    /// Ask the ledger before every send.
    Refetch,
    /// Ask the ledger once, then count locally. Any failed send drops the
    /// cached value so the next send asks again.
    #[default]
    SessionCounter,
}

/// Per-identity lane state.
#[derive(Debug, Default)]
struct Lane {
    /// Last nonce this process used successfully for the identity.
    last_used: Option<u64>,
}

/// Hands out nonces, one writer per identity at a time.
///
/// Each identity gets a lane; holding a [`NonceLease`] holds the lane, so
/// sends for the same identity are serialized end to end while different
/// identities proceed in parallel. Only writers inside this process are
/// coordinated. Two processes signing for one identity can still race.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    policy: NoncePolicy,
    lanes: Mutex<HashMap<Address, Arc<AsyncMutex<Lane>>>>,
}

impl NonceSequencer {
    pub fn new(policy: NoncePolicy) -> Self {
        Self {
            policy,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> NoncePolicy {
        self.policy
    }

    /// Number of identities with a lane in memory.
    pub fn tracked_identities(&self) -> usize {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Fetch or create the lane for `address`, evicting idle lanes that
    /// carry nothing worth keeping.
    ///
    /// A lane is idle when no lease or waiter holds it. Under
    /// [`NoncePolicy::Refetch`] idle lanes are always dropped; under
    /// [`NoncePolicy::SessionCounter`] only those without a cached counter
    /// are, so memory grows with the identities that sent successfully.
    fn lane(&self, address: &Address) -> Arc<AsyncMutex<Lane>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        let policy = self.policy;
        lanes.retain(|key, lane| {
            key == address || Arc::strong_count(lane) > 1 || holds_counter(policy, lane)
        });
        Arc::clone(lanes.entry(address.clone()).or_default())
    }

    /// Wait for the identity's lane and reserve the next nonce.
    ///
    /// `fetch_committed` reports the ledger's last committed nonce. An
    /// [`ClientError::AccountNotFound`] from it counts as zero.
    pub async fn lease<F, Fut>(&self, address: &Address, fetch_committed: F) -> ClientResult<NonceLease>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<u64>>,
    {
        let guard = self.lane(address).lock_owned().await;

        let cached = match self.policy {
            NoncePolicy::SessionCounter => guard.last_used,
            NoncePolicy::Refetch => None,
        };
        let last = match cached {
            Some(last) => last,
            None => match fetch_committed().await {
                Ok(n) => n,
                Err(ClientError::AccountNotFound(_)) => 0,
                Err(e) => return Err(e),
            },
        };
        let nonce = last
            .checked_add(1)
            .ok_or_else(|| ClientError::Validation(format!("nonce overflow for {address}")))?;

        debug!(address = %address.short_id(), nonce, cached = cached.is_some(), "nonce leased");
        Ok(NonceLease {
            guard,
            nonce,
            committed: false,
        })
    }

    /// Drop any cached value for `address`.
    pub async fn invalidate(&self, address: &Address) {
        self.lane(address).lock().await.last_used = None;
    }
}

fn holds_counter(policy: NoncePolicy, lane: &AsyncMutex<Lane>) -> bool {
    match policy {
        NoncePolicy::Refetch => false,
        NoncePolicy::SessionCounter => lane.try_lock().map_or(true, |lane| lane.last_used.is_some()),
    }
}

/// A reserved nonce plus exclusive use of the identity's lane.
///
/// Call [`NonceLease::commit`] once the ledger accepted the transaction.
/// Dropping an uncommitted lease forgets the cached counter.
#[derive(Debug)]
pub struct NonceLease {
    guard: OwnedMutexGuard<Lane>,
    nonce: u64,
    committed: bool,
}

impl NonceLease {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn commit(mut self) {
        self.guard.last_used = Some(self.nonce);
        self.committed = true;
    }
}

impl Drop for NonceLease {
    fn drop(&mut self) {
        if !self.committed {
            self.guard.last_used = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn unknown_account_starts_at_one() {
        let seq = NonceSequencer::new(NoncePolicy::Refetch);
        let lease = seq
            .lease(&addr(1), || async { Err(ClientError::AccountNotFound("x".into())) })
            .await
            .unwrap();
        assert_eq!(lease.nonce(), 1);
    }

    #[tokio::test]
    async fn other_fetch_errors_propagate() {
        let seq = NonceSequencer::default();
        let err = seq
            .lease(&addr(1), || async { Err(ClientError::Remote { message: "down".into() }) })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote { .. }));
    }

    #[tokio::test]
    async fn session_counter_fetches_once() {
        let seq = NonceSequencer::new(NoncePolicy::SessionCounter);
        let fetches = AtomicUsize::new(0);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let lease = seq
                .lease(&addr(1), || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(4)
                })
                .await
                .unwrap();
            seen.push(lease.nonce());
            lease.commit();
        }
        assert_eq!(seen, vec![5, 6, 7]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refetch_asks_every_time() {
        let seq = NonceSequencer::new(NoncePolicy::Refetch);
        let fetches = AtomicUsize::new(0);
        for _ in 0..3 {
            seq.lease(&addr(1), || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .await
            .unwrap()
            .commit();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn uncommitted_lease_forces_reseed() {
        let seq = NonceSequencer::new(NoncePolicy::SessionCounter);
        seq.lease(&addr(1), || async { Ok(0) }).await.unwrap().commit();

        // Failed send: lease dropped without commit.
        let failed = seq.lease(&addr(1), || async { Ok(99) }).await.unwrap();
        assert_eq!(failed.nonce(), 2);
        drop(failed);

        let next = seq.lease(&addr(1), || async { Ok(10) }).await.unwrap();
        assert_eq!(next.nonce(), 11);
    }

    #[tokio::test]
    async fn invalidate_drops_cache() {
        let seq = NonceSequencer::default();
        seq.lease(&addr(1), || async { Ok(0) }).await.unwrap().commit();
        seq.invalidate(&addr(1)).await;
        let lease = seq.lease(&addr(1), || async { Ok(41) }).await.unwrap();
        assert_eq!(lease.nonce(), 42);
    }

    #[tokio::test]
    async fn overflow_is_a_validation_error() {
        let seq = NonceSequencer::default();
        let err = seq.lease(&addr(1), || async { Ok(u64::MAX) }).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn same_identity_is_serialized() {
        let seq = Arc::new(NonceSequencer::default());
        let first = seq.lease(&addr(1), || async { Ok(0) }).await.unwrap();

        let waiter_seq = Arc::clone(&seq);
        let waiter = tokio::spawn(async move {
            let lease = waiter_seq.lease(&addr(1), || async { Ok(0) }).await.unwrap();
            lease.nonce()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.commit();
        assert_eq!(waiter.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn refetch_evicts_idle_lanes() {
        let seq = NonceSequencer::new(NoncePolicy::Refetch);
        let held = seq.lease(&addr(0), || async { Ok(0) }).await.unwrap();
        for byte in 1..=50 {
            seq.lease(&addr(byte), || async { Ok(0) }).await.unwrap().commit();
        }
        // The held lane and the most recent one.
        assert_eq!(seq.tracked_identities(), 2);
        assert_eq!(held.nonce(), 1);
    }

    #[tokio::test]
    async fn session_counter_keeps_only_cached_lanes() {
        let seq = NonceSequencer::new(NoncePolicy::SessionCounter);
        seq.lease(&addr(0), || async { Ok(0) }).await.unwrap().commit();
        for byte in 1..=50 {
            // Failed sends leave nothing cached.
            drop(seq.lease(&addr(byte), || async { Ok(0) }).await.unwrap());
        }
        assert_eq!(seq.tracked_identities(), 2);

        let fetches = AtomicUsize::new(0);
        let lease = seq
            .lease(&addr(0), || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .await
            .unwrap();
        assert_eq!(lease.nonce(), 2);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let seq = NonceSequencer::default();
        let _held = seq.lease(&addr(1), || async { Ok(0) }).await.unwrap();
        let other = tokio::time::timeout(
            Duration::from_millis(200),
            seq.lease(&addr(2), || async { Ok(7) }),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(other.nonce(), 8);
    }
}
