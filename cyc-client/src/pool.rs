//! [`ServerPool`] — a concurrency-bounded set of server addresses.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, Mutex};

use cyc_domain::{parse_pool_spec, CycError, CycServerAddress, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Concurrency level assumed for an address that does not configure one.
pub const DEFAULT_CONCURRENCY_LEVEL: u32 = 1;

// ---------------------------------------------------------------------------
// ServerPool
// ---------------------------------------------------------------------------

/// Bounded admission control across one or more server addresses.
///
/// Each address contributes `concurrency_level` interchangeable slot tokens
/// (zero-level addresses contribute none). The tokens are shuffled once at
/// construction so load spreads pseudo-randomly across equally-weighted
/// addresses. The number of slots in circulation is constant for the pool's
/// lifetime: a slot is never duplicated or lost across acquire/release, as
/// long as callers release exactly what they acquired.
pub struct ServerPool {
    // ---
    addresses: Vec<CycServerAddress>,
    slots_tx: mpsc::Sender<CycServerAddress>,
    /// Multi-consumer access to the single receiver is serialized here; the
    /// channel itself provides the bounded-queue semantics.
    slots_rx: Mutex<mpsc::Receiver<CycServerAddress>>,
    max_workers: usize,
    available: AtomicUsize,
}

// ---

impl ServerPool {
    // ---
    pub fn new(addresses: Vec<CycServerAddress>, default_concurrency_level: u32) -> Self {
        // ---
        let mut slots: Vec<CycServerAddress> = Vec::new();
        for address in &addresses {
            for _ in 0..address.effective_concurrency_level(default_concurrency_level) {
                slots.push(address.clone());
            }
        }
        slots.shuffle(&mut rand::thread_rng());

        let max_workers = slots.len();
        let (slots_tx, slots_rx) = mpsc::channel(max_workers.max(1));
        for slot in slots {
            // Cannot fail: capacity equals the slot count.
            let _ = slots_tx.try_send(slot);
        }

        Self {
            addresses,
            slots_tx,
            slots_rx: Mutex::new(slots_rx),
            max_workers,
            available: AtomicUsize::new(max_workers),
        }
    }

    // ---

    /// Build a pool from the `host:port[:c],host:port[:c],...` grammar.
    pub fn from_spec(spec: &str, default_concurrency_level: u32) -> Result<Self> {
        Ok(Self::new(parse_pool_spec(spec)?, default_concurrency_level))
    }

    // ---

    /// Acquire a slot, blocking until one is available, and return the
    /// address it belongs to. Callers open (or reuse) a connection to that
    /// address, do their work, and then call [`ServerPool::release_worker`].
    pub async fn request_worker(&self) -> CycServerAddress {
        // ---
        let mut rx = self.slots_rx.lock().await;
        match rx.recv().await {
            Some(address) => {
                self.available.fetch_sub(1, Ordering::SeqCst);
                address
            }
            // The pool holds its own sender, so the channel cannot close
            // while `self` is alive.
            None => unreachable!("slot channel closed while the pool is alive"),
        }
    }

    // ---

    /// Return a slot for `address` to the pool.
    pub fn release_worker(&self, address: CycServerAddress) -> Result<()> {
        // ---
        if !self.addresses.contains(&address) {
            return Err(CycError::InvalidArgument(format!(
                "address {address} is not a member of this pool"
            )));
        }
        self.slots_tx.try_send(address).map_err(|_| {
            CycError::InvalidArgument("released more slots than the pool holds".into())
        })?;
        self.available.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // ---

    /// Total slot capacity: the sum of every address's concurrency level.
    pub fn max_worker_count(&self) -> usize {
        self.max_workers
    }

    /// Slots currently free. Monitoring only; the value may be stale by the
    /// time the caller acts on it.
    pub fn available_worker_count(&self) -> usize {
        self.available.load(Ordering::SeqCst)
    }

    pub fn addresses(&self) -> &[CycServerAddress] {
        &self.addresses
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn capacity_is_the_sum_of_levels() {
        // ---
        let pool = ServerPool::new(
            vec![
                CycServerAddress::with_concurrency_level("a", 3600, 2),
                CycServerAddress::with_concurrency_level("b", 3600, 3),
            ],
            DEFAULT_CONCURRENCY_LEVEL,
        );
        assert_eq!(pool.max_worker_count(), 5);
        assert_eq!(pool.available_worker_count(), 5);

        // Exactly five acquisitions succeed without blocking.
        let mut held = Vec::new();
        for _ in 0..5 {
            let addr = timeout(TICK, pool.request_worker())
                .await
                .expect("acquisition within capacity must not block");
            held.push(addr);
        }
        assert_eq!(pool.available_worker_count(), 0);
        assert_eq!(held.iter().filter(|a| a.host() == "a").count(), 2);
        assert_eq!(held.iter().filter(|a| a.host() == "b").count(), 3);

        // The sixth blocks until a release.
        assert!(timeout(TICK, pool.request_worker()).await.is_err());

        pool.release_worker(held.pop().unwrap()).unwrap();
        let addr = timeout(TICK, pool.request_worker())
            .await
            .expect("release must unblock a waiter");
        assert_eq!(pool.available_worker_count(), 0);
        pool.release_worker(addr).unwrap();
        assert_eq!(pool.available_worker_count(), 1);
    }

    #[tokio::test]
    async fn unconfigured_levels_use_the_default() {
        // ---
        let pool = ServerPool::new(
            vec![CycServerAddress::new("a", 3600)],
            DEFAULT_CONCURRENCY_LEVEL,
        );
        assert_eq!(pool.max_worker_count(), 1);
    }

    #[tokio::test]
    async fn pool_spec_parses_and_counts() {
        // ---
        let pool = ServerPool::from_spec("host1:40:1,host2:50:3", DEFAULT_CONCURRENCY_LEVEL)
            .unwrap();
        assert_eq!(pool.addresses().len(), 2);
        assert_eq!(pool.max_worker_count(), 4);
    }

    #[tokio::test]
    async fn zero_level_address_contributes_no_slots() {
        // ---
        let pool = ServerPool::from_spec("host1:40:0", DEFAULT_CONCURRENCY_LEVEL).unwrap();
        assert_eq!(pool.addresses().len(), 1);
        assert_eq!(pool.max_worker_count(), 0);
        // Nothing to acquire.
        assert!(timeout(TICK, pool.request_worker()).await.is_err());
    }

    #[tokio::test]
    async fn foreign_addresses_cannot_be_released() {
        // ---
        let pool = ServerPool::from_spec("host1:40:1", DEFAULT_CONCURRENCY_LEVEL).unwrap();
        let foreign = CycServerAddress::new("intruder", 99);
        assert!(pool.release_worker(foreign).is_err());
    }
}
