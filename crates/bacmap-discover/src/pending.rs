//! Correlation registry for request/response exchanges.
//!
//! Maps a correlation key (the destination address) to a single-assignment
//! result slot. The invariants the probe path relies on: at most one
//! outstanding slot per key, and every path — resolve, cancel, timeout —
//! removes the entry, so the table never leaks.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// A pending slot already exists for this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyPending;

pub struct PendingTable<K, V> {
    slots: Mutex<HashMap<K, oneshot::Sender<V>>>,
}

impl<K, V> PendingTable<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a result slot for the key, refusing a second outstanding
    /// request to the same destination.
    pub fn register(&self, key: K) -> Result<oneshot::Receiver<V>, AlreadyPending> {
        let mut slots = self.slots.lock().expect("pending table lock poisoned");
        if slots.contains_key(&key) {
            return Err(AlreadyPending);
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(key, tx);
        Ok(rx)
    }

    /// Deliver a response, consuming the slot. Returns false when no
    /// request was pending (late or unsolicited response).
    pub fn resolve(&self, key: &K, value: V) -> bool {
        let sender = {
            let mut slots = self.slots.lock().expect("pending table lock poisoned");
            slots.remove(key)
        };
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Drop the slot without delivering, e.g. on timeout.
    pub fn cancel(&self, key: &K) -> bool {
        let mut slots = self.slots.lock().expect("pending table lock poisoned");
        slots.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("pending table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for PendingTable<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn resolve_delivers_and_clears() {
        let table: PendingTable<IpAddr, u32> = PendingTable::new();
        let rx = table.register(addr(1)).unwrap();

        assert!(table.resolve(&addr(1), 42));
        assert_eq!(rx.await.unwrap(), 42);
        assert!(table.is_empty());
    }

    #[test]
    fn second_registration_is_refused() {
        let table: PendingTable<IpAddr, u32> = PendingTable::new();
        let _rx = table.register(addr(1)).unwrap();
        assert_eq!(table.register(addr(1)).unwrap_err(), AlreadyPending);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unsolicited_response_is_ignored() {
        let table: PendingTable<IpAddr, u32> = PendingTable::new();
        assert!(!table.resolve(&addr(9), 1));
    }

    #[tokio::test]
    async fn cancel_clears_without_delivery() {
        let table: PendingTable<IpAddr, u32> = PendingTable::new();
        let rx = table.register(addr(1)).unwrap();

        assert!(table.cancel(&addr(1)));
        assert!(table.is_empty());
        // The receiver observes the dropped sender, not a value.
        assert!(rx.await.is_err());
        // Cancelling again is a no-op.
        assert!(!table.cancel(&addr(1)));
    }

    #[test]
    fn resolve_after_receiver_dropped_still_clears() {
        let table: PendingTable<IpAddr, u32> = PendingTable::new();
        let rx = table.register(addr(1)).unwrap();
        drop(rx);

        // Delivery fails but the slot is gone either way.
        assert!(!table.resolve(&addr(1), 42));
        assert!(table.is_empty());
    }
}
