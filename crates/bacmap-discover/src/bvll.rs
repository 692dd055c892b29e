//! BVLL table reads with timeout-bounded correlation.
//!
//! `BvllService` is the discovery-side half of the BVLL exchange: it
//! registers a pending slot keyed by destination address, fires the
//! request through the transport, and waits out the timeout. The datalink
//! collaborator delivers acks through a cloned `BvllHandle`. A timeout,
//! send failure, or duplicate in-flight probe is a negative result
//! ("not available"), never an error.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::pending::PendingTable;
use crate::transport::{BvllTransport, FdtEntry};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The delivery half: the datalink rx loop resolves pending reads here.
#[derive(Clone, Default)]
pub struct BvllHandle {
    read_bdt_pending: Arc<PendingTable<IpAddr, Vec<IpAddr>>>,
    read_fdt_pending: Arc<PendingTable<IpAddr, Vec<FdtEntry>>>,
}

impl BvllHandle {
    /// Deliver a Read-Broadcast-Distribution-Table-Ack.
    pub fn confirm_bdt(&self, source: IpAddr, entries: Vec<IpAddr>) {
        if !self.read_bdt_pending.resolve(&source, entries) {
            tracing::debug!(source = %source, "Unsolicited BDT ack dropped");
        }
    }

    /// Deliver a Read-Foreign-Device-Table-Ack.
    pub fn confirm_fdt(&self, source: IpAddr, entries: Vec<FdtEntry>) {
        if !self.read_fdt_pending.resolve(&source, entries) {
            tracing::debug!(source = %source, "Unsolicited FDT ack dropped");
        }
    }

    fn pending_probes(&self) -> usize {
        self.read_bdt_pending.len() + self.read_fdt_pending.len()
    }
}

/// The request half, owned by the scanner.
pub struct BvllService<T> {
    transport: T,
    handle: BvllHandle,
    timeout: Duration,
}

impl<T: BvllTransport> BvllService<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            handle: BvllHandle::default(),
            timeout,
        }
    }

    /// Handle for the datalink to deliver acks through.
    pub fn handle(&self) -> BvllHandle {
        self.handle.clone()
    }

    /// Read the Broadcast Distribution Table of a suspected BBMD.
    ///
    /// `Some(entries)` means the device answered like a BBMD; `None`
    /// covers timeout, send failure, and duplicate in-flight probes.
    pub async fn read_broadcast_distribution_table(&self, dest: IpAddr) -> Option<Vec<IpAddr>> {
        let rx = match self.handle.read_bdt_pending.register(dest) {
            Ok(rx) => rx,
            Err(_) => {
                tracing::warn!(dest = %dest, "BDT read already in flight, skipping");
                return None;
            }
        };

        if let Err(e) = self.transport.send_read_bdt(dest).await {
            self.handle.read_bdt_pending.cancel(&dest);
            tracing::debug!(dest = %dest, error = %e, "BDT read send failed");
            return None;
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(entries)) => Some(entries),
            Ok(Err(_)) => {
                // Sender dropped; slot already removed.
                tracing::warn!(dest = %dest, "BDT read cancelled");
                None
            }
            Err(_) => {
                self.handle.read_bdt_pending.cancel(&dest);
                tracing::debug!(
                    dest = %dest,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "BDT read timed out"
                );
                None
            }
        }
    }

    /// Read the Foreign Device Table of a configured BBMD. Best-effort;
    /// same negative-result contract as the BDT read.
    pub async fn read_foreign_device_table(&self, dest: IpAddr) -> Option<Vec<FdtEntry>> {
        let rx = match self.handle.read_fdt_pending.register(dest) {
            Ok(rx) => rx,
            Err(_) => {
                tracing::warn!(dest = %dest, "FDT read already in flight, skipping");
                return None;
            }
        };

        if let Err(e) = self.transport.send_read_fdt(dest).await {
            self.handle.read_fdt_pending.cancel(&dest);
            tracing::debug!(dest = %dest, error = %e, "FDT read send failed");
            return None;
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(entries)) => Some(entries),
            Ok(Err(_)) => {
                tracing::warn!(dest = %dest, "FDT read cancelled");
                None
            }
            Err(_) => {
                self.handle.read_fdt_pending.cancel(&dest);
                tracing::debug!(
                    dest = %dest,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "FDT read timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Transport stub that records sends and optionally fails them.
    #[derive(Default)]
    struct StubTransport {
        fail_sends: AtomicBool,
        bdt_sent: AtomicBool,
    }

    #[async_trait]
    impl BvllTransport for Arc<StubTransport> {
        async fn send_read_bdt(&self, _dest: IpAddr) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::Send("wire down".into()));
            }
            self.bdt_sent.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send_read_fdt(&self, _dest: IpAddr) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::Send("wire down".into()));
            }
            Ok(())
        }
    }

    fn dest(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[tokio::test]
    async fn bdt_read_resolves_on_ack() {
        let stub = Arc::new(StubTransport::default());
        let service = Arc::new(BvllService::new(stub.clone(), Duration::from_secs(1)));
        let handle = service.handle();

        let reader = {
            let service = service.clone();
            tokio::spawn(async move { service.read_broadcast_distribution_table(dest(1)).await })
        };

        // Let the read register and send before confirming.
        while !stub.bdt_sent.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        handle.confirm_bdt(dest(1), vec![dest(2), dest(3)]);

        let entries = reader.await.unwrap().unwrap();
        assert_eq!(entries, vec![dest(2), dest(3)]);
        assert_eq!(handle.pending_probes(), 0);
    }

    #[tokio::test]
    async fn ack_buffered_before_await_is_delivered() {
        // The datalink may answer between send and the first poll of the
        // receiver; the slot must buffer the value.
        struct EchoTransport(BvllHandle);

        #[async_trait]
        impl BvllTransport for Arc<EchoTransport> {
            async fn send_read_bdt(&self, dest: IpAddr) -> Result<(), TransportError> {
                self.0.confirm_bdt(dest, vec![dest]);
                Ok(())
            }

            async fn send_read_fdt(&self, _dest: IpAddr) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let handle = BvllHandle::default();
        let service = BvllService {
            transport: Arc::new(EchoTransport(handle.clone())),
            handle,
            timeout: Duration::from_secs(1),
        };

        let entries = service.read_broadcast_distribution_table(dest(5)).await;
        assert_eq!(entries, Some(vec![dest(5)]));
    }

    #[tokio::test(start_paused = true)]
    async fn bdt_read_times_out_to_negative_result() {
        let stub = Arc::new(StubTransport::default());
        let service = BvllService::new(stub, Duration::from_secs(5));
        let handle = service.handle();

        // No ack ever arrives; paused time fast-forwards the timeout.
        let result = service.read_broadcast_distribution_table(dest(1)).await;
        assert!(result.is_none());
        assert_eq!(handle.pending_probes(), 0);

        // A late ack after the timeout is dropped, not delivered.
        handle.confirm_bdt(dest(1), vec![dest(2)]);
        assert_eq!(handle.pending_probes(), 0);
    }

    #[tokio::test]
    async fn send_failure_is_negative_and_clears_slot() {
        let stub = Arc::new(StubTransport::default());
        stub.fail_sends.store(true, Ordering::SeqCst);
        let service = BvllService::new(stub, Duration::from_secs(1));
        let handle = service.handle();

        assert!(service
            .read_broadcast_distribution_table(dest(1))
            .await
            .is_none());
        assert!(service.read_foreign_device_table(dest(1)).await.is_none());
        assert_eq!(handle.pending_probes(), 0);
    }

    #[tokio::test]
    async fn unsolicited_ack_is_dropped() {
        let stub = Arc::new(StubTransport::default());
        let service = BvllService::new(stub, Duration::from_secs(1));
        let handle = service.handle();

        // Nothing pending; must not panic or leave state behind.
        handle.confirm_bdt(dest(7), vec![]);
        handle.confirm_fdt(dest(7), vec![]);
        assert_eq!(handle.pending_probes(), 0);
    }
}
