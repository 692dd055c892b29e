//! The BACnet application seam.
//!
//! Discovery consumes two narrow async traits. `BacnetApplication` covers
//! the application-layer broadcasts (Who-Is, Who-Is-Router-To-Network);
//! `BvllTransport` fires BVLL table-read requests whose acks come back
//! through `bvll::BvllService::confirm_*`. The datalink behind them
//! (sockets, framing, APDU codecs) is a collaborator this crate never
//! sees — every failure it surfaces is swallowed per probe or window,
//! never propagated raw out of a scan.

use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;

use bacmap_core::{BacnetAddress, DeviceInstance, NetworkNumber, VendorId};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("send failed: {0}")]
    Send(String),

    #[error("application setup failed: {0}")]
    Setup(String),
}

/// One I-Am response to a Who-Is broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IAm {
    pub address: BacnetAddress,
    pub device_id: DeviceInstance,
    pub vendor_id: VendorId,
}

/// One I-Am-Router-To-Network response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterAdvert {
    /// Name of the local adapter the response arrived on.
    pub adapter: String,
    pub address: BacnetAddress,
    pub networks: Vec<NetworkNumber>,
}

/// One foreign-device registration read from a BBMD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdtEntry {
    pub address: IpAddr,
    pub time_to_live: u16,
    pub remaining: u16,
}

/// Application-layer discovery broadcasts.
#[async_trait]
pub trait BacnetApplication: Send + Sync {
    /// Broadcast Who-Is over the inclusive instance range and collect the
    /// I-Am responses that arrive within the application's window.
    async fn who_is(
        &self,
        low: DeviceInstance,
        high: DeviceInstance,
    ) -> Result<Vec<IAm>, TransportError>;

    /// Broadcast Who-Is-Router-To-Network scoped to one network.
    async fn who_is_router_to_network(
        &self,
        network: NetworkNumber,
    ) -> Result<Vec<RouterAdvert>, TransportError>;
}

/// Fire-and-forget BVLL requests; acks are delivered out-of-band.
#[async_trait]
pub trait BvllTransport: Send + Sync {
    async fn send_read_bdt(&self, dest: IpAddr) -> Result<(), TransportError>;

    async fn send_read_fdt(&self, dest: IpAddr) -> Result<(), TransportError>;
}
