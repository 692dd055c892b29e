//! bacmap-core: Shared BACnet domain types for the bacmap topology scanner.
//!
//! This crate provides the foundational types used across all bacmap
//! components:
//! - Device instance and network number newtypes with domain validation
//! - Vendor identifiers and their IRI form
//! - Transport addresses (BACnet/IP or routed network+MAC)
//! - Common error types

pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{BacnetAddress, DeviceInstance, NetworkNumber, VendorId, BACNET_UDP_PORT};
