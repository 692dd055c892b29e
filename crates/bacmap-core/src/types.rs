//! Core BACnet domain types.
//!
//! These newtypes carry the domain constraints of the BACnet standard
//! (instance and network number ranges, the default BVLL UDP port) so the
//! scanner and graph crates never pass bare integers around.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default BACnet/IP UDP port (0xBAC0).
pub const BACNET_UDP_PORT: u16 = 47808;

// ── Device Instance ───────────────────────────────────────────────

/// A BACnet device object instance number.
///
/// Valid instances occupy `0..=4194303`; the upper bound is the wildcard
/// instance reserved by the standard for unconfigured devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DeviceInstance(u32);

impl DeviceInstance {
    pub const MAX: DeviceInstance = DeviceInstance(4_194_303);

    pub fn new(raw: u32) -> Result<Self, CoreError> {
        if raw > Self::MAX.0 {
            return Err(CoreError::InstanceOutOfRange(raw));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DeviceInstance {
    type Error = CoreError;

    fn try_from(raw: u32) -> Result<Self, CoreError> {
        Self::new(raw)
    }
}

impl From<DeviceInstance> for u32 {
    fn from(instance: DeviceInstance) -> u32 {
        instance.0
    }
}

impl fmt::Display for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Network Number ────────────────────────────────────────────────

/// A logical BACnet network number.
///
/// Valid numbers occupy `0..=65534`; 65535 is the global-broadcast
/// network and never identifies a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct NetworkNumber(u16);

impl NetworkNumber {
    pub const MAX: NetworkNumber = NetworkNumber(65_534);

    pub fn new(raw: u32) -> Result<Self, CoreError> {
        if raw > u32::from(Self::MAX.0) {
            return Err(CoreError::NetworkOutOfRange(raw));
        }
        Ok(Self(raw as u16))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u32> for NetworkNumber {
    type Error = CoreError;

    fn try_from(raw: u32) -> Result<Self, CoreError> {
        Self::new(raw)
    }
}

impl From<NetworkNumber> for u32 {
    fn from(network: NetworkNumber) -> u32 {
        u32::from(network.0)
    }
}

impl fmt::Display for NetworkNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Vendor ────────────────────────────────────────────────────────

/// An ASHRAE-assigned vendor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub u16);

impl VendorId {
    /// IRI-style reference used for the `vendor-id` graph property.
    pub fn iri(self) -> String {
        format!("vendor://{}", self.0)
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Transport Address ─────────────────────────────────────────────

/// An opaque BACnet transport address.
///
/// Devices answering a Who-Is either live on the local BACnet/IP segment
/// (`Ip`) or behind a router on another network, addressed by network
/// number and station MAC (`Route`, e.g. MS/TP). Only `Ip` addresses can
/// be associated with an IP subnet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacnetAddress {
    Ip { addr: IpAddr, port: u16 },
    Route { network: NetworkNumber, mac: Vec<u8> },
}

impl BacnetAddress {
    /// A BACnet/IP address on the default UDP port.
    pub fn ip(addr: IpAddr) -> Self {
        Self::Ip {
            addr,
            port: BACNET_UDP_PORT,
        }
    }

    pub fn route(network: NetworkNumber, mac: Vec<u8>) -> Self {
        Self::Route { network, mac }
    }

    /// The IP address, if this is a BACnet/IP endpoint.
    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Self::Ip { addr, .. } => Some(*addr),
            Self::Route { .. } => None,
        }
    }

    /// The network number, if this is a routed station.
    pub fn network(&self) -> Option<NetworkNumber> {
        match self {
            Self::Ip { .. } => None,
            Self::Route { network, .. } => Some(*network),
        }
    }
}

impl fmt::Display for BacnetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // The default port is elided, matching how BACnet tooling
            // prints station addresses.
            Self::Ip { addr, port } if *port == BACNET_UDP_PORT => write!(f, "{addr}"),
            Self::Ip {
                addr: IpAddr::V6(addr),
                port,
            } => write!(f, "[{addr}]:{port}"),
            Self::Ip { addr, port } => write!(f, "{addr}:{port}"),
            Self::Route { network, mac } => {
                write!(f, "{network}:0x")?;
                for byte in mac {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for BacnetAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        let parse_err = || CoreError::AddressParse(s.to_string());

        // Bare IP address, default port.
        if let Ok(addr) = s.parse::<IpAddr>() {
            return Ok(Self::ip(addr));
        }

        let (head, tail) = s.rsplit_once(':').ok_or_else(parse_err)?;

        // "<network>:0x<mac>" routed station.
        if let Some(hex) = tail.strip_prefix("0x") {
            let raw: u32 = head.parse().map_err(|_| parse_err())?;
            let network = NetworkNumber::new(raw)?;
            let mac = decode_hex(hex).ok_or_else(parse_err)?;
            return Ok(Self::Route { network, mac });
        }

        // "<ip>:<port>" or "[<ipv6>]:<port>".
        let port: u16 = tail.parse().map_err(|_| parse_err())?;
        let host = head
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(head);
        let addr = host.parse::<IpAddr>().map_err(|_| parse_err())?;
        Ok(Self::Ip { addr, port })
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_range_is_enforced() {
        assert!(DeviceInstance::new(0).is_ok());
        assert!(DeviceInstance::new(4_194_303).is_ok());
        assert_eq!(
            DeviceInstance::new(4_194_304),
            Err(CoreError::InstanceOutOfRange(4_194_304))
        );
    }

    #[test]
    fn instance_serde_validates() {
        let ok: DeviceInstance = serde_json::from_str("1234").unwrap();
        assert_eq!(ok.get(), 1234);
        assert!(serde_json::from_str::<DeviceInstance>("4194304").is_err());
    }

    #[test]
    fn network_range_is_enforced() {
        assert!(NetworkNumber::new(0).is_ok());
        assert!(NetworkNumber::new(65_534).is_ok());
        assert_eq!(
            NetworkNumber::new(65_535),
            Err(CoreError::NetworkOutOfRange(65_535))
        );
    }

    #[test]
    fn vendor_iri() {
        assert_eq!(VendorId(999).iri(), "vendor://999");
    }

    #[test]
    fn ip_address_display_elides_default_port() {
        let addr = BacnetAddress::ip("10.0.0.5".parse().unwrap());
        assert_eq!(addr.to_string(), "10.0.0.5");

        let odd_port = BacnetAddress::Ip {
            addr: "10.0.0.5".parse().unwrap(),
            port: 47_809,
        };
        assert_eq!(odd_port.to_string(), "10.0.0.5:47809");
    }

    #[test]
    fn routed_address_display() {
        let addr = BacnetAddress::route(NetworkNumber::new(2001).unwrap(), vec![0x08]);
        assert_eq!(addr.to_string(), "2001:0x08");
        assert_eq!(addr.network().unwrap().get(), 2001);
        assert!(addr.as_ip().is_none());
    }

    #[test]
    fn address_parse_round_trip() {
        for raw in ["10.0.0.5", "10.0.0.5:47809", "2001:0x08", "12:0xdeadbeef"] {
            let addr: BacnetAddress = raw.parse().unwrap();
            assert_eq!(addr.to_string(), raw);
        }
    }

    #[test]
    fn address_parse_rejects_garbage() {
        assert!("not-an-address".parse::<BacnetAddress>().is_err());
        assert!("10.0.0.5:notaport".parse::<BacnetAddress>().is_err());
        assert!("70000:0x08".parse::<BacnetAddress>().is_err());
    }
}
