use thiserror::Error;

/// Errors from constructing or parsing core BACnet types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("device instance {0} out of range 0..=4194303")]
    InstanceOutOfRange(u32),

    #[error("network number {0} out of range 0..=65534")]
    NetworkOutOfRange(u32),

    #[error("invalid BACnet address: {0}")]
    AddressParse(String),
}
