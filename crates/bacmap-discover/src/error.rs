//! Error types for the bacmap-discover crate.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum DiscoverError {
    /// Fatal setup failure, raised before any network traffic.
    #[error("invalid scanner configuration: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("graph error: {0}")]
    Graph(#[from] bacmap_graph::GraphError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
