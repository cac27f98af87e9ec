//! Error types for the ndnd implementation.

use thiserror::Error;

/// All possible errors that can occur within the ndnd implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to network-layer packet processing.
    #[error("packet error: {0}")]
    Packet(String),

    /// Error related to the NDNLP link-layer envelope.
    #[error("link protocol error: {0}")]
    LinkProtocol(String),

    /// Error related to a face or its transport.
    #[error("face error: {0}")]
    Face(String),

    /// Illegal face state transition. Programmer error, never recovered.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Error in a management command or dataset.
    #[error("management error: {0}")]
    Management(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
