//! Error taxonomy for ccnd.
//!
//! Mirrors the per-face-transient / permanent / protocol-level / resource /
//! fatal split: everything here is recoverable by the caller. Fatal
//! conditions (signal received, local socket gone) are handled in the
//! daemon binary, not by constructing an `Error` variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLV structure: truncated length, bad type, buffer underflow.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Well-formed TLV but invalid at the NDN packet level (missing Name,
    /// oversized Content, bad selector).
    #[error("NDN packet error: {0}")]
    NdnPacket(String),

    /// Transport-level failure (connect, accept, send) on a face.
    #[error("transport error: {0}")]
    Transport(String),

    /// A table reached a hard capacity limit (MAXFACES, store overflow).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Bad or missing environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
