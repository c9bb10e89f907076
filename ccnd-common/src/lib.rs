//! Wire types and shared infrastructure for the ccnd content-centric
//! networking forwarder.
//!
//! This crate provides the pieces every other crate in the workspace
//! depends on: the Interest/ContentObject wire model, the TLV codec used
//! to get them on and off the network, the error taxonomy, and metrics.

pub mod error;
pub mod metrics;
pub mod ndn;
pub mod tlv;
pub mod types;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
