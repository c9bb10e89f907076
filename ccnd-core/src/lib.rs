//! The ccnd forwarding engine.
//!
//! This crate implements the pending-interest-table / forwarding-information-base
//! / content-store triangle and the single-threaded event loop that drives it.
//! Every table here is owned by the loop and mutated only from it — there are
//! no locks and no atomics anywhere in this crate.

pub mod config;
pub mod content_engine;
pub mod content_store;
pub mod daemon;
pub mod delivery_queue;
pub mod face_table;
pub mod fib;
pub mod interest_engine;
pub mod pit;
pub mod reactor;
pub mod reapers;

pub use daemon::Daemon;
