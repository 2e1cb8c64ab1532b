//! Application layer: the `LedgerEngine` facade and what runs behind it.
//!
//! Calls are validated on the caller's thread, queued on a bounded worker
//! pool, and executed as one storage transaction each. Transfers lock their
//! two account rows in ascending id order.

pub mod dispatch;
pub mod engine;
pub mod locking;
pub mod operations;
pub mod outcome;
