//! Domain layer: the rows the ledger stores and the storage ports it needs.

pub mod account;
pub mod ids;
pub mod ports;
pub mod transfer;
pub mod user;
