//! A concurrency-safe ledger: users, accounts and balance transfers.
//!
//! Calls go through [`application::engine::LedgerEngine`], which runs each one
//! as a storage transaction on a bounded worker pool and reports a single
//! outcome per accepted call.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;
