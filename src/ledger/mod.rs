//! Ledger module containing the chart of accounts and the journal

pub mod account;
pub mod core;
pub mod entry;

pub use account::*;
pub use core::*;
pub use entry::*;
