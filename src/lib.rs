//! # Bookkeeping Core
//!
//! A double-entry bookkeeping engine for a small organization: accounts,
//! journal entries, invoices, and payments, with point-in-time reporting
//! and period closing.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: every journal entry is validated to have
//!   equal debit and credit totals before it is accepted
//! - **Invoice reconciliation**: payments are derived from invoice-linked
//!   journal entry details and kept in lock-step with them
//! - **Point-in-time reporting**: balance sheet, operational result, and
//!   debtor/creditor overviews as of any date, without mutating state
//! - **Period closing**: roll balances, open invoices, and settings forward
//!   into a fresh bookkeeping while freezing the old one
//! - **Change notification**: every committed mutation dispatches a domain
//!   event to registered listeners
//!
//! ## Quick Start
//!
//! ```rust
//! use bookkeeping_core::{Account, AccountType, Bookkeeping, JournalEntryBuilder};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
//! let mut book = Bookkeeping::new(start);
//!
//! book.create_account(Account::new("100", "Cash", AccountType::Asset)).unwrap();
//! book.create_account(Account::new("300", "Sales", AccountType::Revenue)).unwrap();
//!
//! let sale = JournalEntryBuilder::new("t1", start, "First sale")
//!     .debit("100", BigDecimal::from(250))
//!     .credit("300", BigDecimal::from(250))
//!     .build()
//!     .unwrap();
//! book.add_journal_entry(sale, false).unwrap();
//!
//! let balance = book.get_account_balance("100", start).unwrap();
//! assert_eq!(balance, BigDecimal::from(250));
//! ```
//!
//! The core performs no file I/O; a persistence adapter iterates the
//! `find_all_*` operations to save and replays create operations to load.
//! Callers must serialize writes to one [`Bookkeeping`] instance.

pub mod bookkeeping;
pub mod closing;
pub mod invoice;
pub mod ledger;
pub mod party;
pub mod report;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use bookkeeping::{Bookkeeping, Settings};
pub use closing::close_bookkeeping;
pub use invoice::*;
pub use ledger::*;
pub use party::*;
pub use report::*;
pub use traits::*;
pub use types::*;
