//! Core types shared across the bookkeeping system

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Account types following standard accounting principles, extended with
/// the debtor/creditor subledger types used for invoice tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - what the organization owns (cash, inventory, equipment)
    Asset,
    /// Liabilities - what the organization owes (loans, accounts payable)
    Liability,
    /// Expenses - costs incurred by the organization
    Expense,
    /// Revenues - money earned by the organization
    Revenue,
    /// Debtors - parties that owe the organization (accounts receivable)
    Debtor,
    /// Creditors - parties the organization owes (accounts payable)
    Creditor,
}

impl AccountType {
    /// Returns the side on which this account type's balance is
    /// conventionally positive. Assets, expenses, and debtors are
    /// debit-normal; liabilities, revenues, and creditors are credit-normal.
    pub fn normal_side(&self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense | AccountType::Debtor => Side::Debit,
            AccountType::Liability | AccountType::Revenue | AccountType::Creditor => Side::Credit,
        }
    }

    /// The side of the balance sheet this account type appears on, or
    /// `None` for the operational types (expense/revenue).
    pub fn balance_sheet_side(&self) -> Option<Side> {
        match self {
            AccountType::Asset | AccountType::Debtor => Some(Side::Debit),
            AccountType::Liability | AccountType::Creditor => Some(Side::Credit),
            AccountType::Expense | AccountType::Revenue => None,
        }
    }
}

/// The two sides of a double-entry ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// Lifecycle state of a bookkeeping. A closed bookkeeping rejects every
/// mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookState {
    Open,
    Closed,
}

/// Errors that can occur in the bookkeeping system.
///
/// All variants are detected before any state is mutated; multi-entity
/// operations either commit completely or leave the bookkeeping untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookkeepingError {
    #[error("{entity} with id '{id}' already exists")]
    DuplicateId { entity: &'static str, id: String },
    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("journal entry '{id}' is not balanced: debit {debit} != credit {credit}")]
    Imbalance {
        id: String,
        debit: BigDecimal,
        credit: BigDecimal,
    },
    #[error("{entity} '{id}' is still in use by {referrer}")]
    InUse {
        entity: &'static str,
        id: String,
        referrer: &'static str,
    },
    #[error("the bookkeeping is closed and can no longer be modified")]
    BookkeepingClosed,
    #[error("journal entry '{id}' has an invoice-linked detail without a payment")]
    UnmigratedInvoiceDetail { id: String },
    #[error("the bookkeeping has unsaved changes; save it before closing the period")]
    UnsavedChanges,
}

/// Result type for bookkeeping operations
pub type BookResult<T> = Result<T, BookkeepingError>;
