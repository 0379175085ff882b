//! Invoices, invoice detail lines, and payments

pub mod template;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::Ledger;
use crate::types::*;
use crate::utils::validation::validate_id;

pub use template::*;

/// A presentation-only line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub description: String,
    pub amount: Option<BigDecimal>,
}

/// An invoice sent to or received from a party.
///
/// `amount_to_be_paid` is signed: positive means the party owes the
/// organization (sale), negative means the organization owes the party
/// (purchase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub concerning_party_id: String,
    pub paying_party_id: String,
    pub issue_date: NaiveDate,
    pub amount_to_be_paid: BigDecimal,
    pub details: Vec<InvoiceDetail>,
}

impl Invoice {
    /// True when this invoice tracks money owed to the organization.
    pub fn is_debtor_invoice(&self) -> bool {
        self.amount_to_be_paid >= BigDecimal::from(0)
    }
}

/// A payment toward an invoice, derived from an invoice-linked journal
/// entry detail. Owned by the ledger, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub description: String,
}

/// The collection of invoices of one bookkeeping, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InvoiceBook {
    invoices: HashMap<String, Invoice>,
}

impl InvoiceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an invoice. Fails when the id is already taken.
    pub fn create_invoice(&mut self, invoice: Invoice) -> BookResult<()> {
        validate_id("invoice", &invoice.id)?;
        validate_id("invoice", &invoice.concerning_party_id)?;
        validate_id("invoice", &invoice.paying_party_id)?;

        if self.invoices.contains_key(&invoice.id) {
            return Err(BookkeepingError::DuplicateId {
                entity: "invoice",
                id: invoice.id,
            });
        }

        self.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    /// Replace an existing invoice. The id is immutable.
    pub fn update_invoice(&mut self, invoice: Invoice) -> BookResult<()> {
        if !self.invoices.contains_key(&invoice.id) {
            return Err(BookkeepingError::NotFound {
                entity: "invoice",
                id: invoice.id,
            });
        }

        self.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    /// Remove an invoice. Reference guards live one level up, where the
    /// ledger is in scope.
    pub(crate) fn delete_invoice(&mut self, invoice_id: &str) -> BookResult<()> {
        if self.invoices.remove(invoice_id).is_none() {
            return Err(BookkeepingError::NotFound {
                entity: "invoice",
                id: invoice_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn get_invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices.get(invoice_id)
    }

    pub fn get_invoice_required(&self, invoice_id: &str) -> BookResult<&Invoice> {
        self.invoices
            .get(invoice_id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "invoice",
                id: invoice_id.to_string(),
            })
    }

    pub fn contains(&self, invoice_id: &str) -> bool {
        self.invoices.contains_key(invoice_id)
    }

    /// All invoices, sorted by id.
    pub fn find_all_invoices(&self) -> Vec<&Invoice> {
        let mut invoices: Vec<&Invoice> = self.invoices.values().collect();
        invoices.sort_by(|a, b| a.id.cmp(&b.id));
        invoices
    }

    /// What remains to be paid on an invoice as of a date: the invoice
    /// amount minus all payments dated on or before that date.
    pub fn get_remaining_amount_to_be_paid(
        &self,
        ledger: &Ledger,
        invoice_id: &str,
        as_of_date: NaiveDate,
    ) -> BookResult<BigDecimal> {
        let invoice = self.get_invoice_required(invoice_id)?;

        let paid: BigDecimal = ledger
            .find_payments(invoice_id)
            .iter()
            .filter(|p| p.date <= as_of_date)
            .map(|p| &p.amount)
            .sum();

        Ok(&invoice.amount_to_be_paid - &paid)
    }

    /// An invoice is paid exactly when nothing remains to be paid.
    pub fn is_paid(
        &self,
        ledger: &Ledger,
        invoice_id: &str,
        as_of_date: NaiveDate,
    ) -> BookResult<bool> {
        let remaining = self.get_remaining_amount_to_be_paid(ledger, invoice_id, as_of_date)?;
        Ok(remaining == BigDecimal::from(0))
    }
}
