//! Journal entries and their detail lines

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::utils::validation::{validate_id, validate_non_negative_amount};

/// A single line of a journal entry.
///
/// A detail with a non-null `invoice_id` either belongs to the entry that
/// created the invoice (then the entry's `id_of_created_invoice` matches)
/// or represents a payment toward the invoice (then `payment_id` references
/// a payment row kept in lock-step by the ledger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryDetail {
    pub account_id: String,
    pub amount: BigDecimal,
    pub side: Side,
    /// Weak reference to a party, used by bank-statement import flows.
    pub party_id: Option<String>,
    pub invoice_id: Option<String>,
    pub payment_id: Option<String>,
}

impl JournalEntryDetail {
    pub fn new(account_id: impl Into<String>, amount: BigDecimal, side: Side) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
            side,
            party_id: None,
            invoice_id: None,
            payment_id: None,
        }
    }

    pub fn for_invoice(mut self, invoice_id: impl Into<String>) -> Self {
        self.invoice_id = Some(invoice_id.into());
        self
    }

    pub fn for_party(mut self, party_id: impl Into<String>) -> Self {
        self.party_id = Some(party_id.into());
        self
    }

    /// The signed amount this detail contributes to a payment: credits on
    /// a debtor account reduce what is owed to the organization, so credit
    /// details count positive and debit details negative.
    pub fn payment_amount(&self) -> BigDecimal {
        match self.side {
            Side::Credit => self.amount.clone(),
            Side::Debit => -&self.amount,
        }
    }
}

/// A journal entry: a dated, described, balanced list of detail lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub details: Vec<JournalEntryDetail>,
    /// Set on the entry that originated an invoice; removing the entry
    /// removes the invoice as well.
    pub id_of_created_invoice: Option<String>,
}

impl JournalEntry {
    pub fn new(id: impl Into<String>, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date,
            description: description.into(),
            details: Vec::new(),
            id_of_created_invoice: None,
        }
    }

    pub fn total_debits(&self) -> BigDecimal {
        self.details
            .iter()
            .filter(|d| d.side == Side::Debit)
            .map(|d| &d.amount)
            .sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.details
            .iter()
            .filter(|d| d.side == Side::Credit)
            .map(|d| &d.amount)
            .sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// True for details that mark the creation of an invoice rather than a
    /// payment toward one.
    pub fn is_creating_detail(&self, detail: &JournalEntryDetail) -> bool {
        detail.invoice_id.is_some() && detail.invoice_id == self.id_of_created_invoice
    }

    /// Validate the shape of the entry: id present, at least one detail,
    /// amounts non-negative, and debits equal to credits.
    pub fn validate(&self) -> BookResult<()> {
        validate_id("journal entry", &self.id)?;

        if self.details.is_empty() {
            return Err(BookkeepingError::Validation {
                field: "journal entry",
                message: format!("entry '{}' must have at least one detail", self.id),
            });
        }

        for detail in &self.details {
            validate_id("journal entry detail", &detail.account_id)?;
            validate_non_negative_amount("journal entry detail", &detail.amount)?;
        }

        let debit = self.total_debits();
        let credit = self.total_credits();
        if debit != credit {
            return Err(BookkeepingError::Imbalance {
                id: self.id.clone(),
                debit,
                credit,
            });
        }

        Ok(())
    }
}

/// Builder for journal entries.
#[derive(Debug)]
pub struct JournalEntryBuilder {
    entry: JournalEntry,
}

impl JournalEntryBuilder {
    pub fn new(id: impl Into<String>, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            entry: JournalEntry::new(id, date, description),
        }
    }

    pub fn debit(mut self, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        self.entry
            .details
            .push(JournalEntryDetail::new(account_id, amount, Side::Debit));
        self
    }

    pub fn credit(mut self, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        self.entry
            .details
            .push(JournalEntryDetail::new(account_id, amount, Side::Credit));
        self
    }

    pub fn detail(mut self, detail: JournalEntryDetail) -> Self {
        self.entry.details.push(detail);
        self
    }

    /// Mark this entry as the creating entry of the given invoice.
    pub fn creates_invoice(mut self, invoice_id: impl Into<String>) -> Self {
        self.entry.id_of_created_invoice = Some(invoice_id.into());
        self
    }

    pub fn build(self) -> BookResult<JournalEntry> {
        self.entry.validate()?;
        Ok(self.entry)
    }
}
