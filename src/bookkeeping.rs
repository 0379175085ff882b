//! The bookkeeping document handle
//!
//! A [`Bookkeeping`] owns the four registries of one administration plus
//! its settings and lifecycle state. There is no process-wide instance:
//! callers hold explicit handles, and period closing hands out a fresh one.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::closing;
use crate::invoice::{
    BatchOutcome, Invoice, InvoiceBook, InvoiceParty, InvoiceTemplate, Payment,
};
use crate::ledger::{Account, AccountRegistry, JournalEntry, Ledger};
use crate::party::{Party, PartyRegistry, PartySearchCriteria};
use crate::report::{Report, ReportBuilder};
use crate::traits::{ChangeEvent, ChangeListener, ListenerRegistry, ProgressListener};
use crate::types::*;

/// Global and party-specific key/value settings of a bookkeeping,
/// carried forward verbatim when a period is closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    values: BTreeMap<String, String>,
    party_values: BTreeMap<String, BTreeMap<String, String>>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get_for_party(&self, party_id: &str, key: &str) -> Option<&str> {
        self.party_values
            .get(party_id)?
            .get(key)
            .map(String::as_str)
    }

    pub fn set_for_party(
        &mut self,
        party_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.party_values
            .entry(party_id.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub(crate) fn remove_party(&mut self, party_id: &str) {
        self.party_values.remove(party_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One bookkeeping: accounts, parties, journal, invoices, settings.
///
/// All mutations go through this handle. They are rejected once the
/// bookkeeping is closed, they validate before touching any state, and
/// each successful one dispatches a single [`ChangeEvent`] after commit.
/// Callers must serialize writes; reads are safe at any point between
/// writes and never observe a partially applied operation.
pub struct Bookkeeping {
    start_of_period: NaiveDate,
    state: BookState,
    accounts: AccountRegistry,
    parties: PartyRegistry,
    ledger: Ledger,
    invoices: InvoiceBook,
    settings: Settings,
    listeners: ListenerRegistry,
    dirty: bool,
}

impl std::fmt::Debug for Bookkeeping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bookkeeping")
            .field("start_of_period", &self.start_of_period)
            .field("state", &self.state)
            .field("accounts", &self.accounts.len())
            .field("parties", &self.parties.len())
            .field("journal_entries", &self.ledger.len())
            .finish()
    }
}

impl Bookkeeping {
    /// A fresh, open bookkeeping whose reporting period starts at the
    /// given date.
    pub fn new(start_of_period: NaiveDate) -> Self {
        Self {
            start_of_period,
            state: BookState::Open,
            accounts: AccountRegistry::new(),
            parties: PartyRegistry::new(),
            ledger: Ledger::new(),
            invoices: InvoiceBook::new(),
            settings: Settings::default(),
            listeners: ListenerRegistry::new(),
            dirty: false,
        }
    }

    pub fn start_of_period(&self) -> NaiveDate {
        self.start_of_period
    }

    pub fn state(&self) -> BookState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == BookState::Closed
    }

    fn ensure_open(&self) -> BookResult<()> {
        match self.state {
            BookState::Open => Ok(()),
            BookState::Closed => Err(BookkeepingError::BookkeepingClosed),
        }
    }

    fn commit(&mut self, event: ChangeEvent) {
        self.dirty = true;
        self.listeners.notify(&event);
    }

    // Change notification and persistence support

    pub fn add_change_listener(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.register(listener);
    }

    /// Whether mutations happened since the last [`mark_saved`](Self::mark_saved).
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Called by the persistence adapter after a successful save or load.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    // Accounts

    pub fn create_account(&mut self, account: Account) -> BookResult<()> {
        self.ensure_open()?;
        let id = account.id.clone();
        self.accounts.create_account(account)?;
        self.commit(ChangeEvent::AccountCreated { id });
        Ok(())
    }

    pub fn update_account(&mut self, account: Account) -> BookResult<()> {
        self.ensure_open()?;
        let id = account.id.clone();
        self.accounts.update_account(account)?;
        self.commit(ChangeEvent::AccountUpdated { id });
        Ok(())
    }

    /// Delete an account. Fails while any journal entry detail still
    /// references it (which covers invoices, whose debtor or creditor
    /// account is referenced through their creating entry).
    pub fn delete_account(&mut self, account_id: &str) -> BookResult<()> {
        self.ensure_open()?;
        self.accounts.get_account_required(account_id)?;
        if self.is_account_used(account_id) {
            return Err(BookkeepingError::InUse {
                entity: "account",
                id: account_id.to_string(),
                referrer: "journal entry",
            });
        }
        self.accounts.delete_account(account_id)?;
        self.commit(ChangeEvent::AccountDeleted {
            id: account_id.to_string(),
        });
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get_account(account_id)
    }

    pub fn find_all_accounts(&self) -> Vec<&Account> {
        self.accounts.find_all_accounts()
    }

    /// Exposed so callers can explain a delete failure up front.
    pub fn is_account_used(&self, account_id: &str) -> bool {
        self.ledger.is_account_used(account_id)
    }

    // Parties

    pub fn create_party(&mut self, party: Party) -> BookResult<Party> {
        self.ensure_open()?;
        let party = self.parties.create_party(party)?;
        self.commit(ChangeEvent::PartyCreated {
            id: party.id.clone(),
        });
        Ok(party)
    }

    pub fn update_party(&mut self, party: Party) -> BookResult<()> {
        self.ensure_open()?;
        let id = party.id.clone();
        self.parties.update_party(party)?;
        self.commit(ChangeEvent::PartyUpdated { id });
        Ok(())
    }

    /// Delete a party. Fails while any invoice or journal entry detail
    /// still references it.
    pub fn delete_party(&mut self, party_id: &str) -> BookResult<()> {
        self.ensure_open()?;
        self.parties.get_party_required(party_id)?;

        let referenced_by_invoice = self.invoices.find_all_invoices().iter().any(|invoice| {
            invoice.concerning_party_id == party_id || invoice.paying_party_id == party_id
        });
        if referenced_by_invoice {
            return Err(BookkeepingError::InUse {
                entity: "party",
                id: party_id.to_string(),
                referrer: "invoice",
            });
        }
        if self.ledger.is_party_used(party_id) {
            return Err(BookkeepingError::InUse {
                entity: "party",
                id: party_id.to_string(),
                referrer: "journal entry",
            });
        }

        self.parties.delete_party(party_id)?;
        self.settings.remove_party(party_id);
        self.commit(ChangeEvent::PartyDeleted {
            id: party_id.to_string(),
        });
        Ok(())
    }

    pub fn get_party(&self, party_id: &str) -> Option<&Party> {
        self.parties.get_party(party_id)
    }

    pub fn find_all_parties(&self) -> Vec<&Party> {
        self.parties.find_all_parties()
    }

    pub fn find_parties(&self, criteria: &PartySearchCriteria) -> Vec<&Party> {
        self.parties.find_parties(criteria)
    }

    pub fn set_party_tags(&mut self, party_id: &str, tags: Vec<String>) -> BookResult<()> {
        self.ensure_open()?;
        self.parties.set_party_tags(party_id, tags)?;
        self.commit(ChangeEvent::PartyTagsChanged {
            id: party_id.to_string(),
        });
        Ok(())
    }

    pub fn add_party_tag(&mut self, party_id: &str, tag: impl Into<String>) -> BookResult<()> {
        self.ensure_open()?;
        self.parties.add_party_tag(party_id, tag)?;
        self.commit(ChangeEvent::PartyTagsChanged {
            id: party_id.to_string(),
        });
        Ok(())
    }

    pub fn remove_party_tag(&mut self, party_id: &str, tag: &str) -> BookResult<()> {
        self.ensure_open()?;
        self.parties.remove_party_tag(party_id, tag)?;
        self.commit(ChangeEvent::PartyTagsChanged {
            id: party_id.to_string(),
        });
        Ok(())
    }

    pub fn party_tags(&self, party_id: &str) -> Vec<&str> {
        self.parties.party_tags(party_id)
    }

    // Journal

    fn validate_detail_party_references(&self, entry: &JournalEntry) -> BookResult<()> {
        for detail in &entry.details {
            if let Some(party_id) = &detail.party_id {
                self.parties.get_party_required(party_id)?;
            }
        }
        Ok(())
    }

    /// Add a journal entry, creating payments for invoice-linked details
    /// when `create_payments` is set. See [`Ledger::add_journal_entry`].
    pub fn add_journal_entry(
        &mut self,
        entry: JournalEntry,
        create_payments: bool,
    ) -> BookResult<JournalEntry> {
        self.ensure_open()?;
        self.validate_detail_party_references(&entry)?;
        let entry =
            self.ledger
                .add_journal_entry(&self.accounts, &self.invoices, entry, create_payments)?;
        self.commit(ChangeEvent::JournalEntryAdded {
            id: entry.id.clone(),
        });
        Ok(entry)
    }

    /// Replace a journal entry, reconciling its payments with the new
    /// details. See [`Ledger::update_journal_entry`].
    pub fn update_journal_entry(&mut self, entry: JournalEntry) -> BookResult<JournalEntry> {
        self.ensure_open()?;
        self.validate_detail_party_references(&entry)?;
        let entry = self
            .ledger
            .update_journal_entry(&self.accounts, &self.invoices, entry)?;
        self.commit(ChangeEvent::JournalEntryUpdated {
            id: entry.id.clone(),
        });
        Ok(entry)
    }

    /// Remove a journal entry, its payments, and, for a creating entry,
    /// its invoice. See [`Ledger::remove_journal_entry`].
    pub fn remove_journal_entry(&mut self, entry_id: &str) -> BookResult<()> {
        self.ensure_open()?;
        self.ledger
            .remove_journal_entry(&mut self.invoices, entry_id)?;
        self.commit(ChangeEvent::JournalEntryRemoved {
            id: entry_id.to_string(),
        });
        Ok(())
    }

    pub fn get_journal_entry(&self, entry_id: &str) -> Option<&JournalEntry> {
        self.ledger.get_journal_entry(entry_id)
    }

    pub fn find_journal_entries(&self) -> Vec<&JournalEntry> {
        self.ledger.find_journal_entries()
    }

    pub fn find_journal_that_creates_invoice(&self, invoice_id: &str) -> Option<&JournalEntry> {
        self.ledger.find_journal_that_creates_invoice(invoice_id)
    }

    /// Signed balance of an account as of a date, positive on the account
    /// type's normal side.
    pub fn get_account_balance(
        &self,
        account_id: &str,
        as_of_date: NaiveDate,
    ) -> BookResult<BigDecimal> {
        let account = self.accounts.get_account_required(account_id)?;
        Ok(self.ledger.get_account_balance(account, as_of_date))
    }

    // Invoices

    fn validate_invoice_party_references(&self, invoice: &Invoice) -> BookResult<()> {
        self.parties
            .get_party_required(&invoice.concerning_party_id)?;
        self.parties.get_party_required(&invoice.paying_party_id)?;
        Ok(())
    }

    pub fn create_invoice(&mut self, invoice: Invoice) -> BookResult<()> {
        self.ensure_open()?;
        self.validate_invoice_party_references(&invoice)?;
        let id = invoice.id.clone();
        self.invoices.create_invoice(invoice)?;
        self.commit(ChangeEvent::InvoiceCreated { id });
        Ok(())
    }

    pub fn update_invoice(&mut self, invoice: Invoice) -> BookResult<()> {
        self.ensure_open()?;
        self.validate_invoice_party_references(&invoice)?;
        let id = invoice.id.clone();
        self.invoices.update_invoice(invoice)?;
        self.commit(ChangeEvent::InvoiceUpdated { id });
        Ok(())
    }

    /// Delete an invoice. Fails while any journal entry references it,
    /// either through a detail or as its creating entry; remove the entry
    /// instead to cascade.
    pub fn delete_invoice(&mut self, invoice_id: &str) -> BookResult<()> {
        self.ensure_open()?;
        self.invoices.get_invoice_required(invoice_id)?;
        if self.ledger.is_invoice_referenced(invoice_id, None) {
            return Err(BookkeepingError::InUse {
                entity: "invoice",
                id: invoice_id.to_string(),
                referrer: "journal entry",
            });
        }
        self.invoices.delete_invoice(invoice_id)?;
        self.ledger.remove_payments_for_invoice(invoice_id);
        self.commit(ChangeEvent::InvoiceDeleted {
            id: invoice_id.to_string(),
        });
        Ok(())
    }

    pub fn get_invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices.get_invoice(invoice_id)
    }

    pub fn find_all_invoices(&self) -> Vec<&Invoice> {
        self.invoices.find_all_invoices()
    }

    pub fn find_payments(&self, invoice_id: &str) -> &[Payment] {
        self.ledger.find_payments(invoice_id)
    }

    pub fn get_remaining_amount_to_be_paid(
        &self,
        invoice_id: &str,
        as_of_date: NaiveDate,
    ) -> BookResult<BigDecimal> {
        self.invoices
            .get_remaining_amount_to_be_paid(&self.ledger, invoice_id, as_of_date)
    }

    pub fn is_paid(&self, invoice_id: &str, as_of_date: NaiveDate) -> BookResult<bool> {
        self.invoices.is_paid(&self.ledger, invoice_id, as_of_date)
    }

    /// Insert a payment row directly, for the persistence adapter's load
    /// path. Normal payment creation happens through journal entries.
    pub fn restore_payment(&mut self, payment: Payment) -> BookResult<()> {
        self.ensure_open()?;
        let invoice_id = payment.invoice_id.clone();
        self.ledger.restore_payment(&self.invoices, payment)?;
        self.commit(ChangeEvent::PaymentRestored { invoice_id });
        Ok(())
    }

    /// Generate one invoice plus creating journal entry per party from a
    /// template. Best-effort per party: failures are collected in the
    /// outcome while committed parties are kept.
    pub fn create_invoices_for_parties(
        &mut self,
        template: &InvoiceTemplate,
        batch: &[InvoiceParty],
        progress: Option<&dyn ProgressListener>,
    ) -> BookResult<BatchOutcome> {
        self.ensure_open()?;
        let outcome = crate::invoice::template::generate_for_parties(
            &mut self.invoices,
            &mut self.ledger,
            &self.accounts,
            &self.parties,
            template,
            batch,
            progress,
        )?;
        if !outcome.created_invoice_ids.is_empty() {
            self.commit(ChangeEvent::InvoicesGenerated {
                count: outcome.created_invoice_ids.len(),
            });
        }
        Ok(outcome)
    }

    // Settings

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key)
    }

    pub fn set_setting(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> BookResult<()> {
        self.ensure_open()?;
        let key = key.into();
        self.settings.set(key.clone(), value);
        self.commit(ChangeEvent::SettingChanged { key });
        Ok(())
    }

    pub fn party_setting(&self, party_id: &str, key: &str) -> Option<&str> {
        self.settings.get_for_party(party_id, key)
    }

    pub fn set_party_setting(
        &mut self,
        party_id: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> BookResult<()> {
        self.ensure_open()?;
        self.parties.get_party_required(party_id)?;
        let key = key.into();
        self.settings.set_for_party(party_id, key.clone(), value);
        self.commit(ChangeEvent::SettingChanged { key });
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // Reporting and period closing

    /// Build an immutable report snapshot as of a date.
    pub fn build_report(&self, as_of_date: NaiveDate) -> BookResult<Report> {
        ReportBuilder::new(
            &self.accounts,
            &self.parties,
            &self.ledger,
            &self.invoices,
            self.start_of_period,
        )
        .build(as_of_date)
    }

    /// Close the period: freeze this bookkeeping and return a new one
    /// carrying forward balances, open invoices, and settings.
    /// See [`closing::close_bookkeeping`].
    pub fn close_bookkeeping(
        &mut self,
        as_of_date: NaiveDate,
        equity_account_id: &str,
        progress: Option<&dyn ProgressListener>,
    ) -> BookResult<Bookkeeping> {
        closing::close_bookkeeping(self, as_of_date, equity_account_id, progress)
    }

    // Crate-internal access for the period closer.

    pub(crate) fn parts(&self) -> (&AccountRegistry, &PartyRegistry, &Ledger, &InvoiceBook) {
        (&self.accounts, &self.parties, &self.ledger, &self.invoices)
    }

    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub(crate) fn mark_closed(&mut self, closed_from: NaiveDate) {
        debug!(%closed_from, "bookkeeping closed");
        self.state = BookState::Closed;
        self.dirty = true;
        self.listeners.notify(&ChangeEvent::PeriodClosed { closed_from });
    }
}
