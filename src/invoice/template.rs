//! Template-driven batch invoice generation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::invoice::{Invoice, InvoiceBook, InvoiceDetail};
use crate::ledger::{
    AccountRegistry, JournalEntry, JournalEntryDetail, Ledger,
};
use crate::party::{Party, PartyRegistry};
use crate::traits::ProgressListener;
use crate::types::*;

/// Whether a template produces sales invoices (money owed to the
/// organization) or purchase invoices (money the organization owes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceTemplateKind {
    Sale,
    Purchase,
}

/// Amount formula of a template line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineAmount {
    /// The same fixed amount for every party.
    Fixed(BigDecimal),
    /// The amount supplied per party in the batch call.
    PartyAmount,
}

impl LineAmount {
    fn resolve(&self, party_amount: &BigDecimal) -> BigDecimal {
        match self {
            LineAmount::Fixed(amount) => amount.clone(),
            LineAmount::PartyAmount => party_amount.clone(),
        }
    }
}

/// One line of an invoice template. Exactly one of `debit`/`credit` must
/// be set; at most one line per template carries the amount-to-be-paid
/// flag, and that line's account is the debtor/creditor account of the
/// generated invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLine {
    pub account_id: String,
    /// Text for the presentation line on the invoice; falls back to the
    /// account name.
    pub description: Option<String>,
    pub debit: Option<LineAmount>,
    pub credit: Option<LineAmount>,
    pub amount_to_be_paid: bool,
}

impl TemplateLine {
    pub fn debit(account_id: impl Into<String>, amount: LineAmount) -> Self {
        Self {
            account_id: account_id.into(),
            description: None,
            debit: Some(amount),
            credit: None,
            amount_to_be_paid: false,
        }
    }

    pub fn credit(account_id: impl Into<String>, amount: LineAmount) -> Self {
        Self {
            account_id: account_id.into(),
            description: None,
            debit: None,
            credit: Some(amount),
            amount_to_be_paid: false,
        }
    }

    pub fn amount_to_be_paid(mut self) -> Self {
        self.amount_to_be_paid = true;
        self
    }

    fn side_and_amount(&self) -> Option<(Side, &LineAmount)> {
        match (&self.debit, &self.credit) {
            (Some(amount), None) => Some((Side::Debit, amount)),
            (None, Some(amount)) => Some((Side::Credit, amount)),
            _ => None,
        }
    }
}

/// A template describing the invoice and creating journal entry generated
/// for each party of a batch. The `{id}` and `{name}` placeholders in the
/// id and description patterns are replaced per party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTemplate {
    pub kind: InvoiceTemplateKind,
    pub id_pattern: String,
    pub date: NaiveDate,
    pub description_pattern: String,
    pub lines: Vec<TemplateLine>,
}

/// One party of a batch call, with the per-party amount referenced by
/// [`LineAmount::PartyAmount`] lines.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceParty {
    pub party_id: String,
    pub amount: BigDecimal,
}

/// A party for which invoice generation failed. The batch keeps going;
/// failures are collected and reported.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub party_id: String,
    pub error: BookkeepingError,
}

/// Outcome of a batch generation run: committed invoices plus the parties
/// that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub created_invoice_ids: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl InvoiceTemplate {
    /// Validate the template against the chart of accounts. Runs before
    /// any party is processed; a failure here aborts the whole batch.
    pub fn validate(&self, accounts: &AccountRegistry) -> BookResult<()> {
        if self.lines.is_empty() {
            return Err(BookkeepingError::Validation {
                field: "invoice template",
                message: "template must have at least one line".to_string(),
            });
        }

        let flagged: Vec<&TemplateLine> = self
            .lines
            .iter()
            .filter(|line| line.amount_to_be_paid)
            .collect();
        if flagged.len() != 1 {
            return Err(BookkeepingError::Validation {
                field: "invoice template",
                message: format!(
                    "exactly one line must be marked as amount to be paid, found {}",
                    flagged.len()
                ),
            });
        }

        for line in &self.lines {
            if line.side_and_amount().is_none() {
                return Err(BookkeepingError::Validation {
                    field: "invoice template",
                    message: format!(
                        "line for account '{}' must have exactly one of debit or credit",
                        line.account_id
                    ),
                });
            }
            accounts.get_account_required(&line.account_id)?;
        }

        let party_account = accounts.get_account_required(&flagged[0].account_id)?;
        let expected = match self.kind {
            InvoiceTemplateKind::Sale => AccountType::Debtor,
            InvoiceTemplateKind::Purchase => AccountType::Creditor,
        };
        if party_account.account_type != expected {
            return Err(BookkeepingError::Validation {
                field: "invoice template",
                message: format!(
                    "account '{}' on the amount-to-be-paid line must have type {expected:?}",
                    party_account.id
                ),
            });
        }

        Ok(())
    }

    fn resolve_pattern(pattern: &str, party: &Party) -> String {
        pattern
            .replace("{id}", &party.id)
            .replace("{name}", &party.name)
    }
}

/// Pick a free invoice id: the resolved pattern as-is, or with a single
/// letter suffix when taken. Invoice ids double as the id of the creating
/// journal entry, so both namespaces are checked.
fn free_invoice_id(base: &str, invoices: &InvoiceBook, ledger: &Ledger) -> Option<String> {
    let taken = |id: &str| invoices.contains(id) || ledger.get_journal_entry(id).is_some();

    if !taken(base) {
        return Some(base.to_string());
    }
    for suffix in 'a'..='z' {
        let candidate = format!("{base}{suffix}");
        if !taken(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Generate one invoice and its creating journal entry per party.
///
/// The invoice and entry of a single party commit atomically; a failure
/// for one party is recorded in the outcome without disturbing already
/// committed parties or aborting the rest of the batch.
#[allow(clippy::too_many_arguments)]
pub(crate) fn generate_for_parties(
    invoices: &mut InvoiceBook,
    ledger: &mut Ledger,
    accounts: &AccountRegistry,
    parties: &PartyRegistry,
    template: &InvoiceTemplate,
    batch: &[InvoiceParty],
    progress: Option<&dyn ProgressListener>,
) -> BookResult<BatchOutcome> {
    template.validate(accounts)?;

    let mut outcome = BatchOutcome::default();
    for (index, invoice_party) in batch.iter().enumerate() {
        match generate_for_party(invoices, ledger, accounts, parties, template, invoice_party) {
            Ok(invoice_id) => outcome.created_invoice_ids.push(invoice_id),
            Err(error) => {
                debug!(party = %invoice_party.party_id, %error, "invoice generation failed");
                outcome.failures.push(BatchFailure {
                    party_id: invoice_party.party_id.clone(),
                    error,
                });
            }
        }
        if let Some(progress) = progress {
            progress.on_progress(index + 1, batch.len());
        }
    }

    info!(
        created = outcome.created_invoice_ids.len(),
        failed = outcome.failures.len(),
        "invoice batch generated"
    );
    Ok(outcome)
}

fn generate_for_party(
    invoices: &mut InvoiceBook,
    ledger: &mut Ledger,
    accounts: &AccountRegistry,
    parties: &PartyRegistry,
    template: &InvoiceTemplate,
    invoice_party: &InvoiceParty,
) -> BookResult<String> {
    let party = parties.get_party_required(&invoice_party.party_id)?;

    let base_id = InvoiceTemplate::resolve_pattern(&template.id_pattern, party);
    let invoice_id = free_invoice_id(&base_id, invoices, ledger).ok_or_else(|| {
        BookkeepingError::DuplicateId {
            entity: "invoice",
            id: base_id.clone(),
        }
    })?;
    let description = InvoiceTemplate::resolve_pattern(&template.description_pattern, party);

    let mut entry = JournalEntry::new(invoice_id.clone(), template.date, description.clone());
    entry.id_of_created_invoice = Some(invoice_id.clone());
    let mut invoice_details = Vec::new();
    let mut amount_to_be_paid = BigDecimal::from(0);

    for line in &template.lines {
        // Shape was checked by template validation.
        let Some((side, amount)) = line.side_and_amount() else {
            continue;
        };
        let amount = amount.resolve(&invoice_party.amount);

        let mut detail = JournalEntryDetail::new(line.account_id.clone(), amount.clone(), side)
            .for_party(party.id.clone());
        if line.amount_to_be_paid {
            detail = detail.for_invoice(invoice_id.clone());
            amount_to_be_paid = match side {
                Side::Debit => amount.clone(),
                Side::Credit => -&amount,
            };
        }
        entry.details.push(detail);

        let line_description = match &line.description {
            Some(text) => InvoiceTemplate::resolve_pattern(text, party),
            None => accounts.get_account_required(&line.account_id)?.name.clone(),
        };
        invoice_details.push(InvoiceDetail {
            description: line_description,
            amount: Some(amount),
        });
    }

    // Validate the entry before creating the invoice, so a lopsided set of
    // line amounts fails this party without leaving a stray invoice.
    entry.validate()?;

    let invoice = Invoice {
        id: invoice_id.clone(),
        concerning_party_id: party.id.clone(),
        paying_party_id: party.id.clone(),
        issue_date: template.date,
        amount_to_be_paid,
        details: invoice_details,
    };
    invoices.create_invoice(invoice)?;

    if let Err(error) = ledger.add_journal_entry(accounts, invoices, entry, false) {
        // Roll the invoice back so the party fails atomically.
        invoices.delete_invoice(&invoice_id)?;
        return Err(error);
    }

    Ok(invoice_id)
}
