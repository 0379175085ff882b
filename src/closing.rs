//! Period closing: freeze a bookkeeping and roll its state forward into a
//! freshly created one

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::info;

use crate::bookkeeping::Bookkeeping;
use crate::ledger::{JournalEntry, JournalEntryDetail};
use crate::traits::ProgressListener;
use crate::types::*;

/// Id and description of the opening entry posted into the new bookkeeping.
const OPENING_ENTRY_ID: &str = "opening-balance";
const OPENING_ENTRY_DESCRIPTION: &str = "Opening balance";

/// Close the period of `source` at `as_of_date`.
///
/// The new bookkeeping starts its period at `as_of_date` and receives: all
/// accounts, parties with tags and settings, global settings, one opening
/// entry dated the day before `as_of_date` summarizing every non-zero
/// asset/liability balance with the operational result posted against
/// `equity_account_id`, every invoice still open at that day (with detail
/// lines and payments), and every journal entry dated on or after
/// `as_of_date`. The source is marked closed only after the new
/// bookkeeping has been built, so a failure leaves it untouched.
pub fn close_bookkeeping(
    source: &mut Bookkeeping,
    as_of_date: NaiveDate,
    equity_account_id: &str,
    progress: Option<&dyn ProgressListener>,
) -> BookResult<Bookkeeping> {
    if source.is_closed() {
        return Err(BookkeepingError::BookkeepingClosed);
    }
    if source.has_unsaved_changes() {
        return Err(BookkeepingError::UnsavedChanges);
    }

    let cutoff = as_of_date
        .pred_opt()
        .ok_or_else(|| BookkeepingError::Validation {
            field: "period closing",
            message: format!("no day exists before {as_of_date}"),
        })?;

    let (accounts, parties, ledger, invoices) = source.parts();
    accounts.get_account_required(equity_account_id)?;

    let report = source.build_report(cutoff)?;

    let mut target = Bookkeeping::new(as_of_date);
    *target.settings_mut() = source.settings().clone();

    for account in accounts.find_all_accounts() {
        target.create_account(account.clone())?;
    }
    for party in parties.find_all_parties() {
        target.create_party(party.clone())?;
        let tags: Vec<String> = parties
            .party_tags(&party.id)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !tags.is_empty() {
            target.set_party_tags(&party.id, tags)?;
        }
    }

    post_opening_entry(&mut target, &report, equity_account_id, cutoff)?;

    // Invoices carried forward: everything still open at the cutoff, plus
    // anything a carried-forward entry refers to.
    let carried_entries: Vec<JournalEntry> = ledger
        .find_journal_entries()
        .into_iter()
        .filter(|e| e.date >= as_of_date)
        .cloned()
        .collect();

    let mut carried_invoice_ids: BTreeSet<String> = BTreeSet::new();
    for invoice in invoices.find_all_invoices() {
        let remaining =
            invoices.get_remaining_amount_to_be_paid(ledger, &invoice.id, cutoff)?;
        if remaining != BigDecimal::from(0) {
            carried_invoice_ids.insert(invoice.id.clone());
        }
    }
    for entry in &carried_entries {
        if let Some(invoice_id) = &entry.id_of_created_invoice {
            carried_invoice_ids.insert(invoice_id.clone());
        }
        for detail in &entry.details {
            if let Some(invoice_id) = &detail.invoice_id {
                carried_invoice_ids.insert(invoice_id.clone());
            }
        }
    }

    let total_steps = carried_invoice_ids.len() + carried_entries.len();
    let mut done = 0;
    let report_progress = |done: usize| {
        if let Some(progress) = progress {
            progress.on_progress(done, total_steps);
        }
    };

    for invoice_id in &carried_invoice_ids {
        let invoice = invoices.get_invoice_required(invoice_id)?;
        target.create_invoice(invoice.clone())?;
        for payment in ledger.find_payments(invoice_id) {
            target.restore_payment(payment.clone())?;
        }
        done += 1;
        report_progress(done);
    }

    for entry in carried_entries {
        target.add_journal_entry(entry, false)?;
        done += 1;
        report_progress(done);
    }

    source.mark_closed(as_of_date);
    info!(
        start_of_period = %as_of_date,
        invoices = carried_invoice_ids.len(),
        "period closed into new bookkeeping"
    );
    Ok(target)
}

/// Post the opening entry: one detail per non-zero asset/liability-side
/// balance, plus the operational result against the equity account.
fn post_opening_entry(
    target: &mut Bookkeeping,
    report: &crate::report::Report,
    equity_account_id: &str,
    cutoff: NaiveDate,
) -> BookResult<()> {
    let zero = BigDecimal::from(0);
    let mut entry = JournalEntry::new(OPENING_ENTRY_ID, cutoff, OPENING_ENTRY_DESCRIPTION);

    for overview in &report.account_overviews {
        let Some(side) = overview.account.account_type.balance_sheet_side() else {
            continue;
        };
        if overview.closing_balance == zero {
            continue;
        }
        // A negative balance sits on the opposite side of the sheet.
        let (side, amount) = if overview.closing_balance > zero {
            (side, overview.closing_balance.clone())
        } else {
            (side.opposite(), overview.closing_balance.abs())
        };
        entry.details.push(JournalEntryDetail::new(
            overview.account.id.clone(),
            amount,
            side,
        ));
    }

    if report.result_of_operations != zero {
        let (side, amount) = if report.result_of_operations > zero {
            (Side::Credit, report.result_of_operations.clone())
        } else {
            (Side::Debit, report.result_of_operations.abs())
        };
        entry
            .details
            .push(JournalEntryDetail::new(equity_account_id, amount, side));
    }

    if entry.details.is_empty() {
        return Ok(());
    }

    target.add_journal_entry(entry, false)?;
    Ok(())
}
