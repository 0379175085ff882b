//! The ledger: journal entries, derived balances, and payment reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::invoice::{InvoiceBook, Payment};
use crate::ledger::account::AccountRegistry;
use crate::ledger::entry::{JournalEntry, JournalEntryDetail};
use crate::types::*;

/// Planned payment mutation, computed during validation and applied only
/// after every check has passed.
enum PaymentAction {
    Create {
        detail_index: usize,
        invoice_id: String,
        payment: Payment,
    },
    Update {
        old_invoice_id: String,
        payment: Payment,
    },
    Remove {
        invoice_id: String,
        payment_id: String,
    },
}

/// The journal of one bookkeeping.
///
/// The ledger exclusively owns journal entries, their details, and the
/// payment rows derived from invoice-linked details. Accounts and invoices
/// are referenced by id and passed in per call, so cross-entity operations
/// validate everything up front and commit as one unit.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<String, JournalEntry>,
    /// Payments grouped per invoice id.
    payments: HashMap<String, Vec<Payment>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a journal entry.
    ///
    /// When `create_payments` is set, every detail that references an
    /// invoice without being the invoice's creating detail yields a new
    /// payment: amount signed by the detail's side, date taken from the
    /// entry, description taken from the account name. The detail is
    /// stamped with the payment id. Entry and payments commit together or
    /// not at all.
    pub fn add_journal_entry(
        &mut self,
        accounts: &AccountRegistry,
        invoices: &InvoiceBook,
        mut entry: JournalEntry,
        create_payments: bool,
    ) -> BookResult<JournalEntry> {
        entry.validate()?;

        if self.entries.contains_key(&entry.id) {
            return Err(BookkeepingError::DuplicateId {
                entity: "journal entry",
                id: entry.id,
            });
        }

        if let Some(invoice_id) = &entry.id_of_created_invoice {
            invoices.get_invoice_required(invoice_id)?;
        }

        let mut actions = Vec::new();
        for (index, detail) in entry.details.iter().enumerate() {
            accounts.get_account_required(&detail.account_id)?;

            let Some(invoice_id) = &detail.invoice_id else {
                if detail.payment_id.is_some() {
                    return Err(BookkeepingError::Validation {
                        field: "journal entry detail",
                        message: "a payment reference requires an invoice reference".to_string(),
                    });
                }
                continue;
            };

            invoices.get_invoice_required(invoice_id)?;

            if entry.is_creating_detail(detail) {
                continue;
            }

            match &detail.payment_id {
                // Pre-linked payment, as supplied by the persistence
                // adapter on load. It must already exist on the invoice.
                Some(payment_id) => {
                    if !self.payment_exists(invoice_id, payment_id) {
                        return Err(BookkeepingError::NotFound {
                            entity: "payment",
                            id: payment_id.clone(),
                        });
                    }
                }
                None if create_payments => {
                    actions.push(PaymentAction::Create {
                        detail_index: index,
                        invoice_id: invoice_id.clone(),
                        payment: self.derive_payment(accounts, &entry, detail, invoice_id)?,
                    });
                }
                // Without payment creation the link stays unreconciled;
                // the removal guard refuses to drop such entries later.
                None => {}
            }
        }

        self.apply_payment_actions(actions, &mut entry.details);
        debug!(entry = %entry.id, date = %entry.date, "journal entry added");
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Replace a journal entry, reconciling payments with the diff of
    /// invoice-linked details.
    ///
    /// Details that kept their payment id get the payment updated (amount,
    /// date, description, invoice). Newly invoice-linked details get a new
    /// payment. Payments whose detail disappeared are removed. Validation
    /// happens entirely before the first payment is touched.
    pub fn update_journal_entry(
        &mut self,
        accounts: &AccountRegistry,
        invoices: &InvoiceBook,
        mut entry: JournalEntry,
    ) -> BookResult<JournalEntry> {
        entry.validate()?;

        let old = self
            .entries
            .get(&entry.id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "journal entry",
                id: entry.id.clone(),
            })?;

        if entry.id_of_created_invoice != old.id_of_created_invoice {
            return Err(BookkeepingError::Validation {
                field: "journal entry",
                message: format!(
                    "entry '{}' cannot change which invoice it created",
                    entry.id
                ),
            });
        }

        // Payments owned by the old revision, keyed by payment id.
        let mut unmatched: HashMap<String, String> = old
            .details
            .iter()
            .filter(|d| !old.is_creating_detail(d))
            .filter_map(|d| Some((d.payment_id.clone()?, d.invoice_id.clone()?)))
            .collect();

        let mut actions = Vec::new();
        for (index, detail) in entry.details.iter().enumerate() {
            accounts.get_account_required(&detail.account_id)?;

            let Some(invoice_id) = &detail.invoice_id else {
                if detail.payment_id.is_some() {
                    return Err(BookkeepingError::Validation {
                        field: "journal entry detail",
                        message: "a payment reference requires an invoice reference".to_string(),
                    });
                }
                continue;
            };

            invoices.get_invoice_required(invoice_id)?;

            if entry.is_creating_detail(detail) {
                continue;
            }

            match &detail.payment_id {
                Some(payment_id) => match unmatched.remove(payment_id) {
                    Some(old_invoice_id) => {
                        let mut payment =
                            self.derive_payment(accounts, &entry, detail, invoice_id)?;
                        payment.id = payment_id.clone();
                        actions.push(PaymentAction::Update {
                            old_invoice_id,
                            payment,
                        });
                    }
                    None => {
                        return Err(BookkeepingError::NotFound {
                            entity: "payment",
                            id: payment_id.clone(),
                        });
                    }
                },
                None => {
                    actions.push(PaymentAction::Create {
                        detail_index: index,
                        invoice_id: invoice_id.clone(),
                        payment: self.derive_payment(accounts, &entry, detail, invoice_id)?,
                    });
                }
            }
        }

        for (payment_id, invoice_id) in unmatched {
            actions.push(PaymentAction::Remove {
                invoice_id,
                payment_id,
            });
        }

        self.apply_payment_actions(actions, &mut entry.details);
        debug!(entry = %entry.id, "journal entry updated");
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Remove a journal entry together with the payments its details
    /// created. If the entry is the creating entry of an invoice, the
    /// invoice is removed as well.
    pub fn remove_journal_entry(
        &mut self,
        invoices: &mut InvoiceBook,
        entry_id: &str,
    ) -> BookResult<()> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "journal entry",
                id: entry_id.to_string(),
            })?;

        // Legacy-data guard: an invoice link without a payment means the
        // payment administration for this entry was never migrated, and
        // removal would silently lose the link.
        for detail in &entry.details {
            if detail.invoice_id.is_some()
                && detail.payment_id.is_none()
                && !entry.is_creating_detail(detail)
            {
                return Err(BookkeepingError::UnmigratedInvoiceDetail {
                    id: entry_id.to_string(),
                });
            }
        }

        if let Some(invoice_id) = &entry.id_of_created_invoice {
            if self.is_invoice_referenced(invoice_id, Some(entry_id)) {
                return Err(BookkeepingError::InUse {
                    entity: "invoice",
                    id: invoice_id.clone(),
                    referrer: "journal entry",
                });
            }
        }

        let entry = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "journal entry",
                id: entry_id.to_string(),
            })?;
        for detail in &entry.details {
            if let (Some(invoice_id), Some(payment_id)) = (&detail.invoice_id, &detail.payment_id)
            {
                self.remove_payment(invoice_id, payment_id);
            }
        }

        if let Some(invoice_id) = &entry.id_of_created_invoice {
            self.payments.remove(invoice_id);
            if invoices.contains(invoice_id) {
                invoices.delete_invoice(invoice_id)?;
            }
        }

        debug!(entry = %entry.id, "journal entry removed");
        Ok(())
    }

    pub fn get_journal_entry(&self, entry_id: &str) -> Option<&JournalEntry> {
        self.entries.get(entry_id)
    }

    /// All journal entries, sorted by date, then id.
    pub fn find_journal_entries(&self) -> Vec<&JournalEntry> {
        let mut entries: Vec<&JournalEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// The entry that originated the given invoice, if any.
    pub fn find_journal_that_creates_invoice(&self, invoice_id: &str) -> Option<&JournalEntry> {
        self.entries
            .values()
            .find(|e| e.id_of_created_invoice.as_deref() == Some(invoice_id))
    }

    /// Signed balance of an account over all entries dated on or before
    /// `as_of_date`, positive on the account type's normal side.
    pub fn get_account_balance(
        &self,
        account: &crate::ledger::account::Account,
        as_of_date: NaiveDate,
    ) -> BigDecimal {
        self.balance_where(account, |date| date <= as_of_date)
    }

    /// Balance of an account over all entries dated strictly before `date`;
    /// the opening balance of a reporting period.
    pub fn get_opening_balance(
        &self,
        account: &crate::ledger::account::Account,
        date: NaiveDate,
    ) -> BigDecimal {
        self.balance_where(account, |entry_date| entry_date < date)
    }

    fn balance_where(
        &self,
        account: &crate::ledger::account::Account,
        include: impl Fn(NaiveDate) -> bool,
    ) -> BigDecimal {
        let normal = account.account_type.normal_side();
        let mut balance = BigDecimal::from(0);

        for entry in self.entries.values() {
            if !include(entry.date) {
                continue;
            }
            for detail in &entry.details {
                if detail.account_id != account.id {
                    continue;
                }
                if detail.side == normal {
                    balance += &detail.amount;
                } else {
                    balance -= &detail.amount;
                }
            }
        }

        balance
    }

    pub fn is_account_used(&self, account_id: &str) -> bool {
        self.entries
            .values()
            .any(|e| e.details.iter().any(|d| d.account_id == account_id))
    }

    pub fn is_party_used(&self, party_id: &str) -> bool {
        self.entries
            .values()
            .any(|e| e.details.iter().any(|d| d.party_id.as_deref() == Some(party_id)))
    }

    /// Whether any entry, except the optionally excluded one, references
    /// the invoice through a detail or as its creating entry.
    pub fn is_invoice_referenced(&self, invoice_id: &str, exclude_entry: Option<&str>) -> bool {
        self.entries
            .values()
            .filter(|e| Some(e.id.as_str()) != exclude_entry)
            .any(|e| {
                e.id_of_created_invoice.as_deref() == Some(invoice_id)
                    || e.details
                        .iter()
                        .any(|d| d.invoice_id.as_deref() == Some(invoice_id))
            })
    }

    /// Payments recorded for an invoice, in creation order.
    pub fn find_payments(&self, invoice_id: &str) -> &[Payment] {
        self.payments
            .get(invoice_id)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn payment_exists(&self, invoice_id: &str, payment_id: &str) -> bool {
        self.find_payments(invoice_id)
            .iter()
            .any(|p| p.id == payment_id)
    }

    /// Insert a payment row directly, used by the persistence adapter when
    /// loading a bookkeeping and by period closing when carrying open
    /// invoices forward. The referenced invoice must exist and the payment
    /// id must be unique within it.
    pub fn restore_payment(&mut self, invoices: &InvoiceBook, payment: Payment) -> BookResult<()> {
        invoices.get_invoice_required(&payment.invoice_id)?;

        if self.payment_exists(&payment.invoice_id, &payment.id) {
            return Err(BookkeepingError::DuplicateId {
                entity: "payment",
                id: payment.id,
            });
        }

        self.payments
            .entry(payment.invoice_id.clone())
            .or_default()
            .push(payment);
        Ok(())
    }

    /// Drop every payment row of an invoice. Called when the invoice
    /// itself is deleted, so no payment outlives its invoice.
    pub(crate) fn remove_payments_for_invoice(&mut self, invoice_id: &str) {
        self.payments.remove(invoice_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn derive_payment(
        &self,
        accounts: &AccountRegistry,
        entry: &JournalEntry,
        detail: &JournalEntryDetail,
        invoice_id: &str,
    ) -> BookResult<Payment> {
        let account = accounts.get_account_required(&detail.account_id)?;
        Ok(Payment {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            date: entry.date,
            amount: detail.payment_amount(),
            description: account.name.clone(),
        })
    }

    fn remove_payment(&mut self, invoice_id: &str, payment_id: &str) {
        if let Some(payments) = self.payments.get_mut(invoice_id) {
            payments.retain(|p| p.id != payment_id);
            if payments.is_empty() {
                self.payments.remove(invoice_id);
            }
        }
    }

    /// Apply a validated batch of payment mutations and stamp the payment
    /// ids onto the details that caused them. Infallible: all validation
    /// happened while planning.
    fn apply_payment_actions(
        &mut self,
        actions: Vec<PaymentAction>,
        details: &mut [JournalEntryDetail],
    ) {
        for action in actions {
            match action {
                PaymentAction::Create {
                    detail_index,
                    invoice_id,
                    payment,
                } => {
                    details[detail_index].payment_id = Some(payment.id.clone());
                    self.payments.entry(invoice_id).or_default().push(payment);
                }
                PaymentAction::Update {
                    old_invoice_id,
                    payment,
                } => {
                    self.remove_payment(&old_invoice_id, &payment.id);
                    self.payments
                        .entry(payment.invoice_id.clone())
                        .or_default()
                        .push(payment);
                }
                PaymentAction::Remove {
                    invoice_id,
                    payment_id,
                } => {
                    self.remove_payment(&invoice_id, &payment_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::Invoice;
    use crate::ledger::account::Account;
    use crate::ledger::entry::JournalEntryBuilder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn registry() -> AccountRegistry {
        let mut accounts = AccountRegistry::new();
        accounts
            .create_account(Account::new("100", "Cash", AccountType::Asset))
            .unwrap();
        accounts
            .create_account(Account::new("190", "Debtors", AccountType::Debtor))
            .unwrap();
        accounts
            .create_account(Account::new("200", "Loan", AccountType::Liability))
            .unwrap();
        accounts
            .create_account(Account::new("300", "Sales", AccountType::Revenue))
            .unwrap();
        accounts
    }

    fn sale_invoice(id: &str, amount: i64) -> Invoice {
        Invoice {
            id: id.to_string(),
            concerning_party_id: "p1".to_string(),
            paying_party_id: "p1".to_string(),
            issue_date: date(2011, 3, 15),
            amount_to_be_paid: BigDecimal::from(amount),
            details: Vec::new(),
        }
    }

    #[test]
    fn balances_follow_normal_side() {
        let accounts = registry();
        let invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();

        let entry = JournalEntryBuilder::new("t1", date(2011, 1, 1), "Loan received")
            .debit("100", BigDecimal::from(100))
            .credit("200", BigDecimal::from(100))
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, entry, false)
            .unwrap();

        let cash = accounts.get_account("100").unwrap();
        let loan = accounts.get_account("200").unwrap();
        assert_eq!(
            ledger.get_account_balance(cash, date(2011, 1, 2)),
            BigDecimal::from(100)
        );
        assert_eq!(
            ledger.get_account_balance(loan, date(2011, 1, 2)),
            BigDecimal::from(100)
        );
        // Before the entry date both balances are zero.
        assert_eq!(
            ledger.get_account_balance(cash, date(2010, 12, 31)),
            BigDecimal::from(0)
        );
    }

    #[test]
    fn unknown_account_rejects_whole_entry() {
        let accounts = registry();
        let invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();

        let entry = JournalEntryBuilder::new("t1", date(2011, 1, 1), "Bad account")
            .debit("999", BigDecimal::from(10))
            .credit("100", BigDecimal::from(10))
            .build()
            .unwrap();
        let err = ledger
            .add_journal_entry(&accounts, &invoices, entry, false)
            .unwrap_err();

        assert!(matches!(err, BookkeepingError::NotFound { entity: "account", .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn payment_is_created_for_invoice_linked_detail() {
        let accounts = registry();
        let mut invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();
        invoices.create_invoice(sale_invoice("inv-1", 123)).unwrap();

        let entry = JournalEntryBuilder::new("t1", date(2011, 3, 25), "Payment received")
            .debit("100", BigDecimal::from(123))
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                    .for_invoice("inv-1"),
            )
            .build()
            .unwrap();

        let stored = ledger
            .add_journal_entry(&accounts, &invoices, entry, true)
            .unwrap();

        let payments = ledger.find_payments("inv-1");
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, BigDecimal::from(123));
        assert_eq!(payments[0].date, date(2011, 3, 25));
        assert_eq!(payments[0].description, "Debtors");
        assert_eq!(stored.details[1].payment_id, Some(payments[0].id.clone()));
    }

    #[test]
    fn update_diffs_payments() {
        let accounts = registry();
        let mut invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();
        invoices.create_invoice(sale_invoice("inv-1", 123)).unwrap();

        let entry = JournalEntryBuilder::new("t1", date(2011, 3, 25), "Payment received")
            .debit("100", BigDecimal::from(123))
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                    .for_invoice("inv-1"),
            )
            .build()
            .unwrap();
        let stored = ledger
            .add_journal_entry(&accounts, &invoices, entry, true)
            .unwrap();
        let payment_id = stored.details[1].payment_id.clone().unwrap();

        // Change the amount: the payment follows.
        let mut updated = stored.clone();
        updated.date = date(2011, 3, 26);
        updated.details[0].amount = BigDecimal::from(100);
        updated.details[1].amount = BigDecimal::from(100);
        ledger
            .update_journal_entry(&accounts, &invoices, updated.clone())
            .unwrap();

        let payments = ledger.find_payments("inv-1");
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, payment_id);
        assert_eq!(payments[0].amount, BigDecimal::from(100));
        assert_eq!(payments[0].date, date(2011, 3, 26));

        // Drop the invoice link: the payment goes away.
        let mut unlinked = updated;
        unlinked.details[1].invoice_id = None;
        unlinked.details[1].payment_id = None;
        ledger
            .update_journal_entry(&accounts, &invoices, unlinked)
            .unwrap();
        assert!(ledger.find_payments("inv-1").is_empty());
    }

    #[test]
    fn remove_guards_unmigrated_invoice_links() {
        let accounts = registry();
        let mut invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();
        invoices.create_invoice(sale_invoice("inv-1", 123)).unwrap();

        let entry = JournalEntryBuilder::new("t1", date(2011, 3, 25), "Legacy payment")
            .debit("100", BigDecimal::from(123))
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                    .for_invoice("inv-1"),
            )
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, entry, false)
            .unwrap();

        let err = ledger
            .remove_journal_entry(&mut invoices, "t1")
            .unwrap_err();
        assert!(matches!(err, BookkeepingError::UnmigratedInvoiceDetail { .. }));
        assert!(ledger.get_journal_entry("t1").is_some());
    }

    #[test]
    fn removing_creating_entry_cascades_to_invoice() {
        let accounts = registry();
        let mut invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();
        invoices.create_invoice(sale_invoice("inv-1", 123)).unwrap();

        let entry = JournalEntryBuilder::new("inv-1", date(2011, 3, 15), "Invoice inv-1")
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Debit)
                    .for_invoice("inv-1"),
            )
            .credit("300", BigDecimal::from(123))
            .creates_invoice("inv-1")
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, entry, true)
            .unwrap();

        ledger.remove_journal_entry(&mut invoices, "inv-1").unwrap();
        assert!(invoices.get_invoice("inv-1").is_none());
        assert!(ledger.find_journal_that_creates_invoice("inv-1").is_none());
    }

    #[test]
    fn creating_entry_with_open_payments_elsewhere_cannot_be_removed() {
        let accounts = registry();
        let mut invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();
        invoices.create_invoice(sale_invoice("inv-1", 123)).unwrap();

        let creating = JournalEntryBuilder::new("inv-1", date(2011, 3, 15), "Invoice inv-1")
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Debit)
                    .for_invoice("inv-1"),
            )
            .credit("300", BigDecimal::from(123))
            .creates_invoice("inv-1")
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, creating, true)
            .unwrap();

        let payment = JournalEntryBuilder::new("t2", date(2011, 3, 25), "Payment received")
            .debit("100", BigDecimal::from(123))
            .detail(
                JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                    .for_invoice("inv-1"),
            )
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, payment, true)
            .unwrap();

        let err = ledger
            .remove_journal_entry(&mut invoices, "inv-1")
            .unwrap_err();
        assert!(matches!(err, BookkeepingError::InUse { .. }));
        assert!(invoices.get_invoice("inv-1").is_some());
    }

    #[test]
    fn balance_query_is_idempotent() {
        let accounts = registry();
        let invoices = InvoiceBook::new();
        let mut ledger = Ledger::new();

        let entry = JournalEntryBuilder::new("t1", date(2011, 1, 1), "Loan received")
            .debit("100", BigDecimal::from(100))
            .credit("200", BigDecimal::from(100))
            .build()
            .unwrap();
        ledger
            .add_journal_entry(&accounts, &invoices, entry, false)
            .unwrap();

        let cash = accounts.get_account("100").unwrap();
        let first = ledger.get_account_balance(cash, date(2011, 6, 1));
        let second = ledger.get_account_balance(cash, date(2011, 6, 1));
        assert_eq!(first, second);
    }
}
