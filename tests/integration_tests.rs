//! Integration tests for bookkeeping-core

use bigdecimal::BigDecimal;
use bookkeeping_core::{
    Account, AccountType, Bookkeeping, BookkeepingError, Invoice, InvoiceParty, InvoiceTemplate,
    InvoiceTemplateKind, JournalEntryBuilder, JournalEntryDetail, LineAmount, Party, PartyKind,
    PartySearchCriteria, Side, TemplateLine,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bookkeeping with the accounts the scenarios below need.
fn sample_book() -> Bookkeeping {
    let mut book = Bookkeeping::new(date(2011, 1, 1));
    book.create_account(Account::new("100", "Bank", AccountType::Asset))
        .unwrap();
    book.create_account(Account::new("190", "Debtors", AccountType::Debtor))
        .unwrap();
    book.create_account(Account::new("200", "Capital", AccountType::Liability))
        .unwrap();
    book.create_account(Account::new("300", "Contribution", AccountType::Revenue))
        .unwrap();
    book.create_account(Account::new("600", "Rent", AccountType::Expense))
        .unwrap();
    book
}

fn contribution_template(invoice_date: NaiveDate) -> InvoiceTemplate {
    InvoiceTemplate {
        kind: InvoiceTemplateKind::Sale,
        id_pattern: "2011-{id}".to_string(),
        date: invoice_date,
        description_pattern: "Contribution {name}".to_string(),
        lines: vec![
            TemplateLine::debit("190", LineAmount::PartyAmount).amount_to_be_paid(),
            TemplateLine::credit("300", LineAmount::PartyAmount),
        ],
    }
}

#[test]
fn balances_reflect_entries_up_to_the_given_date() {
    let mut book = sample_book();

    let entry = JournalEntryBuilder::new("t1", date(2011, 1, 1), "Capital deposit")
        .debit("100", BigDecimal::from(100))
        .credit("200", BigDecimal::from(100))
        .build()
        .unwrap();
    book.add_journal_entry(entry, false).unwrap();

    assert_eq!(
        book.get_account_balance("100", date(2011, 1, 2)).unwrap(),
        BigDecimal::from(100)
    );
    assert_eq!(
        book.get_account_balance("200", date(2011, 1, 2)).unwrap(),
        BigDecimal::from(100)
    );
    // Nothing happened before the entry date.
    assert_eq!(
        book.get_account_balance("100", date(2010, 12, 31)).unwrap(),
        BigDecimal::from(0)
    );
}

#[test]
fn unbalanced_entries_never_reach_the_journal() {
    let mut book = sample_book();

    let mut entry = JournalEntryBuilder::new("bad", date(2011, 1, 1), "Lopsided")
        .debit("100", BigDecimal::from(100))
        .credit("200", BigDecimal::from(100))
        .build()
        .unwrap();
    entry.details[1].amount = BigDecimal::from(60);

    let err = book.add_journal_entry(entry, false).unwrap_err();
    assert!(matches!(err, BookkeepingError::Imbalance { .. }));
    assert!(book.find_journal_entries().is_empty());
}

#[test]
fn generated_invoice_becomes_paid_through_a_linked_entry() {
    let mut book = sample_book();
    let party = book
        .create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();

    let outcome = book
        .create_invoices_for_parties(
            &contribution_template(date(2011, 3, 15)),
            &[InvoiceParty {
                party_id: party.id.clone(),
                amount: BigDecimal::from(123),
            }],
            None,
        )
        .unwrap();
    assert!(outcome.failures.is_empty());
    let invoice_id = &outcome.created_invoice_ids[0];

    assert!(!book.is_paid(invoice_id, date(2011, 3, 16)).unwrap());
    assert_eq!(
        book.get_remaining_amount_to_be_paid(invoice_id, date(2011, 3, 16))
            .unwrap(),
        BigDecimal::from(123)
    );

    let payment_entry = JournalEntryBuilder::new("t2", date(2011, 3, 25), "Payment Pietersen")
        .debit("100", BigDecimal::from(123))
        .detail(
            JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                .for_invoice(invoice_id.clone()),
        )
        .build()
        .unwrap();
    book.add_journal_entry(payment_entry, true).unwrap();

    // The payment only counts from its date onward.
    assert!(!book.is_paid(invoice_id, date(2011, 3, 24)).unwrap());
    assert!(book.is_paid(invoice_id, date(2011, 3, 26)).unwrap());

    let payments = book.find_payments(invoice_id);
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, BigDecimal::from(123));
    assert_eq!(payments[0].date, date(2011, 3, 25));
}

#[test]
fn removing_the_creating_entry_removes_the_invoice() {
    let mut book = sample_book();
    book.create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();

    let outcome = book
        .create_invoices_for_parties(
            &contribution_template(date(2011, 3, 15)),
            &[InvoiceParty {
                party_id: "p1".to_string(),
                amount: BigDecimal::from(123),
            }],
            None,
        )
        .unwrap();
    let invoice_id = outcome.created_invoice_ids[0].clone();

    let creating_entry = book
        .find_journal_that_creates_invoice(&invoice_id)
        .unwrap()
        .id
        .clone();
    book.remove_journal_entry(&creating_entry).unwrap();

    assert!(book.get_invoice(&invoice_id).is_none());
    assert!(book.find_journal_that_creates_invoice(&invoice_id).is_none());
}

#[test]
fn period_closing_carries_report_totals_into_the_opening_entry() {
    let mut book = sample_book();

    let capital = JournalEntryBuilder::new("t1", date(2011, 1, 5), "Capital deposit")
        .debit("100", BigDecimal::from(400))
        .credit("200", BigDecimal::from(400))
        .build()
        .unwrap();
    book.add_journal_entry(capital, false).unwrap();

    let rent = JournalEntryBuilder::new("t2", date(2011, 6, 1), "Rent")
        .debit("600", BigDecimal::from(100))
        .credit("100", BigDecimal::from(100))
        .build()
        .unwrap();
    book.add_journal_entry(rent, false).unwrap();
    book.mark_saved();

    let report = book.build_report(date(2011, 12, 31)).unwrap();
    assert_eq!(report.total_assets, BigDecimal::from(400));
    assert_eq!(report.total_liabilities, BigDecimal::from(400));

    let new_book = book
        .close_bookkeeping(date(2012, 1, 1), "200", None)
        .unwrap();

    assert_eq!(new_book.start_of_period(), date(2012, 1, 1));
    let opening = new_book.get_journal_entry("opening-balance").unwrap();
    assert_eq!(opening.date, date(2011, 12, 31));
    assert_eq!(opening.total_debits(), report.total_assets);
    assert_eq!(opening.total_credits(), report.total_liabilities);

    // The source is frozen.
    assert!(book.is_closed());
    let err = book
        .add_journal_entry(
            JournalEntryBuilder::new("t3", date(2012, 2, 1), "Too late")
                .debit("100", BigDecimal::from(1))
                .credit("200", BigDecimal::from(1))
                .build()
                .unwrap(),
            false,
        )
        .unwrap_err();
    assert_eq!(err, BookkeepingError::BookkeepingClosed);
}

#[test]
fn closing_carries_open_invoices_and_future_entries() {
    let mut book = sample_book();
    book.create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();
    book.set_party_tags("p1", vec!["member".to_string()])
        .unwrap();
    book.set_setting("organization.name", "Sports Club").unwrap();

    // Two invoices: one gets paid in 2011, one stays open.
    let outcome = book
        .create_invoices_for_parties(
            &contribution_template(date(2011, 3, 15)),
            &[
                InvoiceParty {
                    party_id: "p1".to_string(),
                    amount: BigDecimal::from(123),
                },
                InvoiceParty {
                    party_id: "p1".to_string(),
                    amount: BigDecimal::from(50),
                },
            ],
            None,
        )
        .unwrap();
    let paid_id = outcome.created_invoice_ids[0].clone();
    let open_id = outcome.created_invoice_ids[1].clone();

    let payment = JournalEntryBuilder::new("t2", date(2011, 3, 25), "Payment Pietersen")
        .debit("100", BigDecimal::from(123))
        .detail(
            JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                .for_invoice(paid_id.clone()),
        )
        .build()
        .unwrap();
    book.add_journal_entry(payment, true).unwrap();

    // An entry already recorded for the new period.
    let future = JournalEntryBuilder::new("t3", date(2012, 1, 10), "Rent January")
        .debit("600", BigDecimal::from(75))
        .credit("100", BigDecimal::from(75))
        .build()
        .unwrap();
    book.add_journal_entry(future, false).unwrap();
    book.mark_saved();

    let new_book = book
        .close_bookkeeping(date(2012, 1, 1), "200", None)
        .unwrap();

    // Only the open invoice came along, with its detail lines intact.
    assert!(new_book.get_invoice(&paid_id).is_none());
    let carried = new_book.get_invoice(&open_id).unwrap();
    assert_eq!(carried.amount_to_be_paid, BigDecimal::from(50));
    assert_eq!(carried.details.len(), 2);
    assert!(!new_book.is_paid(&open_id, date(2012, 1, 1)).unwrap());

    // The entry for the new period came along unchanged.
    let rent = new_book.get_journal_entry("t3").unwrap();
    assert_eq!(rent.date, date(2012, 1, 10));

    // Parties, tags, and settings came along.
    assert!(new_book.get_party("p1").is_some());
    assert_eq!(new_book.party_tags("p1"), vec!["member"]);
    assert_eq!(new_book.setting("organization.name"), Some("Sports Club"));
}

#[test]
fn linking_a_detail_through_update_creates_one_payment() {
    let mut book = sample_book();
    book.create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();

    let outcome = book
        .create_invoices_for_parties(
            &contribution_template(date(2011, 3, 15)),
            &[InvoiceParty {
                party_id: "p1".to_string(),
                amount: BigDecimal::from(123),
            }],
            None,
        )
        .unwrap();
    let invoice_id = outcome.created_invoice_ids[0].clone();

    // A payment entry recorded without the invoice link.
    let entry = JournalEntryBuilder::new("t2", date(2011, 3, 25), "Payment received")
        .debit("100", BigDecimal::from(123))
        .credit("190", BigDecimal::from(123))
        .build()
        .unwrap();
    book.add_journal_entry(entry, true).unwrap();
    assert!(book.find_payments(&invoice_id).is_empty());

    // Linking the detail through an update creates exactly one payment.
    let mut updated = book.get_journal_entry("t2").unwrap().clone();
    updated.details[1].invoice_id = Some(invoice_id.clone());
    let updated = book.update_journal_entry(updated).unwrap();

    let payments = book.find_payments(&invoice_id);
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, BigDecimal::from(123));
    assert_eq!(payments[0].date, date(2011, 3, 25));
    assert_eq!(payments[0].description, "Debtors");
    assert_eq!(updated.details[1].payment_id, Some(payments[0].id.clone()));
    assert!(book.is_paid(&invoice_id, date(2011, 3, 26)).unwrap());
}

#[test]
fn account_round_trip_and_delete() {
    let mut book = Bookkeeping::new(date(2011, 1, 1));
    let account = Account::new("100", "Bank", AccountType::Asset);
    book.create_account(account.clone()).unwrap();

    assert_eq!(book.get_account("100"), Some(&account));

    book.delete_account("100").unwrap();
    assert!(book.get_account("100").is_none());
    assert!(book.find_all_accounts().is_empty());
}

#[test]
fn batch_keeps_successes_when_a_party_fails() {
    let mut book = sample_book();
    book.create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();

    let outcome = book
        .create_invoices_for_parties(
            &contribution_template(date(2011, 3, 15)),
            &[
                InvoiceParty {
                    party_id: "p1".to_string(),
                    amount: BigDecimal::from(123),
                },
                InvoiceParty {
                    party_id: "nobody".to_string(),
                    amount: BigDecimal::from(50),
                },
            ],
            None,
        )
        .unwrap();

    assert_eq!(outcome.created_invoice_ids, vec!["2011-p1".to_string()]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].party_id, "nobody");
    assert!(book.get_invoice("2011-p1").is_some());
}

#[test]
fn debtor_overview_reflects_open_invoices() {
    let mut book = sample_book();
    book.create_party(Party::new("p1", "Pietersen", PartyKind::Debtor))
        .unwrap();

    book.create_invoices_for_parties(
        &contribution_template(date(2011, 3, 15)),
        &[InvoiceParty {
            party_id: "p1".to_string(),
            amount: BigDecimal::from(123),
        }],
        None,
    )
    .unwrap();

    let report = book.build_report(date(2011, 12, 31)).unwrap();
    assert_eq!(report.debtors.len(), 1);
    assert_eq!(report.debtors[0].party_id, "p1");
    assert_eq!(report.debtors[0].amount, BigDecimal::from(123));
    assert!(report.creditors.is_empty());

    // Pay it off: the party disappears from the overview.
    let payment = JournalEntryBuilder::new("t2", date(2011, 4, 1), "Payment Pietersen")
        .debit("100", BigDecimal::from(123))
        .detail(
            JournalEntryDetail::new("190", BigDecimal::from(123), Side::Credit)
                .for_invoice("2011-p1"),
        )
        .build()
        .unwrap();
    book.add_journal_entry(payment, true).unwrap();

    let report = book.build_report(date(2011, 12, 31)).unwrap();
    assert!(report.debtors.is_empty());
}

#[test]
fn party_search_combines_criteria() {
    let mut book = Bookkeeping::new(date(2011, 1, 1));
    let mut piet = Party::new("p1", "Pietersen", PartyKind::Debtor);
    piet.city = "Amsterdam".to_string();
    piet.birth_date = Some(date(1980, 3, 14));
    book.create_party(piet).unwrap();

    let mut jan = Party::new("p2", "Jansen", PartyKind::Debtor);
    jan.city = "Amsterdam".to_string();
    book.create_party(jan).unwrap();

    let by_name = book.find_parties(&PartySearchCriteria::with_name("pieter"));
    assert_eq!(by_name.len(), 1);

    let criteria = PartySearchCriteria {
        city: Some("AMSTERDAM".to_string()),
        birth_date: Some(date(2011, 3, 14)),
        ..Default::default()
    };
    let matched = book.find_parties(&criteria);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, "p1");
}

#[test]
fn closed_bookkeeping_rejects_all_mutations() {
    let mut book = sample_book();
    book.mark_saved();
    book.close_bookkeeping(date(2012, 1, 1), "200", None).unwrap();

    assert!(matches!(
        book.create_account(Account::new("999", "New", AccountType::Asset)),
        Err(BookkeepingError::BookkeepingClosed)
    ));
    assert!(matches!(
        book.create_party(Party::new("p9", "Late", PartyKind::Debtor)),
        Err(BookkeepingError::BookkeepingClosed)
    ));
    assert!(matches!(
        book.set_setting("key", "value"),
        Err(BookkeepingError::BookkeepingClosed)
    ));
    assert!(matches!(
        book.create_invoices_for_parties(&contribution_template(date(2012, 1, 5)), &[], None),
        Err(BookkeepingError::BookkeepingClosed)
    ));

    // Reads keep working on a closed bookkeeping.
    assert_eq!(book.find_all_accounts().len(), 5);
    assert!(book.build_report(date(2011, 12, 31)).is_ok());
}

#[test]
fn persisted_types_survive_serde_round_trips() {
    let entry = JournalEntryBuilder::new("t1", date(2011, 1, 1), "Capital deposit")
        .debit("100", BigDecimal::from(100))
        .credit("200", BigDecimal::from(100))
        .build()
        .unwrap();
    let json = serde_json::to_string(&entry).unwrap();
    let back: bookkeeping_core::JournalEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back, entry);

    let invoice = Invoice {
        id: "inv-1".to_string(),
        concerning_party_id: "p1".to_string(),
        paying_party_id: "p1".to_string(),
        issue_date: date(2011, 3, 15),
        amount_to_be_paid: BigDecimal::from(123),
        details: Vec::new(),
    };
    let json = serde_json::to_string(&invoice).unwrap();
    let back: Invoice = serde_json::from_str(&json).unwrap();
    assert_eq!(back, invoice);

    let party = Party::new("p1", "Pietersen", PartyKind::Debtor);
    let json = serde_json::to_string(&party).unwrap();
    let back: Party = serde_json::from_str(&json).unwrap();
    assert_eq!(back, party);
}
