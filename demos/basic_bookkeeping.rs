//! Basic bookkeeping usage example

use bigdecimal::BigDecimal;
use bookkeeping_core::{
    Account, AccountType, Bookkeeping, InvoiceParty, InvoiceTemplate, InvoiceTemplateKind,
    JournalEntryBuilder, JournalEntryDetail, LineAmount, Party, PartyKind, Side, TemplateLine,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Bookkeeping Core - Basic Example\n");

    // 1. A fresh bookkeeping with a small chart of accounts
    println!("📊 Setting up Chart of Accounts...");
    let mut book = Bookkeeping::new(date(2024, 1, 1));

    book.create_account(Account::new("100", "Bank", AccountType::Asset))?;
    book.create_account(Account::new("190", "Debtors", AccountType::Debtor))?;
    book.create_account(Account::new("200", "Capital", AccountType::Liability))?;
    book.create_account(Account::new("300", "Membership fees", AccountType::Revenue))?;
    book.create_account(Account::new("600", "Rent", AccountType::Expense))?;

    for account in book.find_all_accounts() {
        println!(
            "  ✓ Created account: {} - {} ({:?})",
            account.id, account.name, account.account_type
        );
    }
    println!();

    // 2. Record some journal entries
    println!("💰 Recording Journal Entries...\n");

    let investment = JournalEntryBuilder::new("txn001", date(2024, 1, 1), "Initial capital")
        .debit("100", BigDecimal::from(50000))
        .credit("200", BigDecimal::from(50000))
        .build()?;
    book.add_journal_entry(investment, false)?;
    println!("  ✓ Recorded: Initial capital of 50,000");

    let rent = JournalEntryBuilder::new("txn002", date(2024, 1, 15), "Monthly rent")
        .debit("600", BigDecimal::from(8000))
        .credit("100", BigDecimal::from(8000))
        .build()?;
    book.add_journal_entry(rent, false)?;
    println!("  ✓ Recorded: Rent payment of 8,000");

    // 3. Generate membership invoices from a template
    println!("\n🧾 Generating Membership Invoices...");

    book.create_party(Party::new("m1", "Pietersen", PartyKind::Debtor))?;
    book.create_party(Party::new("m2", "Jansen", PartyKind::Debtor))?;

    let template = InvoiceTemplate {
        kind: InvoiceTemplateKind::Sale,
        id_pattern: "2024-{id}".to_string(),
        date: date(2024, 2, 1),
        description_pattern: "Membership 2024 {name}".to_string(),
        lines: vec![
            TemplateLine::debit("190", LineAmount::PartyAmount).amount_to_be_paid(),
            TemplateLine::credit("300", LineAmount::PartyAmount),
        ],
    };

    let batch = vec![
        InvoiceParty {
            party_id: "m1".to_string(),
            amount: BigDecimal::from(120),
        },
        InvoiceParty {
            party_id: "m2".to_string(),
            amount: BigDecimal::from(120),
        },
    ];
    let outcome = book.create_invoices_for_parties(&template, &batch, None)?;

    for invoice_id in &outcome.created_invoice_ids {
        let invoice = book.get_invoice(invoice_id).unwrap();
        println!(
            "  ✓ Invoice {}: {} owes {}",
            invoice.id, invoice.paying_party_id, invoice.amount_to_be_paid
        );
    }

    // 4. Register a payment against the first invoice
    println!("\n💳 Registering a Payment...");
    let invoice_id = outcome.created_invoice_ids[0].clone();

    let payment = JournalEntryBuilder::new("txn003", date(2024, 2, 20), "Payment Pietersen")
        .debit("100", BigDecimal::from(120))
        .detail(
            JournalEntryDetail::new("190", BigDecimal::from(120), Side::Credit)
                .for_invoice(invoice_id.clone()),
        )
        .build()?;
    book.add_journal_entry(payment, true)?;

    println!(
        "  Invoice {} paid: {}",
        invoice_id,
        book.is_paid(&invoice_id, date(2024, 2, 21))?
    );

    // 5. Build a report
    println!("\n📈 Report as of February 29, 2024:\n");
    let report = book.build_report(date(2024, 2, 29))?;

    println!("  Assets:");
    for line in &report.assets {
        println!("    {}: {}", line.account_name, line.amount);
    }
    println!("  Total Assets: {}", report.total_assets);
    println!();

    println!("  Liabilities:");
    for line in &report.liabilities {
        println!("    {}: {}", line.account_name, line.amount);
    }
    println!("  Total Liabilities: {}", report.total_liabilities);
    println!();

    println!("  Result of operations: {}", report.result_of_operations);
    println!();

    println!("  Open debtors:");
    for debtor in &report.debtors {
        println!("    {}: {}", debtor.party_name, debtor.amount);
    }

    // 6. Close the period into a new bookkeeping
    println!("\n📦 Closing the Period...");
    book.mark_saved();
    let new_book = book.close_bookkeeping(date(2025, 1, 1), "200", None)?;

    println!(
        "  New period starts {}, bank balance carried: {}",
        new_book.start_of_period(),
        new_book.get_account_balance("100", date(2025, 1, 1))?
    );

    println!("\n🎉 Example completed successfully!");
    Ok(())
}
