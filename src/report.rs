//! Point-in-time report building: balance sheet, operational result, and
//! debtor/creditor overviews

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::invoice::InvoiceBook;
use crate::ledger::{Account, AccountRegistry, Ledger};
use crate::party::PartyRegistry;
use crate::types::*;

/// Id used for the synthetic balance-sheet line that carries the result of
/// operations onto the minority side.
pub const RESULT_OF_OPERATIONS_ID: &str = "result-of-operations";

/// One balance-sheet line: an account and its balance as of the report
/// date, positive on the account's normal side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub account_id: String,
    pub account_name: String,
    pub amount: BigDecimal,
}

/// One in-period mutation on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub date: NaiveDate,
    pub entry_id: String,
    pub description: String,
    pub side: Side,
    pub amount: BigDecimal,
}

/// Per-account view: balance carried into the period, the mutations up to
/// the report date, and the resulting balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub account: Account,
    pub opening_balance: BigDecimal,
    pub mutations: Vec<LedgerLine>,
    pub closing_balance: BigDecimal,
}

/// Net remaining invoice amount of one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyBalance {
    pub party_id: String,
    pub party_name: String,
    pub amount: BigDecimal,
}

/// An immutable snapshot of the bookkeeping as of a date. Building a
/// report never mutates persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub as_of_date: NaiveDate,
    pub start_of_period: NaiveDate,
    /// Non-zero asset-side balances, plus the synthetic result line when
    /// the period ran at a loss.
    pub assets: Vec<BalanceLine>,
    /// Non-zero liability-side balances, plus the synthetic result line
    /// when the period ran at a profit.
    pub liabilities: Vec<BalanceLine>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_expenses: BigDecimal,
    pub total_revenues: BigDecimal,
    pub result_of_operations: BigDecimal,
    pub account_overviews: Vec<AccountOverview>,
    pub debtors: Vec<PartyBalance>,
    pub creditors: Vec<PartyBalance>,
}

/// Builds [`Report`] snapshots from the four registries.
pub struct ReportBuilder<'a> {
    accounts: &'a AccountRegistry,
    parties: &'a PartyRegistry,
    ledger: &'a Ledger,
    invoices: &'a InvoiceBook,
    start_of_period: NaiveDate,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        accounts: &'a AccountRegistry,
        parties: &'a PartyRegistry,
        ledger: &'a Ledger,
        invoices: &'a InvoiceBook,
        start_of_period: NaiveDate,
    ) -> Self {
        Self {
            accounts,
            parties,
            ledger,
            invoices,
            start_of_period,
        }
    }

    pub fn build(&self, as_of_date: NaiveDate) -> BookResult<Report> {
        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut total_assets = BigDecimal::from(0);
        let mut total_liabilities = BigDecimal::from(0);
        let mut total_expenses = BigDecimal::from(0);
        let mut total_revenues = BigDecimal::from(0);
        let mut account_overviews = Vec::new();

        for account in self.accounts.find_all_accounts() {
            let balance = self.ledger.get_account_balance(account, as_of_date);

            match account.account_type.balance_sheet_side() {
                Some(Side::Debit) => {
                    total_assets += &balance;
                    if balance != BigDecimal::from(0) {
                        assets.push(BalanceLine {
                            account_id: account.id.clone(),
                            account_name: account.name.clone(),
                            amount: balance.clone(),
                        });
                    }
                }
                Some(Side::Credit) => {
                    total_liabilities += &balance;
                    if balance != BigDecimal::from(0) {
                        liabilities.push(BalanceLine {
                            account_id: account.id.clone(),
                            account_name: account.name.clone(),
                            amount: balance.clone(),
                        });
                    }
                }
                None => match account.account_type {
                    AccountType::Expense => total_expenses += &balance,
                    AccountType::Revenue => total_revenues += &balance,
                    _ => {}
                },
            }

            account_overviews.push(self.build_overview(account, balance, as_of_date));
        }

        // Carry the operational result onto the minority side so that the
        // two sides close, like a trial balance: a profit deepens the
        // liabilities, a loss deepens the assets.
        let result_of_operations = &total_revenues - &total_expenses;
        if result_of_operations != BigDecimal::from(0) {
            let line = BalanceLine {
                account_id: RESULT_OF_OPERATIONS_ID.to_string(),
                account_name: "Result of operations".to_string(),
                amount: result_of_operations.abs(),
            };
            if result_of_operations > BigDecimal::from(0) {
                total_liabilities += &line.amount;
                liabilities.push(line);
            } else {
                total_assets += &line.amount;
                assets.push(line);
            }
        }

        let (debtors, creditors) = self.build_party_balances(as_of_date)?;

        Ok(Report {
            as_of_date,
            start_of_period: self.start_of_period,
            assets,
            liabilities,
            total_assets,
            total_liabilities,
            total_expenses,
            total_revenues,
            result_of_operations,
            account_overviews,
            debtors,
            creditors,
        })
    }

    fn build_overview(
        &self,
        account: &Account,
        closing_balance: BigDecimal,
        as_of_date: NaiveDate,
    ) -> AccountOverview {
        let opening_balance = self.ledger.get_opening_balance(account, self.start_of_period);

        let mut mutations = Vec::new();
        for entry in self.ledger.find_journal_entries() {
            if entry.date < self.start_of_period || entry.date > as_of_date {
                continue;
            }
            for detail in &entry.details {
                if detail.account_id == account.id {
                    mutations.push(LedgerLine {
                        date: entry.date,
                        entry_id: entry.id.clone(),
                        description: entry.description.clone(),
                        side: detail.side,
                        amount: detail.amount.clone(),
                    });
                }
            }
        }

        AccountOverview {
            account: account.clone(),
            opening_balance,
            mutations,
            closing_balance,
        }
    }

    /// Net remaining invoice amounts per party. Invoices with a positive
    /// amount to be paid count toward the debtor overview of their paying
    /// party; negative ones count toward the creditor overview.
    fn build_party_balances(
        &self,
        as_of_date: NaiveDate,
    ) -> BookResult<(Vec<PartyBalance>, Vec<PartyBalance>)> {
        let zero = BigDecimal::from(0);
        let mut debtor_totals: HashMap<String, BigDecimal> = HashMap::new();
        let mut creditor_totals: HashMap<String, BigDecimal> = HashMap::new();

        for invoice in self.invoices.find_all_invoices() {
            let remaining =
                self.invoices
                    .get_remaining_amount_to_be_paid(self.ledger, &invoice.id, as_of_date)?;
            if remaining == zero {
                continue;
            }
            let totals = if invoice.is_debtor_invoice() {
                &mut debtor_totals
            } else {
                &mut creditor_totals
            };
            *totals
                .entry(invoice.paying_party_id.clone())
                .or_insert_with(|| zero.clone()) += &remaining;
        }

        let to_lines = |totals: HashMap<String, BigDecimal>, negate: bool| {
            let mut lines: Vec<PartyBalance> = totals
                .into_iter()
                .filter(|(_, amount)| {
                    if negate {
                        *amount < BigDecimal::from(0)
                    } else {
                        *amount > BigDecimal::from(0)
                    }
                })
                .map(|(party_id, amount)| PartyBalance {
                    party_name: self
                        .parties
                        .get_party(&party_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| party_id.clone()),
                    party_id,
                    amount: if negate { amount.abs() } else { amount },
                })
                .collect();
            lines.sort_by(|a, b| a.party_id.cmp(&b.party_id));
            lines
        };

        Ok((to_lines(debtor_totals, false), to_lines(creditor_totals, true)))
    }
}
