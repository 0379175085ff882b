//! Account management functionality

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::*;
use crate::utils::validation::{validate_id, validate_name};

/// An account in the chart of accounts. The id is unique and immutable;
/// the type determines the side on which the balance is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            account_type,
        }
    }
}

/// Registry of accounts, keyed by id. Deletion guards against journal
/// references live one level up, where the ledger is in scope.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: HashMap<String, Account>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new account. Fails when the id is already taken.
    pub fn create_account(&mut self, account: Account) -> BookResult<()> {
        validate_id("account", &account.id)?;
        validate_name("account", &account.name)?;

        if self.accounts.contains_key(&account.id) {
            return Err(BookkeepingError::DuplicateId {
                entity: "account",
                id: account.id,
            });
        }

        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    /// Update an existing account. The id is immutable; name and type can
    /// change freely since balances are derived, never stored.
    pub fn update_account(&mut self, account: Account) -> BookResult<()> {
        validate_name("account", &account.name)?;

        if !self.accounts.contains_key(&account.id) {
            return Err(BookkeepingError::NotFound {
                entity: "account",
                id: account.id,
            });
        }

        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    /// Remove an account. The caller is responsible for checking usage
    /// first; this only fails when the id is unknown.
    pub(crate) fn delete_account(&mut self, account_id: &str) -> BookResult<()> {
        if self.accounts.remove(account_id).is_none() {
            return Err(BookkeepingError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    /// Like [`get_account`](Self::get_account) but absent ids are an error.
    pub fn get_account_required(&self, account_id: &str) -> BookResult<&Account> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }

    /// All accounts, sorted by id.
    pub fn find_all_accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
