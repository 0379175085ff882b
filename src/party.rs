//! Parties (debtors, creditors, suppliers) and their tags

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::types::*;
use crate::utils::validation::{validate_id, validate_name};

/// The role a party plays toward the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyKind {
    Debtor,
    Creditor,
    Supplier,
}

/// A counterparty of the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub kind: PartyKind,
    pub address: String,
    pub zip_code: String,
    pub city: String,
    pub birth_date: Option<NaiveDate>,
}

impl Party {
    /// A party with a caller-chosen id. Pass an empty id to have the
    /// registry generate one on creation.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PartyKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            address: String::new(),
            zip_code: String::new(),
            city: String::new(),
            birth_date: None,
        }
    }
}

/// Search criteria for parties. Every supplied field must match
/// (AND semantics); string fields match case-insensitively on substrings,
/// the birth date matches on day-of-year, the kind matches exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartySearchCriteria {
    pub name: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub kind: Option<PartyKind>,
    pub tag: Option<String>,
}

impl PartySearchCriteria {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Registry of parties with tag association.
#[derive(Debug, Clone, Default)]
pub struct PartyRegistry {
    parties: HashMap<String, Party>,
    tags: HashMap<String, BTreeSet<String>>,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a party. An empty id is replaced with a generated one; a
    /// caller-specified id must be unused. Returns the stored party.
    pub fn create_party(&mut self, mut party: Party) -> BookResult<Party> {
        if party.id.trim().is_empty() {
            party.id = Uuid::new_v4().to_string();
        } else {
            validate_id("party", &party.id)?;
        }
        validate_name("party", &party.name)?;

        if self.parties.contains_key(&party.id) {
            return Err(BookkeepingError::DuplicateId {
                entity: "party",
                id: party.id,
            });
        }

        self.parties.insert(party.id.clone(), party.clone());
        Ok(party)
    }

    /// Replace an existing party. The id is immutable.
    pub fn update_party(&mut self, party: Party) -> BookResult<()> {
        validate_name("party", &party.name)?;

        if !self.parties.contains_key(&party.id) {
            return Err(BookkeepingError::NotFound {
                entity: "party",
                id: party.id,
            });
        }

        self.parties.insert(party.id.clone(), party);
        Ok(())
    }

    /// Remove a party and its tags. Reference guards live one level up,
    /// where the ledger and invoice book are in scope.
    pub(crate) fn delete_party(&mut self, party_id: &str) -> BookResult<()> {
        if self.parties.remove(party_id).is_none() {
            return Err(BookkeepingError::NotFound {
                entity: "party",
                id: party_id.to_string(),
            });
        }
        self.tags.remove(party_id);
        Ok(())
    }

    pub fn get_party(&self, party_id: &str) -> Option<&Party> {
        self.parties.get(party_id)
    }

    pub fn get_party_required(&self, party_id: &str) -> BookResult<&Party> {
        self.parties
            .get(party_id)
            .ok_or_else(|| BookkeepingError::NotFound {
                entity: "party",
                id: party_id.to_string(),
            })
    }

    pub fn contains(&self, party_id: &str) -> bool {
        self.parties.contains_key(party_id)
    }

    /// All parties, sorted by name, then id.
    pub fn find_all_parties(&self) -> Vec<&Party> {
        let mut parties: Vec<&Party> = self.parties.values().collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        parties
    }

    /// Parties matching all supplied criteria fields.
    pub fn find_parties(&self, criteria: &PartySearchCriteria) -> Vec<&Party> {
        let mut matches: Vec<&Party> = self
            .parties
            .values()
            .filter(|party| self.matches(party, criteria))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        matches
    }

    fn matches(&self, party: &Party, criteria: &PartySearchCriteria) -> bool {
        if let Some(name) = &criteria.name {
            if !contains_ignore_case(&party.name, name) {
                return false;
            }
        }
        if let Some(address) = &criteria.address {
            if !contains_ignore_case(&party.address, address) {
                return false;
            }
        }
        if let Some(zip_code) = &criteria.zip_code {
            if !contains_ignore_case(&party.zip_code, zip_code) {
                return false;
            }
        }
        if let Some(city) = &criteria.city {
            if !contains_ignore_case(&party.city, city) {
                return false;
            }
        }
        if let Some(birth_date) = criteria.birth_date {
            // Day-of-year match: the year of birth is irrelevant.
            match party.birth_date {
                Some(date)
                    if date.month() == birth_date.month() && date.day() == birth_date.day() => {}
                _ => return false,
            }
        }
        if let Some(kind) = criteria.kind {
            if party.kind != kind {
                return false;
            }
        }
        if let Some(tag) = &criteria.tag {
            if !self.party_has_tag(&party.id, tag) {
                return false;
            }
        }
        true
    }

    // Tag association, a simple many-to-many keyed by party id.

    pub fn set_party_tags(&mut self, party_id: &str, tags: Vec<String>) -> BookResult<()> {
        self.get_party_required(party_id)?;
        if tags.is_empty() {
            self.tags.remove(party_id);
        } else {
            self.tags.insert(party_id.to_string(), tags.into_iter().collect());
        }
        Ok(())
    }

    pub fn add_party_tag(&mut self, party_id: &str, tag: impl Into<String>) -> BookResult<()> {
        self.get_party_required(party_id)?;
        self.tags
            .entry(party_id.to_string())
            .or_default()
            .insert(tag.into());
        Ok(())
    }

    pub fn remove_party_tag(&mut self, party_id: &str, tag: &str) -> BookResult<()> {
        self.get_party_required(party_id)?;
        if let Some(tags) = self.tags.get_mut(party_id) {
            tags.remove(tag);
            if tags.is_empty() {
                self.tags.remove(party_id);
            }
        }
        Ok(())
    }

    pub fn party_tags(&self, party_id: &str) -> Vec<&str> {
        self.tags
            .get(party_id)
            .map(|tags| tags.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn party_has_tag(&self, party_id: &str, tag: &str) -> bool {
        self.tags
            .get(party_id)
            .is_some_and(|tags| tags.contains(tag))
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}
