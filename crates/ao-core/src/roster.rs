//! Roster store: the single owned list of accounts every component reads
//! and mutates.
//!
//! Accounts are kept sorted by name and each account's characters by
//! character name. Sorting is re-applied after every mutation so indices
//! handed out by this module always refer to the sorted order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::RosterError;
use crate::types::{Account, Character, LaunchTarget, NameKey};

/// Signal returned by every mutating operation so the presentation layer
/// can decide when to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterChange {
    Unchanged,
    Roster,
    Selection,
}

impl RosterChange {
    pub fn is_changed(self) -> bool {
        !matches!(self, RosterChange::Unchanged)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    accounts: Vec<Account>,
}

impl Roster {
    /// Builds a roster from raw accounts, sorting and collapsing any
    /// multi-selection within an account to its first selected character.
    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        let mut roster = Self { accounts };
        roster.sort();
        for account in &mut roster.accounts {
            let mut seen = false;
            for character in &mut account.characters {
                if character.selected {
                    if seen {
                        character.selected = false;
                    }
                    seen = true;
                }
            }
        }
        roster
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn into_accounts(self) -> Vec<Account> {
        self.accounts
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn account(&self, index: usize) -> Result<&Account, RosterError> {
        self.accounts
            .get(index)
            .ok_or(RosterError::AccountOutOfRange {
                index,
                len: self.accounts.len(),
            })
    }

    pub(crate) fn account_mut(&mut self, index: usize) -> Result<&mut Account, RosterError> {
        let len = self.accounts.len();
        self.accounts
            .get_mut(index)
            .ok_or(RosterError::AccountOutOfRange { index, len })
    }

    pub(crate) fn accounts_mut(&mut self) -> &mut [Account] {
        &mut self.accounts
    }

    pub fn character(
        &self,
        account_index: usize,
        character_index: usize,
    ) -> Result<&Character, RosterError> {
        let account = self.account(account_index)?;
        account
            .characters
            .get(character_index)
            .ok_or_else(|| RosterError::CharacterOutOfRange {
                account: account.name.clone(),
                index: character_index,
                len: account.characters.len(),
            })
    }

    pub fn find_account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.name == name)
    }

    /// Maps every character name (case-insensitive) to its owning account.
    /// When two accounts share a character name the later account in sorted
    /// order wins, matching a plain overwrite of the lookup.
    pub fn owner_index(&self) -> BTreeMap<NameKey, &Account> {
        let mut index = BTreeMap::new();
        for account in &self.accounts {
            if account.name.is_empty() {
                continue;
            }
            for character in &account.characters {
                if character.name.trim().is_empty() {
                    continue;
                }
                index.insert(character.key(), account);
            }
        }
        index
    }

    /// Account names that currently have a selected character.
    pub fn selected_accounts(&self) -> BTreeSet<String> {
        self.accounts
            .iter()
            .filter(|account| account.has_selection())
            .map(|account| account.name.clone())
            .collect()
    }

    /// One launch target per account with a selection, in roster order.
    pub fn selection(&self) -> Vec<LaunchTarget> {
        self.accounts
            .iter()
            .filter_map(|account| {
                account
                    .selected_character()
                    .map(|character| LaunchTarget::from_selection(account, character))
            })
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.accounts
            .iter()
            .flat_map(|account| account.characters.iter())
            .filter(|character| character.selected)
            .count()
    }

    pub fn add_account(
        &mut self,
        name: &str,
        password: &str,
    ) -> Result<(usize, RosterChange), RosterError> {
        let name = require_name(name, "account name")?;
        self.accounts.push(Account::new(name.clone(), password));
        self.sort();
        let index = self
            .accounts
            .iter()
            .rposition(|account| account.name == name && account.characters.is_empty())
            .unwrap_or(self.accounts.len() - 1);
        Ok((index, RosterChange::Roster))
    }

    pub fn remove_account(
        &mut self,
        index: usize,
    ) -> Result<(Account, RosterChange), RosterError> {
        self.account(index)?;
        Ok((self.accounts.remove(index), RosterChange::Roster))
    }

    pub fn rename_account(&mut self, index: usize, name: &str) -> Result<RosterChange, RosterError> {
        let name = require_name(name, "account name")?;
        let account = self.account_mut(index)?;
        if account.name == name {
            return Ok(RosterChange::Unchanged);
        }
        account.name = name;
        self.sort();
        Ok(RosterChange::Roster)
    }

    pub fn set_password(&mut self, index: usize, password: &str) -> Result<RosterChange, RosterError> {
        let account = self.account_mut(index)?;
        if account.password == password {
            return Ok(RosterChange::Unchanged);
        }
        account.password = password.to_string();
        Ok(RosterChange::Roster)
    }

    pub fn add_character(
        &mut self,
        account_index: usize,
        id: u32,
        name: &str,
        comment: Option<&str>,
    ) -> Result<RosterChange, RosterError> {
        let name = require_name(name, "character name")?;
        if id == 0 {
            return Err(RosterError::InvalidCharacterId);
        }
        let account = self.account_mut(account_index)?;
        if account.characters.iter().any(|character| character.id == id) {
            return Err(RosterError::DuplicateCharacterId {
                account: account.name.clone(),
                id,
            });
        }
        account.characters.push(Character {
            id,
            name,
            selected: false,
            comment: normalize_comment(comment),
        });
        self.sort();
        Ok(RosterChange::Roster)
    }

    pub fn remove_character(
        &mut self,
        account_index: usize,
        character_index: usize,
    ) -> Result<(Character, RosterChange), RosterError> {
        self.character(account_index, character_index)?;
        let account = self.account_mut(account_index)?;
        Ok((account.characters.remove(character_index), RosterChange::Roster))
    }

    pub fn rename_character(
        &mut self,
        account_index: usize,
        character_index: usize,
        name: &str,
    ) -> Result<RosterChange, RosterError> {
        let name = require_name(name, "character name")?;
        self.character(account_index, character_index)?;
        let character = &mut self.account_mut(account_index)?.characters[character_index];
        if character.name == name {
            return Ok(RosterChange::Unchanged);
        }
        character.name = name;
        self.sort();
        Ok(RosterChange::Roster)
    }

    pub fn set_comment(
        &mut self,
        account_index: usize,
        character_index: usize,
        comment: Option<&str>,
    ) -> Result<RosterChange, RosterError> {
        self.character(account_index, character_index)?;
        let character = &mut self.account_mut(account_index)?.characters[character_index];
        let comment = normalize_comment(comment);
        if character.comment == comment {
            return Ok(RosterChange::Unchanged);
        }
        character.comment = comment;
        Ok(RosterChange::Roster)
    }

    pub fn sort(&mut self) {
        self.accounts.sort_by(|a, b| compare_names(&a.name, &b.name));
        for account in &mut self.accounts {
            account.characters.sort_by(|a, b| {
                compare_names(&a.name, &b.name).then_with(|| a.id.cmp(&b.id))
            });
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn require_name(value: &str, field: &'static str) -> Result<String, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::EmptyName { field });
    }
    Ok(trimmed.to_string())
}

fn normalize_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Roster {
        Roster::from_accounts(vec![
            Account::new("zeta", "pw-z")
                .with_character(Character::new(2, "Yuri"))
                .with_character(Character::new(1, "adam")),
            Account::new("Alpha", "pw-a").with_character(Character::new(5, "Bob")),
        ])
    }

    #[test]
    fn from_accounts_sorts_accounts_and_characters_case_insensitively() {
        let roster = sample();
        let names = roster
            .accounts()
            .iter()
            .map(|account| account.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Alpha", "zeta"]);
        let chars = roster.accounts()[1]
            .characters
            .iter()
            .map(|character| character.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(chars, vec!["adam", "Yuri"]);
    }

    #[test]
    fn from_accounts_collapses_multi_selection_per_account() {
        let mut first = Character::new(1, "Ann");
        first.selected = true;
        let mut second = Character::new(2, "Ben");
        second.selected = true;
        let roster = Roster::from_accounts(vec![Account::new("acct", "")
            .with_character(second)
            .with_character(first)]);

        let selected = roster.accounts()[0].selected_character().expect("selection");
        assert_eq!(selected.name, "Ann");
        assert_eq!(roster.selected_count(), 1);
    }

    #[test]
    fn add_account_returns_sorted_index() {
        let mut roster = sample();
        let (index, change) = roster.add_account("  mid ", "pw").expect("add account");
        assert_eq!(index, 1);
        assert_eq!(change, RosterChange::Roster);
        assert_eq!(roster.accounts()[1].name, "mid");
    }

    #[test]
    fn add_account_rejects_blank_name() {
        let mut roster = sample();
        let err = roster.add_account("   ", "pw").expect_err("blank name");
        assert_eq!(
            err,
            RosterError::EmptyName {
                field: "account name"
            }
        );
    }

    #[test]
    fn add_character_validates_id() {
        let mut roster = sample();
        assert_eq!(
            roster.add_character(0, 0, "Zed", None),
            Err(RosterError::InvalidCharacterId)
        );
        assert_eq!(
            roster.add_character(0, 5, "Zed", None),
            Err(RosterError::DuplicateCharacterId {
                account: "Alpha".to_string(),
                id: 5
            })
        );
        roster
            .add_character(0, 6, "Abe", Some("  alt "))
            .expect("add character");
        let first = &roster.accounts()[0].characters[0];
        assert_eq!(first.name, "Abe");
        assert_eq!(first.comment.as_deref(), Some("alt"));
    }

    #[test]
    fn rename_reports_unchanged_for_same_name() {
        let mut roster = sample();
        assert_eq!(
            roster.rename_character(0, 0, "Bob"),
            Ok(RosterChange::Unchanged)
        );
        assert_eq!(
            roster.rename_account(1, "Aardvark"),
            Ok(RosterChange::Roster)
        );
        assert_eq!(roster.accounts()[0].name, "Aardvark");
    }

    #[test]
    fn removals_report_a_roster_change() {
        let mut roster = sample();
        let (character, change) = roster.remove_character(1, 0).expect("remove adam");
        assert_eq!(character.name, "adam");
        assert_eq!(change, RosterChange::Roster);

        let (account, change) = roster.remove_account(0).expect("remove Alpha");
        assert_eq!(account.name, "Alpha");
        assert_eq!(change, RosterChange::Roster);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let mut roster = sample();
        assert_eq!(
            roster.remove_account(9).map(|(account, _)| account.name),
            Err(RosterError::AccountOutOfRange { index: 9, len: 2 })
        );
        assert!(matches!(
            roster.remove_character(0, 4),
            Err(RosterError::CharacterOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn owner_index_is_case_insensitive() {
        let roster = sample();
        let index = roster.owner_index();
        assert_eq!(
            index.get(&NameKey::new("YURI")).map(|account| account.name.as_str()),
            Some("zeta")
        );
        assert!(index.get(&NameKey::new("nobody")).is_none());
    }

    #[test]
    fn selection_lists_one_target_per_selected_account() {
        let mut roster = sample();
        roster.accounts_mut()[1].characters[1].selected = true;
        let selection = roster.selection();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].account_name, "zeta");
        assert_eq!(selection[0].character_name, "Yuri");
        assert_eq!(selection[0].password, "pw-z");
        assert_eq!(
            roster.selected_accounts().into_iter().collect::<Vec<_>>(),
            vec!["zeta".to_string()]
        );
    }
}
