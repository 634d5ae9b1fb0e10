//! Selection manager.
//!
//! A plain toggle keeps at most one selected character per account and
//! leaves other accounts alone. An exclusive toggle (modifier-click) clears
//! the whole roster and selects exactly the target.

use serde::{Deserialize, Serialize};

use crate::error::RosterError;
use crate::roster::{Roster, RosterChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleMode {
    #[default]
    PerAccount,
    Exclusive,
}

impl ToggleMode {
    pub fn from_exclusive(exclusive: bool) -> Self {
        if exclusive {
            ToggleMode::Exclusive
        } else {
            ToggleMode::PerAccount
        }
    }
}

pub fn toggle(
    roster: &mut Roster,
    account_index: usize,
    character_index: usize,
    mode: ToggleMode,
) -> Result<RosterChange, RosterError> {
    let current = roster.character(account_index, character_index)?.selected;
    let before = selection_snapshot(roster);

    match mode {
        ToggleMode::PerAccount => {
            let account = roster.account_mut(account_index)?;
            let intended = !current;
            if intended {
                for (index, character) in account.characters.iter_mut().enumerate() {
                    character.selected = index == character_index;
                }
            } else {
                account.characters[character_index].selected = false;
            }
        }
        ToggleMode::Exclusive => {
            for (a_index, account) in roster.accounts_mut().iter_mut().enumerate() {
                for (c_index, character) in account.characters.iter_mut().enumerate() {
                    character.selected = a_index == account_index && c_index == character_index;
                }
            }
        }
    }

    if selection_snapshot(roster) == before {
        Ok(RosterChange::Unchanged)
    } else {
        Ok(RosterChange::Selection)
    }
}

/// Deselects every character. Returns `Unchanged` when nothing was selected.
pub fn clear_all(roster: &mut Roster) -> RosterChange {
    let mut changed = false;
    for account in roster.accounts_mut() {
        for character in &mut account.characters {
            if character.selected {
                character.selected = false;
                changed = true;
            }
        }
    }
    if changed {
        RosterChange::Selection
    } else {
        RosterChange::Unchanged
    }
}

fn selection_snapshot(roster: &Roster) -> Vec<(usize, usize)> {
    roster
        .accounts()
        .iter()
        .enumerate()
        .flat_map(|(a_index, account)| {
            account
                .characters
                .iter()
                .enumerate()
                .filter(|(_, character)| character.selected)
                .map(move |(c_index, _)| (a_index, c_index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Character};

    fn roster() -> Roster {
        Roster::from_accounts(vec![
            Account::new("alpha", "a")
                .with_character(Character::new(1, "Ann"))
                .with_character(Character::new(2, "Ben"))
                .with_character(Character::new(3, "Cid")),
            Account::new("beta", "b")
                .with_character(Character::new(1, "Dee"))
                .with_character(Character::new(2, "Eve")),
        ])
    }

    fn selected_names(roster: &Roster) -> Vec<String> {
        roster
            .accounts()
            .iter()
            .flat_map(|account| account.characters.iter())
            .filter(|character| character.selected)
            .map(|character| character.name.clone())
            .collect()
    }

    fn assert_single_per_account(roster: &Roster) {
        for account in roster.accounts() {
            let count = account
                .characters
                .iter()
                .filter(|character| character.selected)
                .count();
            assert!(count <= 1, "account {} has {count} selections", account.name);
        }
    }

    #[test]
    fn plain_toggle_keeps_one_selection_per_account() {
        let mut roster = roster();
        let sequence = [(0, 0), (0, 1), (1, 1), (0, 2), (1, 0), (0, 2), (1, 0), (0, 1)];
        for (account, character) in sequence {
            toggle(&mut roster, account, character, ToggleMode::PerAccount).expect("toggle");
            assert_single_per_account(&roster);
        }
        assert_eq!(selected_names(&roster), vec!["Ben".to_string()]);
    }

    #[test]
    fn plain_toggle_leaves_other_accounts_untouched() {
        let mut roster = roster();
        toggle(&mut roster, 1, 0, ToggleMode::PerAccount).expect("toggle beta");
        toggle(&mut roster, 0, 2, ToggleMode::PerAccount).expect("toggle alpha");
        assert_eq!(
            selected_names(&roster),
            vec!["Cid".to_string(), "Dee".to_string()]
        );
    }

    #[test]
    fn plain_toggle_on_selected_character_clears_it() {
        let mut roster = roster();
        toggle(&mut roster, 0, 1, ToggleMode::PerAccount).expect("select");
        let change = toggle(&mut roster, 0, 1, ToggleMode::PerAccount).expect("deselect");
        assert_eq!(change, RosterChange::Selection);
        assert!(selected_names(&roster).is_empty());
    }

    #[test]
    fn exclusive_toggle_selects_exactly_target_roster_wide() {
        let mut roster = roster();
        toggle(&mut roster, 0, 0, ToggleMode::PerAccount).expect("select alpha");
        toggle(&mut roster, 1, 1, ToggleMode::PerAccount).expect("select beta");

        toggle(&mut roster, 1, 0, ToggleMode::Exclusive).expect("exclusive");
        assert_eq!(selected_names(&roster), vec!["Dee".to_string()]);

        // Already selected target stays selected in exclusive mode.
        let change = toggle(&mut roster, 1, 0, ToggleMode::Exclusive).expect("exclusive again");
        assert_eq!(change, RosterChange::Unchanged);
        assert_eq!(selected_names(&roster), vec!["Dee".to_string()]);
    }

    #[test]
    fn toggle_rejects_out_of_range_indices() {
        let mut roster = roster();
        assert!(matches!(
            toggle(&mut roster, 5, 0, ToggleMode::PerAccount),
            Err(RosterError::AccountOutOfRange { .. })
        ));
        assert!(matches!(
            toggle(&mut roster, 1, 9, ToggleMode::Exclusive),
            Err(RosterError::CharacterOutOfRange { .. })
        ));
        assert!(selected_names(&roster).is_empty());
    }

    #[test]
    fn clear_all_is_idempotent() {
        let mut roster = roster();
        toggle(&mut roster, 0, 0, ToggleMode::PerAccount).expect("select");
        toggle(&mut roster, 1, 1, ToggleMode::PerAccount).expect("select");

        assert_eq!(clear_all(&mut roster), RosterChange::Selection);
        let once = roster.clone();
        assert_eq!(clear_all(&mut roster), RosterChange::Unchanged);
        assert_eq!(roster, once);
    }
}
