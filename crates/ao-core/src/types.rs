//! Roster data model shared by every component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A playable identity under an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(rename = "characterId")]
    pub id: u32,
    #[serde(rename = "characterName")]
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Character {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            selected: false,
            comment: None,
        }
    }

    pub fn key(&self) -> NameKey {
        NameKey::new(&self.name)
    }
}

/// A login credential grouping characters. The name is the conflict
/// grouping identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "accountName")]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl Account {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            characters: Vec::new(),
        }
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.characters.push(character);
        self
    }

    pub fn selected_character(&self) -> Option<&Character> {
        self.characters.iter().find(|character| character.selected)
    }

    pub fn has_selection(&self) -> bool {
        self.selected_character().is_some()
    }

    pub fn character_by_key(&self, key: &NameKey) -> Option<&Character> {
        self.characters.iter().find(|character| &character.key() == key)
    }

    pub fn character_ref(&self, character: &Character) -> CharacterRef {
        CharacterRef {
            account_name: self.name.clone(),
            character_id: character.id,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("password", &"***")
            .field("characters", &self.characters)
            .finish()
    }
}

/// Case-insensitive character name used for window/roster correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameKey(String);

impl NameKey {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NameKey {
    fn from(value: &str) -> Self {
        NameKey::new(value)
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one character's preference folder: account name plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRef {
    pub account_name: String,
    pub character_id: u32,
}

impl CharacterRef {
    pub fn new(account_name: impl Into<String>, character_id: u32) -> Self {
        Self {
            account_name: account_name.into(),
            character_id,
        }
    }
}

impl fmt::Display for CharacterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_name, self.character_id)
    }
}

/// One character handed to the launch primitive.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchTarget {
    pub account_name: String,
    pub password: String,
    pub character_id: u32,
    #[serde(default)]
    pub character_name: String,
}

impl LaunchTarget {
    pub fn from_selection(account: &Account, character: &Character) -> Self {
        Self {
            account_name: account.name.clone(),
            password: account.password.clone(),
            character_id: character.id,
            character_name: character.name.clone(),
        }
    }

    /// Name used when itemizing outcomes.
    pub fn display_name(&self) -> String {
        if self.character_name.trim().is_empty() {
            format!("{}/{}", self.account_name, self.character_id)
        } else {
            self.character_name.clone()
        }
    }
}

impl fmt::Debug for LaunchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchTarget")
            .field("account_name", &self.account_name)
            .field("password", &"***")
            .field("character_id", &self.character_id)
            .field("character_name", &self.character_name)
            .finish()
    }
}
