use std::collections::BTreeMap;

use crate::error::WindowError;
use crate::types::NameKey;

/// OS window capability consumed by the conflict resolver and the launch
/// orchestrator.
pub trait WindowControl: Send + Sync {
    /// Character names of every visible game window, queried fresh.
    fn list_running_character_windows(&self) -> Result<Vec<String>, WindowError>;
    fn focus_window(&self, title: &str) -> Result<bool, WindowError>;
    fn close_window(&self, title: &str) -> Result<bool, WindowError>;
    /// Full window title of a character's game window.
    fn character_window_title(&self, character_name: &str) -> String;
}

/// Character names currently detected as active windows, keyed
/// case-insensitively. Built fresh before every check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningSet {
    names: BTreeMap<NameKey, String>,
}

impl RunningSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeMap::new();
        for name in names {
            let name = name.into();
            let key = NameKey::new(&name);
            if key.as_str().is_empty() {
                continue;
            }
            set.entry(key).or_insert(name);
        }
        Self { names: set }
    }

    pub fn query(windows: &dyn WindowControl) -> Result<Self, WindowError> {
        windows.list_running_character_windows().map(Self::new)
    }

    pub fn contains(&self, key: &NameKey) -> bool {
        self.names.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NameKey, &str)> {
        self.names.iter().map(|(key, name)| (key, name.as_str()))
    }

    /// Display names in key order.
    pub fn names(&self) -> Vec<String> {
        self.names.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeWindows;
    use super::*;

    #[test]
    fn running_set_dedupes_case_insensitively_and_skips_blanks() {
        let set = RunningSet::new(["Bob", "bob", " ", "Alice"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&NameKey::new("BOB")));
        assert_eq!(set.names(), vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn query_propagates_backend_errors() {
        let windows = FakeWindows::scripted(vec![Err(WindowError::Unsupported(
            "windows only".to_string(),
        ))]);
        assert_eq!(
            RunningSet::query(&windows),
            Err(WindowError::Unsupported("windows only".to_string()))
        );
    }
}
