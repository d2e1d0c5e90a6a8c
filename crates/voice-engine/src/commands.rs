//! Keyword-to-action registry

use crate::normalize::normalize;
use std::fmt;
use std::sync::Arc;

/// Action fired when a keyword is heard
pub type CommandAction = Arc<dyn Fn() + Send + Sync>;

/// Handler for dictated digit strings
pub type NumberHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Ordered keyword table.
///
/// Lookup walks keywords in registration order, so the earliest registered
/// keyword wins when an utterance contains several.
#[derive(Clone, Default)]
pub struct CommandTable {
    entries: Vec<(String, CommandAction)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every comma-separated keyword in `keyword_csv` as an alias of
    /// `action`. A keyword registered again keeps its position and takes the
    /// new action. Returns how many keywords were stored.
    pub fn register(&mut self, keyword_csv: &str, action: CommandAction) -> usize {
        let mut stored = 0;

        for keyword in keyword_csv.split(',').map(normalize).filter(|k| !k.is_empty()) {
            match self.entries.iter_mut().find(|(existing, _)| *existing == keyword) {
                Some(entry) => entry.1 = Arc::clone(&action),
                None => self.entries.push((keyword, Arc::clone(&action))),
            }
            stored += 1;
        }

        stored
    }

    /// First keyword (in registration order) contained in the utterance
    pub fn find(&self, normalized_utterance: &str) -> Option<(&str, &CommandAction)> {
        if normalized_utterance.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(keyword, _)| normalized_utterance.contains(keyword.as_str()))
            .map(|(keyword, action)| (keyword.as_str(), action))
    }

    /// Registered keywords in order
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(keyword, _)| keyword.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keywords()).finish()
    }
}
