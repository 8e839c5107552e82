use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WsdError};

/// Identifier assigned to a normalized word. Always `>= 1`.
pub type WordId = u32;

/// Registry that hands out stable integer ids to words in first-seen order.
///
/// Words are normalized (lowercased and trimmed) before every operation, so
/// `"Cat"`, `" cat "` and `"cat"` share one id. Ids are never reused: a word
/// that is removed and later seen again receives a fresh, higher id.
///
/// The registry is a single-owner structure with no internal locking.
#[derive(Debug, Default, Clone)]
pub struct WordRegistry {
    words: HashMap<String, WordId>,
    last_id: WordId,
}

/// On-disk JSON layout used by [`WordRegistry::save`] and [`WordRegistry::load`].
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    last_id: WordId,
    words: BTreeMap<String, WordId>,
}

impl WordRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a word into its registry key.
    ///
    /// # Example
    /// ```
    /// use wsdprep::registry::WordRegistry;
    ///
    /// assert_eq!(WordRegistry::normalize("  River "), "river");
    /// ```
    pub fn normalize(word: &str) -> String {
        word.trim().to_lowercase()
    }

    /// Returns the id of `word`, assigning the next unused id when the word
    /// has not been seen before.
    ///
    /// # Example
    /// ```
    /// use wsdprep::registry::WordRegistry;
    ///
    /// let mut registry = WordRegistry::new();
    /// assert_eq!(registry.lookup_or_insert("the"), 1);
    /// assert_eq!(registry.lookup_or_insert("river"), 2);
    /// assert_eq!(registry.lookup_or_insert("The"), 1);
    /// ```
    pub fn lookup_or_insert(&mut self, word: &str) -> WordId {
        let key = Self::normalize(word);
        if let Some(&id) = self.words.get(&key) {
            return id;
        }
        self.last_id += 1;
        self.words.insert(key, self.last_id);
        self.last_id
    }

    /// Returns the id of `word` without modifying the registry.
    pub fn lookup(&self, word: &str) -> Option<WordId> {
        self.words.get(&Self::normalize(word)).copied()
    }

    /// Removes `word` and returns the id it had been assigned, or `None` when
    /// the word is absent. The id is retired, not recycled.
    pub fn remove(&mut self, word: &str) -> Option<WordId> {
        self.words.remove(&Self::normalize(word))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(&Self::normalize(word))
    }

    /// Number of words currently registered.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The most recently issued id, or 0 for a registry that never issued one.
    pub fn last_id(&self) -> WordId {
        self.last_id
    }

    /// Exports the current word to id mapping, ordered by word.
    pub fn to_mapping(&self) -> BTreeMap<String, WordId> {
        self.words
            .iter()
            .map(|(word, &id)| (word.clone(), id))
            .collect()
    }

    /// Writes the registry as JSON so that a later session can keep its ids.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = RegistryFile {
            last_id: self.last_id,
            words: self.to_mapping(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writer.flush()?;
        debug!("saved {} registry entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads a registry previously written by [`WordRegistry::save`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// violates the registry invariants (non-positive or duplicate ids, ids
    /// above `last_id`, keys that are not normalized).
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: RegistryFile = serde_json::from_reader(reader)?;

        let mut seen = HashSet::with_capacity(file.words.len());
        for (word, &id) in &file.words {
            if Self::normalize(word) != *word {
                return Err(WsdError::InvalidRegistry(format!(
                    "key {word:?} is not normalized"
                )));
            }
            if id == 0 || id > file.last_id {
                return Err(WsdError::InvalidRegistry(format!(
                    "id {id} of {word:?} is outside 1..={}",
                    file.last_id
                )));
            }
            if !seen.insert(id) {
                return Err(WsdError::InvalidRegistry(format!(
                    "id {id} is assigned more than once"
                )));
            }
        }

        debug!("loaded {} registry entries from {}", file.words.len(), path.display());
        Ok(WordRegistry {
            words: file.words.into_iter().collect(),
            last_id: file.last_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn test_lookup_or_insert_is_stable() {
        let mut registry = WordRegistry::new();
        let first = registry.lookup_or_insert("bank");
        let second = registry.lookup_or_insert("bank");
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_normalization_invariance() {
        let mut registry = WordRegistry::new();
        let a = registry.lookup_or_insert("Cat");
        let b = registry.lookup_or_insert(" cat ");
        let c = registry.lookup_or_insert("cat");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_follow_first_seen_order() {
        let mut registry = WordRegistry::new();
        let ids: Vec<WordId> = ["the", "river", "The", "was", "wide", "river"]
            .iter()
            .map(|w| registry.lookup_or_insert(w))
            .collect();
        assert_eq!(ids, vec![1, 2, 1, 3, 4, 2]);
        assert_eq!(registry.last_id(), 4);
    }

    #[test]
    fn test_lookup_does_not_insert() {
        let mut registry = WordRegistry::new();
        assert_eq!(registry.lookup("river"), None);
        assert!(registry.is_empty());

        registry.lookup_or_insert("river");
        assert_eq!(registry.lookup("RIVER"), Some(1));
        assert!(registry.contains(" River"));
        assert!(!registry.contains("bank"));
    }

    #[test]
    fn test_remove_then_reinsert_issues_new_id() {
        let mut registry = WordRegistry::new();
        registry.lookup_or_insert("a");
        let b = registry.lookup_or_insert("b");

        assert_eq!(registry.remove("B"), Some(b));
        assert_eq!(registry.remove("b"), None);
        assert!(!registry.contains("b"));

        let again = registry.lookup_or_insert("b");
        assert!(again > b);
        assert_eq!(again, 3);
    }

    #[test]
    fn test_to_mapping() {
        let mut registry = WordRegistry::new();
        registry.lookup_or_insert("wide");
        registry.lookup_or_insert("River");

        let mapping = registry.to_mapping();
        let entries: Vec<(&str, WordId)> = mapping.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        assert_eq!(entries, vec![("river", 2), ("wide", 1)]);
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let mut registry = WordRegistry::new();
        registry.lookup_or_insert("the");
        registry.lookup_or_insert("river");
        registry.lookup_or_insert("gone");
        registry.remove("gone");

        let file = NamedTempFile::new()?;
        registry.save(file.path())?;

        let mut loaded = WordRegistry::load(file.path())?;
        assert_eq!(loaded.to_mapping(), registry.to_mapping());
        assert_eq!(loaded.last_id(), 3);
        // The retired id stays retired after a round trip.
        assert_eq!(loaded.lookup_or_insert("gone"), 4);
        Ok(())
    }

    #[test]
    fn test_load_rejects_duplicate_ids() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"last_id": 2, "words": {{"a": 1, "b": 1}}}}"#)?;

        let result = WordRegistry::load(file.path());
        assert!(matches!(result, Err(WsdError::InvalidRegistry(_))));
        Ok(())
    }

    #[test]
    fn test_load_rejects_ids_above_counter() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"last_id": 1, "words": {{"a": 1, "b": 2}}}}"#)?;

        let result = WordRegistry::load(file.path());
        assert!(matches!(result, Err(WsdError::InvalidRegistry(_))));
        Ok(())
    }

    #[test]
    fn test_load_rejects_unnormalized_keys() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"last_id": 1, "words": {{"River": 1}}}}"#)?;

        let result = WordRegistry::load(file.path());
        assert!(matches!(result, Err(WsdError::InvalidRegistry(_))));
        Ok(())
    }
}
