//! Core, format-agnostic types for mdpo-sync.
//! Parsers decode into these; encoders serialize these.

use std::{
    collections::{BTreeSet, HashSet},
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identity of an entry inside one catalog.
///
/// Entries are matched by `(id, context)`; two entries with the same source
/// text but different contexts are distinct messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub id: String,
    pub context: Option<String>,
}

impl EntryKey {
    pub fn new(id: impl Into<String>, context: Option<String>) -> Self {
        Self {
            id: id.into(),
            context,
        }
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} [{}]", self.id, context),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A single translatable message and its translation state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageEntry {
    /// Canonical source text. Never empty.
    pub id: String,

    /// Target-language text; empty while untranslated.
    #[serde(default)]
    pub translation: String,

    /// Disambiguates identical source texts used in different roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub context: Option<String>,

    /// Retained for history, no longer backed by an extracted message.
    #[serde(skip_serializing_if = "is_false")]
    #[serde(default)]
    pub obsolete: bool,

    /// Auxiliary tags, in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub flags: Vec<String>,

    /// Translator comments, in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub comments: Vec<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MessageEntry {
    /// A live, untranslated entry.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            translation: String::new(),
            context: None,
            obsolete: false,
            flags: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = translation.into();
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.add_flag(flag);
        self
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.id.clone(), self.context.clone())
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        self.id == key.id && self.context == key.context
    }

    pub fn is_translated(&self) -> bool {
        !self.translation.is_empty()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Adds a flag unless it is already present.
    pub fn add_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.has_flag(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn remove_flag(&mut self, flag: &str) {
        self.flags.retain(|f| f != flag);
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::InvalidEntry(
                "message id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Display for MessageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MessageEntry {{ id: {}, translation: {}, obsolete: {} }}",
            self.id, self.translation, self.obsolete
        )
    }
}

/// A candidate message produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractedMessage {
    pub id: String,
    pub context: Option<String>,
}

impl ExtractedMessage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.id.clone(), self.context.clone())
    }
}

/// Everything an extractor found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Messages in document order.
    pub messages: Vec<ExtractedMessage>,
    /// Ids that must be neither inserted nor translated.
    pub disabled: BTreeSet<String>,
}

impl Extraction {
    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    /// Extracted messages that are not disabled.
    pub fn enabled(&self) -> impl Iterator<Item = &ExtractedMessage> {
        self.messages.iter().filter(|m| !self.is_disabled(&m.id))
    }
}

/// Translated versus total live entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub translated: usize,
    pub total: usize,
}

impl CatalogStats {
    pub fn new(translated: usize, total: usize) -> Self {
        Self { translated, total }
    }

    /// Completion as a percentage; an empty catalog counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.translated as f64 / self.total as f64 * 100.0
        }
    }
}

impl std::ops::AddAssign for CatalogStats {
    fn add_assign(&mut self, other: Self) {
        self.translated += other.translated;
        self.total += other.total;
    }
}

/// An ordered collection of message entries persisted to one file.
///
/// Insertion order is stable across loads, merges and saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Raw header text (the translation of the empty msgid), if any.
    pub header: Option<String>,

    /// Comment and flag lines above the header entry, verbatim.
    pub header_comments: Vec<String>,

    /// Ordered entries, unique by `(id, context)`.
    pub entries: Vec<MessageEntry>,

    /// Backing file; `None` for documents excluded from translation.
    pub path: Option<PathBuf>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageEntry> {
        self.entries.iter()
    }

    pub fn find(&self, key: &EntryKey) -> Option<&MessageEntry> {
        self.entries.iter().find(|e| e.matches(key))
    }

    pub fn find_mut(&mut self, key: &EntryKey) -> Option<&mut MessageEntry> {
        self.entries.iter_mut().find(|e| e.matches(key))
    }

    /// First entry with the given id, whatever its context.
    pub fn find_by_id(&self, id: &str) -> Option<&MessageEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut MessageEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.find(key).is_some()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Appends an entry, or revives the existing one with the same key.
    ///
    /// Returns true when a new entry was inserted.
    pub fn push(&mut self, entry: MessageEntry) -> bool {
        if let Some(existing) = self.find_mut(&entry.key()) {
            existing.obsolete = false;
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Inserts an entry at position 0, or revives the existing one in place.
    pub fn push_front(&mut self, entry: MessageEntry) -> bool {
        if let Some(existing) = self.find_mut(&entry.key()) {
            existing.obsolete = false;
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    /// Removes every entry with the given id, returning them in order.
    pub fn remove_id(&mut self, id: &str) -> Vec<MessageEntry> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.id == id);
        self.entries = kept;
        removed
    }

    /// Distinct ids of live entries, in catalog order.
    pub fn live_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| !e.obsolete)
            .map(|e| e.id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Translated versus total live entries.
    pub fn stats(&self) -> CatalogStats {
        self.entries
            .iter()
            .filter(|e| !e.obsolete)
            .fold(CatalogStats::default(), |mut stats, e| {
                stats.total += 1;
                if e.is_translated() {
                    stats.translated += 1;
                }
                stats
            })
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let mut keys = HashSet::new();
        for entry in &self.entries {
            entry.validate()?;
            if !keys.insert(entry.key()) {
                return Err(Error::InvalidEntry(format!(
                    "duplicate message `{}`",
                    entry.key()
                )));
            }
        }
        Ok(())
    }
}
