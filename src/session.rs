//! Translation session state.
//!
//! A [`TranslationSession`] exists while one document variant is being
//! translated for one language. It owns the document catalog for that time,
//! reads the compendium, and records which messages the translator consumed.
//! Finishing the session yields a [`DocumentTranslation`], the record the
//! end-of-build passes work on.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    compendium::Compendium,
    types::{Catalog, EntryKey, MessageEntry},
};

/// The single active (document, language) translation context.
#[derive(Debug)]
pub struct TranslationSession<'a> {
    document: String,
    language: String,
    catalog: Catalog,
    compendium: &'a Compendium,
    resolved: HashMap<String, String>,
    disabled: HashSet<String>,
}

impl<'a> TranslationSession<'a> {
    pub fn begin(
        document: impl Into<String>,
        language: impl Into<String>,
        catalog: Catalog,
        compendium: &'a Compendium,
    ) -> Self {
        Self {
            document: document.into(),
            language: language.into(),
            catalog,
            compendium,
            resolved: HashMap::new(),
            disabled: HashSet::new(),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn compendium(&self) -> &Compendium {
        self.compendium
    }

    /// Marks ids the translator must leave untouched.
    pub fn disable<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(ids.into_iter().map(Into::into));
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    /// First non-empty translation of `key` in the document catalog, then in
    /// the compendium. Does not record anything.
    pub fn lookup(&self, key: &EntryKey) -> Option<&str> {
        if self.is_disabled(&key.id) {
            return None;
        }
        [
            self.catalog.find(key),
            self.compendium.get(&key.id),
        ]
        .into_iter()
        .flatten()
        .find(|e| e.is_translated())
        .map(|e| e.translation.as_str())
    }

    /// Resolves a message for the translator and records it as consumed.
    ///
    /// A message found in neither catalog is appended to the document
    /// catalog. Disabled ids are never resolved. Returns the non-empty
    /// translation, if any.
    pub fn resolve(&mut self, key: &EntryKey) -> Option<String> {
        if self.is_disabled(&key.id) {
            return None;
        }
        let known = self.catalog.contains(key) || self.compendium.get(&key.id).is_some();
        let translation = self.lookup(key).map(str::to_string);
        if !known {
            self.catalog
                .entries
                .push(MessageEntry::new(key.id.clone()).with_context(key.context.clone()));
        }
        self.resolved
            .insert(key.id.clone(), translation.clone().unwrap_or_default());
        translation
    }

    /// Shorthand for resolving a context-free id.
    pub fn resolve_id(&mut self, id: &str) -> Option<String> {
        self.resolve(&EntryKey::new(id, None))
    }

    /// Ids resolved to a non-empty translation so far.
    pub fn translated_ids(&self) -> BTreeSet<&str> {
        self.resolved
            .iter()
            .filter(|(_, translation)| !translation.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Every id resolved so far, translated or not.
    pub fn resolved_ids(&self) -> BTreeSet<&str> {
        self.resolved.keys().map(String::as_str).collect()
    }

    /// Ends the session, handing the catalog back.
    pub fn finish(self) -> DocumentTranslation {
        DocumentTranslation {
            document: self.document,
            catalog: self.catalog,
            resolved: self.resolved.into_keys().collect(),
            disabled: self.disabled,
            borrowed: HashSet::new(),
        }
    }
}

/// What a finished session left behind for one document and language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTranslation {
    pub document: String,
    /// Path is `None` for documents excluded from translation.
    pub catalog: Catalog,
    /// Ids consumed by the translator.
    pub resolved: HashSet<String>,
    pub disabled: HashSet<String>,
    /// Ids copied in from the compendium by this build's merge.
    pub borrowed: HashSet<String>,
}

impl DocumentTranslation {
    /// A record for a document excluded from translation.
    pub fn excluded(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            catalog: Catalog::new(),
            resolved: HashSet::new(),
            disabled: HashSet::new(),
            borrowed: HashSet::new(),
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.catalog.path.is_none()
    }

    /// Drops compendium copies the translator never used.
    pub fn drop_unused_borrowed(&mut self) -> usize {
        let before = self.catalog.len();
        let resolved = &self.resolved;
        let borrowed = &self.borrowed;
        self.catalog
            .entries
            .retain(|e| !borrowed.contains(&e.id) || resolved.contains(&e.id));
        before - self.catalog.len()
    }

    /// Flags every entry the translator did not consume this build.
    pub fn mark_obsolete(&mut self) -> usize {
        self.catalog.mark_obsolete_except(&self.resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compendium() -> Compendium {
        Compendium::from_catalog(
            "es",
            Catalog {
                entries: vec![
                    MessageEntry::new("Shared").with_translation("Compartido"),
                    MessageEntry::new("Both").with_translation("Ambos (compendio)"),
                ],
                ..Catalog::default()
            },
        )
    }

    fn catalog() -> Catalog {
        Catalog {
            entries: vec![
                MessageEntry::new("Local").with_translation("Local traducido"),
                MessageEntry::new("Both"),
                MessageEntry::new("Empty"),
            ],
            ..Catalog::default()
        }
    }

    #[test]
    fn test_catalog_first_then_compendium() {
        let compendium = compendium();
        let mut session = TranslationSession::begin("index.md", "es", catalog(), &compendium);

        assert_eq!(session.resolve_id("Local").as_deref(), Some("Local traducido"));
        assert_eq!(session.resolve_id("Shared").as_deref(), Some("Compartido"));
        // empty catalog entry falls through to the compendium
        assert_eq!(session.resolve_id("Both").as_deref(), Some("Ambos (compendio)"));
    }

    #[test]
    fn test_empty_translations_are_still_resolved() {
        let compendium = compendium();
        let mut session = TranslationSession::begin("index.md", "es", catalog(), &compendium);

        assert_eq!(session.resolve_id("Empty"), None);
        assert!(session.resolved_ids().contains("Empty"));
        assert!(!session.translated_ids().contains("Empty"));
    }

    #[test]
    fn test_unknown_message_is_appended() {
        let compendium = compendium();
        let mut session = TranslationSession::begin("index.md", "es", catalog(), &compendium);

        assert_eq!(session.resolve_id("Brand new"), None);
        assert_eq!(session.catalog().entries.last().unwrap().id, "Brand new");
        assert_eq!(session.resolve_id("Brand new"), None);
        assert_eq!(session.catalog().len(), 4);
    }

    #[test]
    fn test_disabled_ids_are_not_resolved() {
        let compendium = compendium();
        let mut session = TranslationSession::begin("index.md", "es", catalog(), &compendium);
        session.disable(["Local"]);

        assert_eq!(session.resolve_id("Local"), None);
        assert!(session.resolved_ids().is_empty());
    }

    #[test]
    fn test_finish_and_mark_obsolete() {
        let compendium = compendium();
        let mut session = TranslationSession::begin("index.md", "es", catalog(), &compendium);
        session.resolve_id("Local");
        let mut translation = session.finish();

        assert_eq!(translation.mark_obsolete(), 2);
        assert!(!translation.catalog.entries[0].obsolete);
        assert!(translation.catalog.entries[1].obsolete);
    }

    #[test]
    fn test_drop_unused_borrowed() {
        let mut translation = DocumentTranslation::excluded("index.md");
        translation.catalog.entries = vec![
            MessageEntry::new("Used").with_translation("Usado"),
            MessageEntry::new("Unused").with_translation("No usado"),
        ];
        translation.borrowed = ["Used", "Unused"].iter().map(|s| s.to_string()).collect();
        translation.resolved.insert("Used".to_string());

        assert_eq!(translation.drop_unused_borrowed(), 1);
        assert_eq!(translation.catalog.entries[0].id, "Used");
        assert!(translation.is_excluded());
    }
}
