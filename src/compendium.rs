//! The per-language compendium and the end-of-build deduplication pass.
//!
//! A compendium is a catalog keyed by message id alone, shared by every
//! document of a language. Messages found in more than one document catalog
//! are promoted into it; compendium messages no longer repeated are demoted
//! and marked obsolete.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    codec::{read_catalog_or_new, remove_catalog, write_catalog},
    config::{Config, SiteSetting},
    error::Error,
    types::{Catalog, MessageEntry},
};

/// Shared fallback catalog of one language.
#[derive(Debug, Clone)]
pub struct Compendium {
    language: String,
    catalog: Catalog,
    /// Ids resolved straight from the compendium during this build.
    pinned: HashSet<String>,
}

impl Compendium {
    /// An in-memory compendium, never persisted.
    pub fn new(language: impl Into<String>) -> Self {
        Self::from_catalog(language, Catalog::new())
    }

    pub fn from_catalog(language: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            language: language.into(),
            catalog,
            pinned: HashSet::new(),
        }
    }

    /// Loads the compendium at `path`, creating an empty file when missing.
    pub fn load_or_create<P: AsRef<Path>>(language: &str, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let existed = path.is_file();
        let catalog = read_catalog_or_new(path)?;
        if !existed {
            write_catalog(&catalog)?;
            debug!("Created compendium {}", path.display());
        }
        Ok(Self::from_catalog(language, catalog))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn path(&self) -> Option<&Path> {
        self.catalog.path.as_deref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn into_catalog(self) -> Catalog {
        self.catalog
    }

    pub fn get(&self, id: &str) -> Option<&MessageEntry> {
        self.catalog.find_by_id(id)
    }

    /// Non-empty translation of `id`, if any.
    pub fn translation(&self, id: &str) -> Option<&str> {
        self.get(id)
            .filter(|e| e.is_translated())
            .map(|e| e.translation.as_str())
    }

    pub fn save(&self) -> Result<bool, Error> {
        write_catalog(&self.catalog)
    }

    /// Merges the configured site settings, flagging each entry with the
    /// setting it translates. Missing entries are inserted at the front.
    ///
    /// Returns the translation of every setting that has one. A setting
    /// without a configured value is skipped with a warning.
    pub fn merge_site_settings(&mut self, config: &Config) -> HashMap<SiteSetting, String> {
        let mut translations = HashMap::new();
        for setting in &config.translate {
            let Some(value) = config.site.value(*setting) else {
                warn!(
                    "Site setting \"{}\" is configured to be translated but has no value, skipping",
                    setting
                );
                continue;
            };
            match self.catalog.find_by_id_mut(value) {
                Some(entry) => {
                    entry.obsolete = false;
                    entry.add_flag(setting.flag());
                    if entry.is_translated() {
                        translations.insert(*setting, entry.translation.clone());
                    }
                }
                None => {
                    self.catalog
                        .entries
                        .insert(0, MessageEntry::new(value).with_flag(setting.flag()));
                }
            }
        }
        translations
    }

    /// Looks up a message that only lives in the compendium, such as a
    /// navigation section title, inserting an empty entry at the front when
    /// it is unknown. The id stays live through the next deduplication.
    pub fn resolve_shared(&mut self, id: &str) -> Option<String> {
        self.pinned.insert(id.to_string());
        match self.catalog.find_by_id_mut(id) {
            Some(entry) => {
                entry.obsolete = false;
                entry.is_translated().then(|| entry.translation.clone())
            }
            None => {
                self.catalog.entries.insert(0, MessageEntry::new(id));
                None
            }
        }
    }

    fn is_kept_live(&self, entry: &MessageEntry) -> bool {
        self.pinned.contains(&entry.id)
            || entry.flags.iter().any(|f| SiteSetting::is_setting_flag(f))
    }
}

/// What the deduplication pass did to one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub language: String,
    /// Repeated ids now owned by the compendium, in first-seen order.
    pub promoted: Vec<String>,
    /// Compendium ids no longer repeated, now obsolete.
    pub demoted: Vec<String>,
    /// Document catalogs skipped because their file is gone.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped: Vec<PathBuf>,
    pub compendium_removed: bool,
}

fn is_participant(catalog: &Catalog) -> bool {
    catalog.path.as_deref().is_some_and(Path::is_file)
}

/// Moves messages repeated across document catalogs into the compendium.
///
/// Catalogs are given in document processing order. A catalog without a
/// path, or whose file no longer exists, is treated as an excluded document
/// and left alone. Only live entries count as occurrences: an id that is
/// obsolete in a document catalog is history there, not a use, so it never
/// makes a message repeated. Repeated ids take the first non-empty
/// translation found, falling back to the first occurrence, and are removed
/// from every document catalog. Compendium entries that are not repeated
/// any more are marked obsolete, except site settings and ids resolved from
/// the compendium during the build. When a demoted id is still used by exactly
/// one document, its translation is handed back to that document.
///
/// The compendium file is deleted once it holds nothing worth keeping: no
/// live entry and no translation. Obsolete translations keep it on disk so
/// they can be revived by a later build.
pub fn reconcile_compendium(
    compendium: &mut Compendium,
    documents: &mut [Catalog],
) -> Result<DedupReport, Error> {
    let mut report = DedupReport {
        language: compendium.language.clone(),
        ..DedupReport::default()
    };

    let participants: Vec<usize> = documents
        .iter()
        .enumerate()
        .filter_map(|(index, catalog)| {
            if is_participant(catalog) {
                Some(index)
            } else {
                if let Some(path) = catalog.path.as_deref() {
                    debug!("Skipping missing catalog {}", path.display());
                    report.skipped.push(path.to_path_buf());
                }
                None
            }
        })
        .collect();

    // first-seen order keeps promotion deterministic
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for &index in &participants {
        for id in documents[index].live_ids() {
            let count = counts.entry(id.to_string()).or_insert(0);
            if *count == 0 {
                order.push(id.to_string());
            }
            *count += 1;
        }
    }
    let repeated: Vec<String> = order.into_iter().filter(|id| counts[id] > 1).collect();
    let repeated_set: HashSet<&str> = repeated.iter().map(String::as_str).collect();

    let mut modified = vec![false; documents.len()];
    for id in &repeated {
        let occurrences: Vec<MessageEntry> = participants
            .iter()
            .filter_map(|&index| documents[index].find_by_id(id).cloned())
            .collect();
        let canonical = occurrences
            .iter()
            .find(|e| e.is_translated())
            .or_else(|| occurrences.first());

        match compendium.catalog.find_by_id_mut(id) {
            Some(existing) => {
                existing.obsolete = false;
                existing.flags.retain(|f| !SiteSetting::is_setting_flag(f));
                if !existing.is_translated() {
                    if let Some(found) = canonical.filter(|e| e.is_translated()) {
                        existing.translation = found.translation.clone();
                    }
                }
            }
            None => {
                if let Some(found) = canonical {
                    let mut promoted = found.clone();
                    promoted.obsolete = false;
                    promoted.context = None;
                    compendium.catalog.entries.push(promoted);
                }
            }
        }

        for &index in &participants {
            if !documents[index].remove_id(id).is_empty() {
                modified[index] = true;
            }
        }
        debug!(
            "Promoted \"{}\" to the {} compendium",
            id, compendium.language
        );
        report.promoted.push(id.clone());
    }

    for index in 0..compendium.catalog.entries.len() {
        let entry = &compendium.catalog.entries[index];
        if repeated_set.contains(entry.id.as_str()) {
            continue;
        }
        if compendium.is_kept_live(entry) {
            compendium.catalog.entries[index].obsolete = false;
            continue;
        }
        if entry.obsolete {
            continue;
        }

        let id = entry.id.clone();
        let translation = entry.translation.clone();
        let users: Vec<usize> = participants
            .iter()
            .copied()
            .filter(|&i| documents[i].find_by_id(&id).is_some_and(|e| !e.obsolete))
            .collect();
        if let [only] = users.as_slice() {
            if let Some(target) = documents[*only].find_by_id_mut(&id) {
                if !target.is_translated() && !translation.is_empty() {
                    target.translation = translation;
                    modified[*only] = true;
                }
            }
        }
        compendium.catalog.entries[index].obsolete = true;
        report.demoted.push(id);
    }

    for (index, catalog) in documents.iter().enumerate() {
        if modified[index] {
            write_catalog(catalog)?;
        }
    }

    if compendium
        .catalog
        .iter()
        .any(|e| !e.obsolete || e.is_translated())
    {
        compendium.save()?;
    } else {
        if let Some(path) = compendium.path() {
            if path.is_file() {
                remove_catalog(path)?;
            }
            debug!("Removed empty compendium {}", path.display());
        }
        report.compendium_removed = true;
    }
    Ok(report)
}
