//! Per-document catalog lifecycle: merging extraction output, page metadata
//! and compendium translations into a catalog, and the end-of-build obsolete
//! marking.
//!
//! Merging never deletes anything. Entries that are no longer extracted stay
//! in the catalog until [`Catalog::mark_obsolete_except`] flags them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    codec::write_catalog,
    config::SiteSetting,
    error::Error,
    types::{Catalog, Extraction, MessageEntry},
};

/// Page values merged at the front of a document catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMetadata<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl<'a> PageMetadata<'a> {
    pub fn new(title: Option<&'a str>, description: Option<&'a str>) -> Self {
        Self { title, description }
    }

    /// Non-empty metadata ids, title first.
    pub fn ids(&self) -> impl Iterator<Item = &'a str> {
        [self.title, self.description]
            .into_iter()
            .flatten()
            .filter(|id| !id.is_empty())
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub revived: usize,
    /// Ids copied in from the compendium.
    pub borrowed: Vec<String>,
}

impl MergeReport {
    pub fn is_unchanged(&self) -> bool {
        self.inserted == 0 && self.revived == 0 && self.borrowed.is_empty()
    }
}

impl Catalog {
    /// Inserts newly extracted messages and revives the ones already present.
    ///
    /// Disabled ids are skipped. Existing entries keep their position and
    /// translation.
    pub fn merge_extracted(&mut self, extraction: &Extraction) -> MergeReport {
        let mut report = MergeReport::default();
        for message in extraction.enabled() {
            match self.find_mut(&message.key()) {
                Some(existing) => {
                    if existing.obsolete {
                        existing.obsolete = false;
                        report.revived += 1;
                    }
                }
                None => {
                    self.entries
                        .push(MessageEntry::new(message.id.clone()).with_context(message.context.clone()));
                    report.inserted += 1;
                }
            }
        }
        report
    }

    /// Merges the page title and description, inserting missing ones at the
    /// start of the catalog with the title first.
    pub fn merge_metadata(&mut self, metadata: &PageMetadata<'_>) -> MergeReport {
        let mut report = MergeReport::default();
        let ids: Vec<&str> = metadata.ids().collect();
        for id in ids.into_iter().rev() {
            match self.find_by_id_mut(id) {
                Some(existing) => {
                    if existing.obsolete {
                        existing.obsolete = false;
                        report.revived += 1;
                    }
                }
                None => {
                    self.entries.insert(0, MessageEntry::new(id));
                    report.inserted += 1;
                }
            }
        }
        report
    }

    /// Copies translated compendium entries whose id the catalog lacks, so a
    /// translator can resolve them from this catalog alone.
    ///
    /// Obsolete entries and site-setting entries stay in the compendium.
    /// Returns the copied ids.
    pub fn copy_from_compendium(&mut self, compendium: &Catalog) -> Vec<String> {
        let mut copied = Vec::new();
        for entry in compendium.iter() {
            if entry.obsolete
                || !entry.is_translated()
                || entry.flags.iter().any(|f| SiteSetting::is_setting_flag(f))
                || self.contains_id(&entry.id)
            {
                continue;
            }
            let mut copy = entry.clone();
            copy.comments.clear();
            copied.push(copy.id.clone());
            self.entries.push(copy);
        }
        copied
    }

    /// Flags every entry whose id was not resolved during translation.
    ///
    /// Entries whose id was resolved are made live again. Returns the number
    /// of entries that became obsolete.
    pub fn mark_obsolete_except(&mut self, resolved: &HashSet<String>) -> usize {
        let mut marked = 0;
        for entry in &mut self.entries {
            let live = resolved.contains(&entry.id);
            if !live && !entry.obsolete {
                marked += 1;
            }
            entry.obsolete = !live;
        }
        marked
    }
}

/// Merges one extraction into `catalog` and saves it.
///
/// See [`merge_with_metadata`].
pub fn merge(
    catalog: &mut Catalog,
    extraction: &Extraction,
    compendium: &Catalog,
) -> Result<MergeReport, Error> {
    merge_with_metadata(catalog, extraction, &PageMetadata::default(), compendium)
}

/// Full per-document merge: extracted messages, then page metadata, then
/// translated compendium entries. The catalog is persisted afterwards (a
/// catalog without a path is left in memory only).
pub fn merge_with_metadata(
    catalog: &mut Catalog,
    extraction: &Extraction,
    metadata: &PageMetadata<'_>,
    compendium: &Catalog,
) -> Result<MergeReport, Error> {
    let mut report = catalog.merge_extracted(extraction);
    let meta = catalog.merge_metadata(metadata);
    report.inserted += meta.inserted;
    report.revived += meta.revived;
    report.borrowed = catalog.copy_from_compendium(compendium);

    write_catalog(catalog)?;
    if let Some(path) = catalog.path.as_deref() {
        debug!(
            "Merged {}: {} new, {} revived, {} from compendium",
            path.display(),
            report.inserted,
            report.revived,
            report.borrowed.len()
        );
    }
    Ok(report)
}
