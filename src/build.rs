//! Build orchestration.
//!
//! [`Build`] is the explicit context of one site build. The host pipeline
//! creates it, calls its hooks in document discovery order, and finally
//! consumes it with [`Build::on_build_finished`] or
//! [`Build::on_build_failed`]. Only one build, and therefore one translation
//! session, is ever active.
//!
//! ```rust,no_run
//! use mdpo_sync::{Build, Config, Document};
//!
//! let config = Config::load("mdpo-sync.toml")?;
//! let mut build = Build::new(config, "docs")?;
//! build.on_document_discovered("index.md");
//! let output = build.on_document_content_ready(&Document::new("index.md", "# Hello\n"))?;
//! for variant in &output.variants {
//!     println!("{} -> {}", variant.language, variant.temp_path.display());
//! }
//! let report = build.on_build_finished()?;
//! # Ok::<(), mdpo_sync::Error>(())
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    adapter::{Extractor, IgnoreRules, ParagraphAdapter, Translator, remove_mdpo_commands_preserving_escaped},
    catalog::{PageMetadata, merge_with_metadata},
    codec::{read_catalog_or_new, write_catalog},
    compendium::{Compendium, DedupReport, reconcile_compendium},
    config::{Config, SiteSetting},
    error::Error,
    gate::{self, CompletionGate, GateScope},
    session::{DocumentTranslation, TranslationSession},
    types::{CatalogStats, Extraction},
};

/// A source document handed over by the host pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the docs directory, e.g. `guide/intro.md`.
    pub src_path: String,
    pub content: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Document {
    pub fn new(src_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            src_path: src_path.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One translated version of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentVariant {
    pub language: String,
    pub src_path: String,
    pub content: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Where the translated source was written inside the build's temp dir.
    pub temp_path: PathBuf,
    /// `None` when the document is excluded from translation.
    pub catalog_path: Option<PathBuf>,
    pub stats: CatalogStats,
    /// False when the completion gate excluded this variant.
    pub emitted: bool,
}

/// Result of processing a document's content.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutput {
    /// Default-language content, mdpo commands removed.
    pub content: String,
    pub variants: Vec<DocumentVariant>,
}

impl DocumentOutput {
    pub fn variant(&self, language: &str) -> Option<&DocumentVariant> {
        self.variants.iter().find(|v| v.language == language)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageReport {
    pub language: String,
    pub stats: CatalogStats,
    pub completion: f64,
    pub excluded: bool,
    pub documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupReport>,
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub languages: Vec<LanguageReport>,
}

impl BuildReport {
    pub fn language(&self, language: &str) -> Option<&LanguageReport> {
        self.languages.iter().find(|l| l.language == language)
    }
}

#[derive(Debug)]
struct LanguageState {
    language: String,
    compendium: Option<Compendium>,
    documents: Vec<DocumentTranslation>,
    stats: CatalogStats,
    site: HashMap<SiteSetting, String>,
}

impl LanguageState {
    fn new(language: String) -> Self {
        Self {
            language,
            compendium: None,
            documents: Vec::new(),
            stats: CatalogStats::default(),
            site: HashMap::new(),
        }
    }
}

/// The state of one site build.
#[derive(Debug)]
pub struct Build<A = ParagraphAdapter> {
    config: Config,
    docs_dir: PathBuf,
    adapter: A,
    ignore: IgnoreRules,
    gate: CompletionGate,
    temp_dir: TempDir,
    languages: Vec<LanguageState>,
    variant_paths: HashMap<String, BTreeMap<String, PathBuf>>,
}

impl Build<ParagraphAdapter> {
    /// Starts a build with the bundled Markdown adapter.
    pub fn new<P: AsRef<Path>>(config: Config, docs_dir: P) -> Result<Self, Error> {
        let adapter = ParagraphAdapter::from_config(&config);
        Self::with_adapter(config, docs_dir, adapter)
    }
}

impl<A> Build<A>
where
    A: Extractor + Translator,
{
    /// Validates the configuration and prepares the locale directories.
    pub fn with_adapter<P: AsRef<Path>>(
        mut config: Config,
        docs_dir: P,
        adapter: A,
    ) -> Result<Self, Error> {
        config.validate()?;
        let docs_dir = docs_dir.as_ref().to_path_buf();
        let ignore = IgnoreRules::from_config(&config)?;
        let temp_dir = tempfile::Builder::new().prefix("mdpo-sync-").tempdir()?;

        let mut languages = Vec::new();
        for language in config.translation_languages() {
            fs::create_dir_all(config.language_dir(&docs_dir, &language))?;
            languages.push(LanguageState::new(language));
        }
        debug!(
            "Build started in {} for {} language(s)",
            docs_dir.display(),
            languages.len()
        );

        Ok(Self {
            gate: CompletionGate::new(config.threshold()),
            config,
            docs_dir,
            adapter,
            ignore,
            temp_dir,
            languages,
            variant_paths: HashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Directory holding the generated document variants.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Languages still emitted, in configured order.
    pub fn active_languages(&self) -> Vec<&str> {
        self.languages
            .iter()
            .map(|s| s.language.as_str())
            .filter(|l| !self.gate.is_excluded(l))
            .collect()
    }

    /// Reserves a variant path for every translation language.
    pub fn on_document_discovered(&mut self, src_path: &str) -> BTreeMap<String, PathBuf> {
        let paths: BTreeMap<String, PathBuf> = self
            .languages
            .iter()
            .map(|state| {
                let path = self.temp_dir.path().join(&state.language).join(src_path);
                (state.language.clone(), path)
            })
            .collect();
        self.variant_paths
            .insert(src_path.to_string(), paths.clone());
        paths
    }

    fn variant_path(&self, src_path: &str, language: &str) -> PathBuf {
        self.variant_paths
            .get(src_path)
            .and_then(|paths| paths.get(language))
            .cloned()
            .unwrap_or_else(|| self.temp_dir.path().join(language).join(src_path))
    }

    /// Runs merge, translation and the completion gate for every language
    /// of a document.
    ///
    /// A language excluded by the gate keeps its catalogs merged so the
    /// end-of-build deduplication still sees every document; its variants
    /// are returned with `emitted` unset.
    pub fn on_document_content_ready(&mut self, document: &Document) -> Result<DocumentOutput, Error> {
        let excluded = self.config.is_excluded(&document.src_path);
        let content = remove_mdpo_commands_preserving_escaped(&document.content);
        let extraction = if excluded {
            None
        } else {
            Some(self.adapter.extract(&document.content, &self.ignore))
        };

        let mut variants = Vec::new();
        for index in 0..self.languages.len() {
            let language = self.languages[index].language.clone();
            let (translation, variant_content, title, description) = match &extraction {
                None => (
                    DocumentTranslation::excluded(document.src_path.clone()),
                    content.clone(),
                    document.title.clone(),
                    document.description.clone(),
                ),
                Some(extraction) => {
                    self.translate_document(index, document, extraction)?
                }
            };

            let doc_stats = translation.catalog.stats();
            let catalog_path = translation.catalog.path.clone();
            let state = &mut self.languages[index];
            state.stats += doc_stats;
            state.documents.push(translation);

            let emitted = match self.config.completion_scope {
                GateScope::Language => self.gate.check(&language, state.stats).include,
                GateScope::Document => {
                    let decision = gate::evaluate(&language, doc_stats, self.gate.threshold());
                    for message in decision.diagnostics.iter().filter(|m| m.starts_with("Excluding")) {
                        info!("{} ({})", message, document.src_path);
                    }
                    decision.include
                }
            };

            let temp_path = self.variant_path(&document.src_path, &language);
            if let Some(parent) = temp_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&temp_path, &variant_content)?;

            variants.push(DocumentVariant {
                language,
                src_path: document.src_path.clone(),
                content: variant_content,
                title,
                description,
                temp_path,
                catalog_path,
                stats: doc_stats,
                emitted,
            });
        }

        Ok(DocumentOutput { content, variants })
    }

    fn translate_document(
        &mut self,
        index: usize,
        document: &Document,
        extraction: &Extraction,
    ) -> Result<(DocumentTranslation, String, Option<String>, Option<String>), Error> {
        let state = &mut self.languages[index];
        let language = state.language.clone();
        let compendium = ensure_compendium(state, &self.config, &self.docs_dir)?;
        let site = compendium.merge_site_settings(&self.config);
        compendium.save()?;

        let path = self
            .config
            .catalog_path(&self.docs_dir, &language, &document.src_path);
        let mut catalog = read_catalog_or_new(&path)?;
        let metadata = PageMetadata::new(document.title.as_deref(), document.description.as_deref());
        let report = merge_with_metadata(&mut catalog, extraction, &metadata, compendium.catalog())?;

        let mut session =
            TranslationSession::begin(&document.src_path, &language, catalog, compendium);
        let title = document
            .title
            .as_deref()
            .map(|t| session.resolve_id(t).unwrap_or_else(|| t.to_string()));
        let description = document
            .description
            .as_deref()
            .map(|d| session.resolve_id(d).unwrap_or_else(|| d.to_string()));
        let content = self
            .adapter
            .translate(&document.content, &self.ignore, &mut session);

        let mut translation = session.finish();
        translation.borrowed = report.borrowed.into_iter().collect();
        state.site = site;
        Ok((translation, content, title, description))
    }

    /// Post-processes a rendered page. Returns `None` when the variant must
    /// not be written, otherwise the page with the site name translated.
    pub fn on_document_rendered(&self, variant: &DocumentVariant, output: &str) -> Option<String> {
        if !variant.emitted {
            return None;
        }
        let translated = self
            .languages
            .iter()
            .find(|s| s.language == variant.language)
            .and_then(|s| s.site.get(&SiteSetting::SiteName));
        match (self.config.site.value(SiteSetting::SiteName), translated) {
            (Some(name), Some(translated)) => Some(output.replace(
                &format!("{}</title>", name),
                &format!("{}</title>", translated),
            )),
            _ => Some(output.to_string()),
        }
    }

    /// Translated site description for a language, if any.
    pub fn site_translation(&self, language: &str, setting: SiteSetting) -> Option<&str> {
        self.languages
            .iter()
            .find(|s| s.language == language)
            .and_then(|s| s.site.get(&setting))
            .map(String::as_str)
    }

    /// Translates a navigation section title through the compendium.
    ///
    /// The title is kept live in the compendium even for a language the gate
    /// excluded, but no translation is returned for it.
    pub fn translate_nav_title(&mut self, language: &str, title: &str) -> Result<Option<String>, Error> {
        let Some(index) = self.languages.iter().position(|s| s.language == language) else {
            return Ok(None);
        };
        if title.is_empty() {
            return Ok(None);
        }
        let state = &mut self.languages[index];
        let compendium = ensure_compendium(state, &self.config, &self.docs_dir)?;
        let translation = compendium.resolve_shared(title);
        compendium.save()?;
        if self.gate.is_excluded(language) {
            return Ok(None);
        }
        Ok(translation)
    }

    /// Deduplicates every language, marks obsolete entries and releases the
    /// temporary directory.
    pub fn on_build_finished(self) -> Result<BuildReport, Error> {
        let Build {
            gate,
            languages,
            temp_dir,
            ..
        } = self;

        let mut report = BuildReport::default();
        for mut state in languages {
            let dedup = match state.compendium.as_mut() {
                Some(compendium) => Some(finish_language(compendium, &mut state.documents)?),
                None => None,
            };
            let excluded = gate.is_excluded(&state.language);
            if excluded {
                info!(
                    "Language \"{}\" was excluded: {} of {} messages translated",
                    state.language, state.stats.translated, state.stats.total
                );
            }
            report.languages.push(LanguageReport {
                completion: state.stats.percent(),
                language: state.language,
                stats: state.stats,
                excluded,
                documents: state.documents.len(),
                dedup,
            });
        }

        temp_dir.close()?;
        Ok(report)
    }

    /// Releases the temporary directory after an aborted build.
    pub fn on_build_failed(self) {
        let path = self.temp_dir.path().to_path_buf();
        if let Err(e) = self.temp_dir.close() {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        info!("Build failed, temporary files removed");
    }
}

/// Loads the compendium of a language on first use.
fn ensure_compendium<'s>(
    state: &'s mut LanguageState,
    config: &Config,
    docs_dir: &Path,
) -> Result<&'s mut Compendium, Error> {
    let compendium = match state.compendium.take() {
        Some(compendium) => compendium,
        None => {
            let path = config.compendium_path(docs_dir, &state.language);
            Compendium::load_or_create(&state.language, path)?
        }
    };
    Ok(state.compendium.insert(compendium))
}

/// End-of-build passes for one language: drop unused compendium copies,
/// deduplicate, then flag whatever the translator did not consume.
fn finish_language(
    compendium: &mut Compendium,
    documents: &mut [DocumentTranslation],
) -> Result<DedupReport, Error> {
    // stale entries must not count as repeated
    for document in documents.iter_mut().filter(|d| !d.is_excluded()) {
        document.drop_unused_borrowed();
        document.mark_obsolete();
    }

    let mut catalogs: Vec<_> = documents
        .iter_mut()
        .map(|d| std::mem::take(&mut d.catalog))
        .collect();
    let result = reconcile_compendium(compendium, &mut catalogs);
    for (document, catalog) in documents.iter_mut().zip(catalogs) {
        document.catalog = catalog;
    }
    let report = result?;

    for document in documents.iter_mut().filter(|d| !d.is_excluded()) {
        let skipped = document
            .catalog
            .path
            .as_ref()
            .is_some_and(|p| report.skipped.contains(p));
        if skipped {
            continue;
        }
        document.mark_obsolete();
        write_catalog(&document.catalog)?;
    }
    Ok(report)
}
