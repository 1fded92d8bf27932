//! Catalog reconciliation for translated Markdown sites.
//!
//! Keeps one gettext-style catalog per (document, language) and one shared
//! compendium per language in sync with the documents' current text, across
//! repeated builds. Messages recurring across documents are promoted to the
//! compendium; messages that disappear are kept as obsolete history.
//!
//! The engine is driven through [`Build`], whose hooks a site generator calls
//! in document discovery order. Extraction and translation go through the
//! [`adapter::Extractor`] and [`adapter::Translator`] traits; the bundled
//! [`ParagraphAdapter`] handles plain Markdown.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod build;
pub mod catalog;
pub mod codec;
pub mod compendium;
pub mod config;
pub mod error;
pub mod formats;
pub mod gate;
pub mod session;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    adapter::{Extractor, IgnoreRules, ParagraphAdapter, Translator},
    build::{Build, BuildReport, Document, DocumentOutput, DocumentVariant, LanguageReport},
    catalog::{MergeReport, PageMetadata, merge, merge_with_metadata},
    codec::{read_catalog, write_catalog},
    compendium::{Compendium, DedupReport, reconcile_compendium},
    config::{Config, SiteSetting},
    error::Error,
    formats::FormatType,
    gate::{CompletionGate, GateScope, Threshold, ThresholdSetting, should_include},
    session::{DocumentTranslation, TranslationSession},
    types::{Catalog, CatalogStats, EntryKey, ExtractedMessage, Extraction, MessageEntry},
};
