//! Extraction and translation adapters.
//!
//! [`Extractor`] and [`Translator`] are the seams between the reconciliation
//! engine and a Markdown processor. [`ParagraphAdapter`] is the bundled,
//! line-oriented implementation: blocks are split at blank lines, fenced code
//! is left alone, and lines claimed by a feature handler (headings, list
//! items, tables...) are split into markup and translatable text.
//!
//! mdpo HTML comment commands are honoured and stripped from the output:
//!
//! - `<!-- mdpo-disable-next-line -->` / `<!-- mdpo-enable-next-line -->`
//! - `<!-- mdpo-disable -->` ... `<!-- mdpo-enable -->`
//! - `<!-- mdpo-context NAME -->`
//!
//! A command escaped with a backslash is kept in the output, unescaped.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::Error,
    session::TranslationSession,
    types::{ExtractedMessage, Extraction},
};

lazy_static! {
    static ref COMMAND_LINE: Regex =
        Regex::new(r"^\s*(\\)?<!--\s*mdpo-([a-z-]+)(?:\s+(.*?))?\s*-->\s*$").unwrap();
    static ref COMMAND_AT_LINE_START: Regex =
        Regex::new(r"(?m)^[ \t]*<!--\s*mdpo-[a-z-]+(?:\s+[^\n]*?)?\s*-->[ \t]*(?:\n|$)").unwrap();
    static ref ESCAPED_COMMAND: Regex = Regex::new(r"\\(<!--\s*mdpo-)").unwrap();
    static ref FENCE: Regex = Regex::new(r"^\s*(`{3,}|~{3,})").unwrap();
    static ref HEADING: Regex = Regex::new(r"^( {0,3}#{1,6}[ \t]+)(.*?)((?:[ \t]+#+)?[ \t]*)$").unwrap();
    static ref TASK_ITEM: Regex = Regex::new(r"^(\s*[-*+][ \t]+\[[ xX]\][ \t]+)(.*)$").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"^(\s*(?:[-*+]|\d{1,9}[.)])[ \t]+)(.*)$").unwrap();
    static ref BLOCKQUOTE: Regex = Regex::new(r"^(\s*(?:>[ \t]?)+)(.*)$").unwrap();
    static ref DEFINITION: Regex = Regex::new(r"^(:[ \t]+)(.*)$").unwrap();
    static ref TABLE_ROW: Regex = Regex::new(r"^\s*\|.*\|\s*$").unwrap();
    static ref TABLE_SEPARATOR: Regex = Regex::new(r"^\s*\|?(?:\s*:?-+:?\s*\|)+\s*(?::?-+:?\s*)?$").unwrap();
    static ref SNIPPET: Regex = Regex::new(r"^\s*-+8<-+").unwrap();
    static ref ADMONITION: Regex = Regex::new(r#"^(\s*!!!\s+[\w-]+(?:\s+[\w-]+)*\s+")(.*)("\s*)$"#).unwrap();
    static ref DETAILS: Regex = Regex::new(r#"^(\s*\?\?\?\+?\s+[\w-]+(?:\s+[\w-]+)*\s+")(.*)("\s*)$"#).unwrap();
    static ref TABBED: Regex = Regex::new(r#"^(\s*===!?\+?\s+")(.*)("\s*)$"#).unwrap();
}

/// Produces the candidate messages of a document.
pub trait Extractor {
    /// Must be deterministic for identical text and ignore rules.
    fn extract(&self, text: &str, ignore: &IgnoreRules) -> Extraction;
}

/// Substitutes translations back into a document.
///
/// Every message looked up goes through [`TranslationSession::resolve`], so
/// the session knows which messages were consumed.
pub trait Translator {
    fn translate(
        &self,
        text: &str,
        ignore: &IgnoreRules,
        session: &mut TranslationSession<'_>,
    ) -> String;
}

/// Messages never extracted nor translated.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    ids: HashSet<String>,
    patterns: Vec<Regex>,
}

impl IgnoreRules {
    pub fn new<I, S>(ids: I, patterns: Vec<Regex>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            patterns,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self::new(
            config.ignore_msgids.iter().cloned(),
            config.compile_ignore_patterns()?,
        ))
    }

    pub fn is_ignored(&self, id: &str) -> bool {
        self.ids.contains(id) || self.patterns.iter().any(|p| p.is_match(id))
    }
}

/// Optional syntax a [`ParagraphAdapter`] understands. Handlers run in this
/// order; the first one claiming a line wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Snippets,
    Admonitions,
    Details,
    Tabbed,
    Headings,
    Tables,
    TaskLists,
    ListItems,
    DefinitionLists,
    Blockquotes,
}

impl Feature {
    /// Features enabled by a Markdown extension name.
    pub fn from_extension(name: &str) -> &'static [Feature] {
        match name {
            "tables" | "markdown.extensions.tables" => &[Feature::Tables],
            "tasklist" | "pymdownx.tasklist" => &[Feature::TaskLists],
            "admonition" | "markdown.extensions.admonition" => &[Feature::Admonitions],
            "def_list" | "markdown.extensions.def_list" => &[Feature::DefinitionLists],
            "pymdownx.details" => &[Feature::Details],
            "pymdownx.tabbed" => &[Feature::Tabbed],
            "pymdownx.snippets" => &[Feature::Snippets],
            "extra" | "markdown.extensions.extra" => &[Feature::Tables, Feature::DefinitionLists],
            _ => &[],
        }
    }

    pub fn handler(&self) -> LineHandler {
        match self {
            Feature::Snippets => snippet_line,
            Feature::Admonitions => |line| titled_block(line, "!!!", &ADMONITION),
            Feature::Details => |line| titled_block(line, "???", &DETAILS),
            Feature::Tabbed => |line| titled_block(line, "===", &TABBED),
            Feature::Headings => |line| prefixed(line, &HEADING),
            Feature::Tables => table_row,
            Feature::TaskLists => |line| prefixed(line, &TASK_ITEM),
            Feature::ListItems => |line| prefixed(line, &LIST_ITEM),
            Feature::DefinitionLists => |line| prefixed(line, &DEFINITION),
            Feature::Blockquotes => |line| prefixed(line, &BLOCKQUOTE),
        }
    }
}

/// A piece of a claimed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Markup(String),
    Text(String),
}

/// Splits a line into segments, or returns `None` when the line is not of
/// the handler's kind.
pub type LineHandler = fn(&str) -> Option<Vec<Segment>>;

fn prefixed(line: &str, pattern: &Regex) -> Option<Vec<Segment>> {
    let captures = pattern.captures(line)?;
    let mut segments = Vec::with_capacity(3);
    for (index, group) in captures.iter().enumerate().skip(1) {
        let Some(group) = group else { continue };
        if group.as_str().is_empty() {
            continue;
        }
        // the second group carries the text
        if index == 2 {
            segments.push(Segment::Text(group.as_str().to_string()));
        } else {
            segments.push(Segment::Markup(group.as_str().to_string()));
        }
    }
    Some(segments)
}

fn snippet_line(line: &str) -> Option<Vec<Segment>> {
    SNIPPET
        .is_match(line)
        .then(|| vec![Segment::Markup(line.to_string())])
}

fn titled_block(line: &str, marker: &str, titled: &Regex) -> Option<Vec<Segment>> {
    if !line.trim_start().starts_with(marker) {
        return None;
    }
    prefixed(line, titled).or_else(|| Some(vec![Segment::Markup(line.to_string())]))
}

fn table_row(line: &str) -> Option<Vec<Segment>> {
    if !TABLE_ROW.is_match(line) {
        return None;
    }
    if TABLE_SEPARATOR.is_match(line) {
        return Some(vec![Segment::Markup(line.to_string())]);
    }

    let mut segments = Vec::new();
    let mut cell = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                cell.push(c);
                if let Some(next) = chars.next() {
                    cell.push(next);
                }
            }
            '|' => {
                push_cell(&mut segments, &cell);
                cell.clear();
                segments.push(Segment::Markup("|".to_string()));
            }
            _ => cell.push(c),
        }
    }
    push_cell(&mut segments, &cell);
    Some(segments)
}

fn push_cell(segments: &mut Vec<Segment>, cell: &str) {
    let text = cell.trim();
    if text.is_empty() {
        if !cell.is_empty() {
            segments.push(Segment::Markup(cell.to_string()));
        }
        return;
    }
    let start = cell.len() - cell.trim_start().len();
    let end = start + text.len();
    if start > 0 {
        segments.push(Segment::Markup(cell[..start].to_string()));
    }
    segments.push(Segment::Text(text.to_string()));
    if end < cell.len() {
        segments.push(Segment::Markup(cell[end..].to_string()));
    }
}

/// Removes mdpo command lines, keeping escaped commands without their
/// backslash.
pub fn remove_mdpo_commands_preserving_escaped(text: &str) -> String {
    // the backslash keeps escaped commands from matching at a line start
    let stripped = COMMAND_AT_LINE_START.replace_all(text, "");
    ESCAPED_COMMAND.replace_all(&stripped, "$1").into_owned()
}

/// Line-oriented Markdown adapter driven by a capability table.
#[derive(Debug, Clone)]
pub struct ParagraphAdapter {
    handlers: BTreeMap<Feature, LineHandler>,
}

impl Default for ParagraphAdapter {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl ParagraphAdapter {
    /// Headings, list items and blockquotes are always handled; other
    /// features are selected by Markdown extension names.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut features: BTreeSet<Feature> =
            [Feature::Headings, Feature::ListItems, Feature::Blockquotes].into();
        for extension in extensions {
            features.extend(Feature::from_extension(extension.as_ref()));
        }
        Self {
            handlers: features.into_iter().map(|f| (f, f.handler())).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.markdown_extensions)
    }

    /// Registers a handler, replacing the one of the same feature.
    pub fn with_handler(mut self, feature: Feature, handler: LineHandler) -> Self {
        self.handlers.insert(feature, handler);
        self
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.handlers.keys().copied()
    }

    /// Walks `text`, asking `on_message` for the translation of every enabled
    /// message. Returns the rewritten text and what was extracted.
    pub fn process<F>(&self, text: &str, ignore: &IgnoreRules, on_message: F) -> (String, Extraction)
    where
        F: FnMut(&ExtractedMessage) -> Option<String>,
    {
        let mut walker = Walker {
            handlers: &self.handlers,
            ignore,
            on_message,
            extraction: Extraction::default(),
            output: Vec::new(),
            paragraph: Vec::new(),
            fence: None,
            disabled_span: false,
            disable_next: false,
            enable_next: false,
            context_next: None,
        };
        for line in text.split('\n') {
            walker.line(line);
        }
        walker.flush_paragraph();
        (walker.output.join("\n"), walker.extraction)
    }
}

impl Extractor for ParagraphAdapter {
    fn extract(&self, text: &str, ignore: &IgnoreRules) -> Extraction {
        self.process(text, ignore, |_| None).1
    }
}

impl Translator for ParagraphAdapter {
    fn translate(
        &self,
        text: &str,
        ignore: &IgnoreRules,
        session: &mut TranslationSession<'_>,
    ) -> String {
        // an id disabled anywhere in the document is left alone everywhere,
        // matching what the catalog merge skipped
        session.disable(self.extract(text, ignore).disabled);
        let (output, _) = self.process(text, ignore, |message| session.resolve(&message.key()));
        output
    }
}

struct Walker<'a, F> {
    handlers: &'a BTreeMap<Feature, LineHandler>,
    ignore: &'a IgnoreRules,
    on_message: F,
    extraction: Extraction,
    output: Vec<String>,
    paragraph: Vec<String>,
    fence: Option<String>,
    disabled_span: bool,
    disable_next: bool,
    enable_next: bool,
    context_next: Option<String>,
}

impl<F> Walker<'_, F>
where
    F: FnMut(&ExtractedMessage) -> Option<String>,
{
    fn line(&mut self, line: &str) {
        if let Some(marker) = &self.fence {
            let trimmed = line.trim();
            if trimmed.starts_with(marker.as_str())
                && trimmed.chars().all(|c| Some(c) == marker.chars().next())
            {
                self.fence = None;
            }
            self.output.push(line.to_string());
            return;
        }
        if let Some(captures) = FENCE.captures(line) {
            self.flush_paragraph();
            self.fence = Some(captures[1].to_string());
            self.output.push(line.to_string());
            return;
        }
        if let Some(captures) = COMMAND_LINE.captures(line) {
            self.flush_paragraph();
            if captures.get(1).is_some() {
                self.output.push(line.replacen("\\<!--", "<!--", 1));
            } else {
                let argument = captures.get(3).map(|m| m.as_str().trim().to_string());
                self.command(&captures[2], argument);
            }
            return;
        }
        if line.trim().is_empty() {
            self.flush_paragraph();
            self.output.push(line.to_string());
            return;
        }

        let claimed = self.handlers.values().find_map(|handler| handler(line));
        match claimed {
            Some(segments) => {
                self.flush_paragraph();
                let mut rebuilt = String::with_capacity(line.len());
                for segment in segments {
                    match segment {
                        Segment::Markup(markup) => rebuilt.push_str(&markup),
                        Segment::Text(text) => {
                            let translated = self.message(&text);
                            rebuilt.push_str(translated.as_deref().unwrap_or(&text));
                        }
                    }
                }
                self.output.push(rebuilt);
            }
            None => self.paragraph.push(line.to_string()),
        }
    }

    fn command(&mut self, name: &str, argument: Option<String>) {
        match name {
            "disable-next-line" => self.disable_next = true,
            "enable-next-line" => self.enable_next = true,
            "disable" => self.disabled_span = true,
            "enable" => self.disabled_span = false,
            "context" => self.context_next = argument.filter(|a| !a.is_empty()),
            // unknown commands are stripped without effect
            _ => {}
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.paragraph);
        let id = lines
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" ");
        match self.message(&id) {
            Some(translation) => {
                let indent_len = lines[0].len() - lines[0].trim_start().len();
                self.output
                    .push(format!("{}{}", &lines[0][..indent_len], translation));
            }
            None => self.output.extend(lines),
        }
    }

    fn message(&mut self, id: &str) -> Option<String> {
        let context = self.context_next.take();
        let disable_next = std::mem::take(&mut self.disable_next);
        let enable_next = std::mem::take(&mut self.enable_next);
        if id.is_empty() {
            return None;
        }
        let disabled = (self.disabled_span && !enable_next) || disable_next;
        if disabled || self.ignore.is_ignored(id) {
            self.extraction.disabled.insert(id.to_string());
            return None;
        }
        let message = ExtractedMessage::new(id).with_context(context);
        let translation = (self.on_message)(&message);
        self.extraction.messages.push(message);
        translation.filter(|t| !t.is_empty())
    }
}
