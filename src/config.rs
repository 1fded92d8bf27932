//! Build configuration.
//!
//! Loaded from TOML and validated before any document is processed; every
//! problem found here is a [`Error::Config`] (or [`Error::InvalidThreshold`]).

use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::{
    error::Error,
    formats::FormatType,
    gate::{GateScope, Threshold, ThresholdSetting},
};

/// Site-level settings that can be translated through the compendium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteSetting {
    SiteName,
    SiteDescription,
}

impl SiteSetting {
    pub const ALL: [SiteSetting; 2] = [SiteSetting::SiteName, SiteSetting::SiteDescription];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteSetting::SiteName => "site_name",
            SiteSetting::SiteDescription => "site_description",
        }
    }

    /// Flag marking compendium entries that translate this setting.
    pub fn flag(&self) -> &'static str {
        match self {
            SiteSetting::SiteName => "mdpo-site_name",
            SiteSetting::SiteDescription => "mdpo-site_description",
        }
    }

    pub fn is_setting_flag(flag: &str) -> bool {
        Self::ALL.iter().any(|s| s.flag() == flag)
    }
}

impl Display for SiteSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `lc_messages` accepts `true`, `false` or a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LcMessages {
    Enabled(bool),
    Directory(String),
}

impl Default for LcMessages {
    fn default() -> Self {
        LcMessages::Enabled(false)
    }
}

impl LcMessages {
    /// Directory inserted below the language directory, empty when disabled.
    pub fn directory(&self) -> &str {
        match self {
            LcMessages::Enabled(true) => "LC_MESSAGES",
            LcMessages::Enabled(false) => "",
            LcMessages::Directory(dir) => dir,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SiteConfig {
    pub fn value(&self, setting: SiteSetting) -> Option<&str> {
        let value = match setting {
            SiteSetting::SiteName => self.name.as_deref(),
            SiteSetting::SiteDescription => self.description.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

fn default_ignore_extensions() -> Vec<String> {
    vec![".po".to_string(), ".pot".to_string(), ".mo".to_string()]
}

fn default_translate() -> Vec<SiteSetting> {
    SiteSetting::ALL.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Every language of the site, the default one included.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Source language; defaults to the first of `languages`.
    #[serde(default)]
    pub default_language: Option<String>,

    /// Catalog root, relative to the docs directory.
    #[serde(default)]
    pub locale_dir: String,

    #[serde(default)]
    pub lc_messages: LcMessages,

    #[serde(default)]
    pub catalog_format: FormatType,

    #[serde(default)]
    pub ignore_msgids: Vec<String>,

    /// Regular expressions; matching messages are never extracted.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Documents (source paths) excluded from translation.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_translate")]
    pub translate: Vec<SiteSetting>,

    /// Raw completion threshold; checked by [`Config::validate`].
    #[serde(default)]
    pub min_translated_messages: Option<ThresholdSetting>,

    #[serde(skip)]
    threshold: Option<Threshold>,

    #[serde(default)]
    pub completion_scope: GateScope,

    #[serde(default)]
    pub markdown_extensions: Vec<String>,

    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,

    #[serde(default)]
    pub site: SiteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            default_language: None,
            locale_dir: String::new(),
            lc_messages: LcMessages::default(),
            catalog_format: FormatType::default(),
            ignore_msgids: Vec::new(),
            ignore_patterns: Vec::new(),
            exclude: Vec::new(),
            translate: default_translate(),
            min_translated_messages: None,
            threshold: None,
            completion_scope: GateScope::default(),
            markdown_extensions: Vec::new(),
            ignore_extensions: default_ignore_extensions(),
            site: SiteConfig::default(),
        }
    }
}

impl Config {
    /// Builds a validated configuration for the given languages.
    pub fn with_languages<I, S>(languages: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Config {
            languages: languages.into_iter().map(Into::into).collect(),
            ..Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Checks every setting and fills in the default language.
    pub fn validate(&mut self) -> Result<(), Error> {
        if self.languages.is_empty() {
            return Err(Error::config_error(
                "You must define the languages you will translate the content into using the 'languages' configuration setting.",
            ));
        }
        for language in &self.languages {
            language.parse::<LanguageIdentifier>().map_err(|_| {
                Error::config_error(format!("invalid language code '{}'", language))
            })?;
        }
        match self.default_language.clone() {
            Some(default) if !self.languages.contains(&default) => {
                return Err(Error::config_error(format!(
                    "default language '{}' is not one of the configured languages",
                    default
                )));
            }
            Some(_) => {}
            None => self.default_language = self.languages.first().cloned(),
        }
        for entry in &self.exclude {
            if entry.trim().is_empty() {
                return Err(Error::config_error("'exclude' entries must not be empty"));
            }
        }
        self.compile_ignore_patterns()?;
        self.threshold = self
            .min_translated_messages
            .as_ref()
            .map(ThresholdSetting::resolve)
            .transpose()?;
        Ok(())
    }

    /// Completion threshold, available once the configuration is validated.
    pub fn threshold(&self) -> Option<Threshold> {
        self.threshold
    }

    pub fn default_language(&self) -> &str {
        self.default_language
            .as_deref()
            .or_else(|| self.languages.first().map(String::as_str))
            .unwrap_or_default()
    }

    /// Languages content is translated into, in configured order.
    pub fn translation_languages(&self) -> Vec<String> {
        let default = self.default_language();
        self.languages
            .iter()
            .filter(|l| l.as_str() != default)
            .cloned()
            .collect()
    }

    pub fn is_excluded(&self, src_path: &str) -> bool {
        self.exclude.iter().any(|e| e == src_path)
    }

    pub fn compile_ignore_patterns(&self) -> Result<Vec<Regex>, Error> {
        self.ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::config_error(format!("invalid ignore pattern '{}': {}", p, e))
                })
            })
            .collect()
    }

    /// `<docs_dir>/<locale_dir>/<language>/<lc_messages>`
    pub fn language_dir(&self, docs_dir: &Path, language: &str) -> PathBuf {
        let mut dir = docs_dir.join(&self.locale_dir).join(language);
        let lc_messages = self.lc_messages.directory();
        if !lc_messages.is_empty() {
            dir = dir.join(lc_messages);
        }
        dir
    }

    /// Catalog path of a document for a language.
    pub fn catalog_path(&self, docs_dir: &Path, language: &str, src_path: &str) -> PathBuf {
        self.language_dir(docs_dir, language).join(format!(
            "{}.{}",
            src_path,
            self.catalog_format.extension()
        ))
    }

    /// Compendium path for a language.
    pub fn compendium_path(&self, docs_dir: &Path, language: &str) -> PathBuf {
        self.language_dir(docs_dir, language)
            .join(format!("_compendium.{}", self.catalog_format.extension()))
    }

    /// True for files the document discovery must skip (catalogs, binaries).
    pub fn is_ignored_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.ignore_extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml_str("languages = [\"en\", \"es\", \"fr\"]").unwrap();

        assert_eq!(config.default_language(), "en");
        assert_eq!(config.translation_languages(), vec!["es", "fr"]);
        assert_eq!(config.translate, SiteSetting::ALL.to_vec());
        assert_eq!(config.min_translated_messages, None);
        assert_eq!(config.threshold(), None);
        assert_eq!(config.catalog_format, FormatType::Po);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            languages = ["en", "es"]
            default_language = "es"
            locale_dir = "locales"
            lc_messages = true
            catalog_format = "json"
            ignore_msgids = ["TODO"]
            ignore_patterns = ["^v\\d+"]
            exclude = ["changelog.md"]
            translate = ["site_name"]
            min_translated_messages = "50%"
            completion_scope = "document"
            markdown_extensions = ["tables"]

            [site]
            name = "My Docs"
        "#;
        let config = Config::from_toml_str(content).unwrap();

        assert_eq!(config.translation_languages(), vec!["en"]);
        assert_eq!(config.threshold(), Some(Threshold::Percent(50.0)));
        assert_eq!(config.completion_scope, GateScope::Document);
        assert_eq!(config.site.value(SiteSetting::SiteName), Some("My Docs"));
        assert_eq!(config.site.value(SiteSetting::SiteDescription), None);
        assert!(config.is_excluded("changelog.md"));
        assert_eq!(
            config.catalog_path(Path::new("docs"), "en", "guide/intro.md"),
            Path::new("docs/locales/en/LC_MESSAGES/guide/intro.md.json")
        );
        assert_eq!(
            config.compendium_path(Path::new("docs"), "en"),
            Path::new("docs/locales/en/LC_MESSAGES/_compendium.json")
        );
    }

    #[test]
    fn test_missing_languages_is_config_error() {
        let err = Config::from_toml_str("locale_dir = \"locales\"").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("languages"));
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        for raw in ["\"abc\"", "-3", "\"-5%\""] {
            let content = format!("languages = [\"en\", \"es\"]\nmin_translated_messages = {}", raw);
            let err = Config::from_toml_str(&content).unwrap_err();
            assert!(matches!(err, Error::InvalidThreshold(_)), "{raw}: {err}");
            assert!(err.is_config());
        }
    }

    #[test]
    fn test_threshold_set_in_code_is_resolved_on_validate() {
        let mut config = Config::with_languages(["en", "es"]).unwrap();
        config.min_translated_messages = Some(Threshold::Messages(3).into());
        assert_eq!(config.threshold(), None);

        config.validate().unwrap();
        assert_eq!(config.threshold(), Some(Threshold::Messages(3)));
    }

    #[test]
    fn test_invalid_exclude_entry_type() {
        let err = Config::from_toml_str("languages = [\"en\"]\nexclude = [1]").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_pattern_and_language() {
        assert!(Config::from_toml_str("languages = [\"en\"]\nignore_patterns = [\"(\"]").is_err());
        assert!(Config::from_toml_str("languages = [\"not a language\"]").is_err());
        assert!(
            Config::from_toml_str("languages = [\"en\"]\ndefault_language = \"de\"").is_err()
        );
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        assert!(Config::from_toml_str("languages = [\"en\"]\ntranslate = [\"site_url\"]").is_err());
        assert!(Config::from_toml_str("languages = [\"en\"]\nlanguage = \"en\"").is_err());
    }

    #[test]
    fn test_lc_messages_forms() {
        assert_eq!(LcMessages::Enabled(true).directory(), "LC_MESSAGES");
        assert_eq!(LcMessages::Enabled(false).directory(), "");
        assert_eq!(LcMessages::Directory("msgs".to_string()).directory(), "msgs");

        let config = Config::with_languages(["en", "es"]).unwrap();
        assert_eq!(
            config.catalog_path(Path::new("docs"), "es", "index.md"),
            Path::new("docs/es/index.md.po")
        );
    }

    #[test]
    fn test_ignored_files() {
        let config = Config::with_languages(["en"]).unwrap();
        assert!(config.is_ignored_file(Path::new("docs/es/index.md.po")));
        assert!(!config.is_ignored_file(Path::new("docs/index.md")));
    }

    #[test]
    fn test_setting_flags() {
        assert_eq!(SiteSetting::SiteName.flag(), "mdpo-site_name");
        assert!(SiteSetting::is_setting_flag("mdpo-site_description"));
        assert!(!SiteSetting::is_setting_flag("fuzzy"));
    }
}
