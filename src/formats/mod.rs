//! All supported catalog file formats for mdpo-sync.
//!
//! This module re-exports the main types for each format and provides
//! the [`FormatType`] enum for generic format handling across the crate.

pub mod json;
pub mod po;

use std::{
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

// Reexporting the formats for easier access
pub use json::Format as JsonFormat;
pub use po::Format as PoFormat;

use crate::Error;

/// Represents all supported catalog file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// gettext PO catalogs.
    #[default]
    Po,
    /// JSON catalogs.
    Json,
}

/// Implements [`std::fmt::Display`] for [`FormatType`].
///
/// ```rust
/// use mdpo_sync::formats::FormatType;
/// assert_eq!(FormatType::Po.to_string(), "po");
/// assert_eq!(FormatType::Json.to_string(), "json");
/// ```
impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Po => write!(f, "po"),
            FormatType::Json => write!(f, "json"),
        }
    }
}

/// Accepts `"po"`, `"pot"` and `"json"`, case-insensitively.
///
/// ```rust
/// use mdpo_sync::formats::FormatType;
/// use std::str::FromStr;
/// assert_eq!(FormatType::from_str("PO").unwrap(), FormatType::Po);
/// assert!(FormatType::from_str("xliff").is_err());
/// ```
impl FromStr for FormatType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "po" | "pot" => Ok(FormatType::Po),
            "json" => Ok(FormatType::Json),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl FormatType {
    /// Returns the file extension catalogs of this format are written with.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Po => "po",
            FormatType::Json => "json",
        }
    }

    /// Infers the format from a catalog path's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("po") | Some("pot") => Ok(FormatType::Po),
            Some("json") => Ok(FormatType::Json),
            extension => Err(Error::UnsupportedFormat(format!(
                "Unsupported catalog extension: {:?}.",
                extension
            ))),
        }
    }
}
