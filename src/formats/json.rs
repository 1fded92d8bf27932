//! Support for JSON catalogs.
//!
//! A pretty-printed object holding the optional header and the ordered entry
//! list, terminated by a newline so version control diffs stay quiet.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    traits::Parser,
    types::{Catalog, MessageEntry},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Format {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub header: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub header_comments: Vec<String>,

    #[serde(default)]
    pub entries: Vec<MessageEntry>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        serde_json::from_reader(reader).map_err(Error::Json)
    }

    fn to_writer<W: std::io::Write>(&self, mut writer: W) -> Result<(), Error> {
        serde_json::to_writer_pretty(&mut writer, self).map_err(Error::Json)?;
        writer.write_all(b"\n").map_err(Error::Io)
    }
}

impl From<Format> for Catalog {
    fn from(value: Format) -> Self {
        Catalog {
            header: value.header,
            header_comments: value.header_comments,
            entries: value.entries,
            path: None,
        }
    }
}

impl From<&Catalog> for Format {
    fn from(value: &Catalog) -> Self {
        Format {
            header: value.header.clone(),
            header_comments: value.header_comments.clone(),
            entries: value.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_entries() {
        let content = r#"{"entries": [{"id": "Hello", "translation": "Hola"}, {"id": "Bye"}]}"#;
        let format = Format::from_str(content).unwrap();

        assert_eq!(format.entries.len(), 2);
        assert_eq!(format.entries[0].translation, "Hola");
        assert!(!format.entries[1].obsolete);
        assert!(format.entries[1].flags.is_empty());
    }

    #[test]
    fn test_write_skips_defaults() {
        let format = Format {
            entries: vec![MessageEntry::new("Hello")],
            ..Format::default()
        };
        let written = String::from_utf8(format.to_bytes().unwrap()).unwrap();

        assert!(written.ends_with("}\n"));
        assert!(!written.contains("obsolete"));
        assert!(!written.contains("header"));
        assert!(written.contains("\"translation\": \"\""));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            Format::from_str("{ not json"),
            Err(Error::Json(_))
        ));
    }
}
