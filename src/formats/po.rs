//! Support for gettext PO catalogs.
//!
//! Files are split into entries line by line here, keeping comment lines
//! verbatim and recognising obsolete `#~ ` entries; the `msgctxt`, `msgid`
//! and `msgstr` strings of each entry are decoded by [`polib`]. Plural
//! messages are rejected.
//!
//! Writing is canonical: every string is emitted on a single line, so a
//! catalog that is saved, loaded and saved again is byte-for-byte identical.

use std::{
    fs::File,
    io::{BufRead, Read},
    path::Path,
};

use polib::po_file;

use crate::{
    error::Error,
    traits::{Parser, attach_path},
    types::{Catalog, MessageEntry},
};

/// A PO file: optional header plus ordered entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    /// Translation of the empty msgid, if the file has a header.
    pub header: Option<String>,
    /// Comment and flag lines written above the header entry.
    pub header_comments: Vec<String>,
    pub entries: Vec<MessageEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Context,
    Id,
    Translation,
}

impl Keyword {
    fn as_str(&self) -> &'static str {
        match self {
            Keyword::Context => "msgctxt",
            Keyword::Id => "msgid",
            Keyword::Translation => "msgstr",
        }
    }
}

/// Lines of one entry, as found in the file.
#[derive(Debug, Default)]
struct RawEntry {
    line: usize,
    notes: Vec<String>,
    strings: Vec<(Keyword, Vec<String>)>,
    obsolete: bool,
}

impl RawEntry {
    fn is_blank(&self) -> bool {
        self.notes.is_empty() && self.strings.is_empty()
    }

    fn has(&self, keyword: Keyword) -> bool {
        self.strings.iter().any(|(k, _)| *k == keyword)
    }

    fn literals(&self, keyword: Keyword) -> Option<&[String]> {
        self.strings
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, lines)| lines.as_slice())
    }

    /// `msgid ""` followed directly by `msgstr`, outside any context.
    fn is_header(&self) -> bool {
        !self.obsolete
            && !self.has(Keyword::Context)
            && matches!(self.literals(Keyword::Id), Some([only]) if only == "\"\"")
    }
}

/// Rebuilds the keyword lines of an entry as a standalone PO fragment.
fn snippet(strings: &[(Keyword, Vec<String>)]) -> String {
    let mut snippet = String::new();
    for (keyword, lines) in strings {
        snippet.push_str(keyword.as_str());
        for (index, literal) in lines.iter().enumerate() {
            snippet.push(if index == 0 { ' ' } else { '\n' });
            snippet.push_str(literal);
        }
        snippet.push('\n');
    }
    snippet
}

/// Decoded strings of one entry.
struct Decoded {
    context: String,
    id: String,
    translation: String,
}

fn decode(snippet: &str, line: usize) -> Result<Decoded, Error> {
    let catalog = po_file::parse_from_reader(snippet.as_bytes())
        .map_err(|e| parse_error(line, e.to_string()))?;
    let Some(message) = catalog.messages().next() else {
        return Err(parse_error(line, "entry without msgid"));
    };
    let translation = message
        .msgstr()
        .map_err(|_| parse_error(line, "plural messages are not supported"))?;
    Ok(Decoded {
        context: message.msgctxt().unwrap_or_default().to_string(),
        id: message.msgid().to_string(),
        translation: translation.to_string(),
    })
}

impl Format {
    fn finish(&mut self, raw: RawEntry) -> Result<(), Error> {
        if raw.is_blank() {
            return Ok(());
        }
        let line = raw.line;
        if !raw.has(Keyword::Id) {
            return Err(parse_error(line, "entry without msgid"));
        }
        if !raw.has(Keyword::Translation) {
            return Err(parse_error(line, "entry without msgstr"));
        }

        if raw.is_header() {
            if self.header.is_some() || !self.entries.is_empty() {
                return Err(parse_error(line, "header entry must come first"));
            }
            // polib reads the empty msgid as metadata, so decode under a stand-in id
            let strings: Vec<_> = raw
                .strings
                .iter()
                .map(|(keyword, lines)| match keyword {
                    Keyword::Id => (Keyword::Id, vec!["\"header\"".to_string()]),
                    _ => (*keyword, lines.clone()),
                })
                .collect();
            let decoded = decode(&snippet(&strings), line)?;
            self.header = Some(decoded.translation);
            self.header_comments = raw.notes;
            return Ok(());
        }

        let decoded = decode(&snippet(&raw.strings), line)?;
        if decoded.id.is_empty() {
            return Err(parse_error(line, "empty msgid"));
        }

        let (flag_lines, comments): (Vec<String>, Vec<String>) =
            raw.notes.clone().into_iter().partition(|note| note.starts_with("#,"));
        let flags = flag_lines
            .iter()
            .flat_map(|note| note["#,".len()..].split(','))
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        self.entries.push(MessageEntry {
            id: decoded.id,
            translation: decoded.translation,
            context: raw.has(Keyword::Context).then_some(decoded.context),
            obsolete: raw.obsolete,
            flags,
            comments,
        });
        Ok(())
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::parse_error(Path::new(""), line, message)
}

fn is_literal(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('"') && text.ends_with('"')
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut format = Format::default();
        let mut pending = RawEntry::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let number = index + 1;
            let trimmed = line.trim_start_matches('\u{feff}').trim();

            if trimmed.is_empty() {
                format.finish(std::mem::take(&mut pending))?;
                continue;
            }

            let (body, obsolete) = match trimmed.strip_prefix("#~") {
                Some(rest) => (rest.trim_start(), true),
                None => (trimmed, false),
            };

            if !obsolete && body.starts_with('#') {
                // a comment after the strings starts the next entry
                if pending.has(Keyword::Translation) {
                    format.finish(std::mem::take(&mut pending))?;
                }
                if pending.is_blank() {
                    pending.line = number;
                }
                pending.notes.push(body.to_string());
                continue;
            }

            if body.starts_with('"') {
                if !is_literal(body) {
                    return Err(parse_error(number, "unterminated string"));
                }
                let Some((_, lines)) = pending.strings.last_mut() else {
                    return Err(parse_error(number, "continuation line without keyword"));
                };
                lines.push(body.to_string());
                continue;
            }

            let (name, rest) = match body.find(char::is_whitespace) {
                Some(split) => (&body[..split], body[split..].trim_start()),
                None => (body, ""),
            };
            let keyword = match name {
                "msgctxt" => Keyword::Context,
                "msgid" => Keyword::Id,
                "msgstr" => Keyword::Translation,
                "msgid_plural" => {
                    return Err(parse_error(number, "plural messages are not supported"));
                }
                k if k.starts_with("msgstr[") => {
                    return Err(parse_error(number, "plural messages are not supported"));
                }
                other => {
                    return Err(parse_error(number, format!("unexpected keyword `{}`", other)));
                }
            };

            // msgctxt or msgid after a complete entry starts the next one
            if keyword != Keyword::Translation && pending.has(Keyword::Translation) {
                format.finish(std::mem::take(&mut pending))?;
            }
            if pending.is_blank() {
                pending.line = number;
            }
            if pending.has(keyword) {
                return Err(parse_error(number, format!("duplicate `{}`", name)));
            }
            if keyword == Keyword::Translation && !pending.has(Keyword::Id) {
                return Err(parse_error(number, "msgstr before msgid"));
            }
            if !is_literal(rest) {
                return Err(parse_error(
                    number,
                    format!("expected quoted string after `{}`", name),
                ));
            }

            pending.strings.push((keyword, vec![rest.to_string()]));
            pending.obsolete = obsolete;
        }

        format.finish(pending)?;
        Ok(format)
    }

    fn to_writer<W: std::io::Write>(&self, mut writer: W) -> Result<(), Error> {
        let mut blocks = Vec::with_capacity(self.entries.len() + 1);

        if let Some(header) = &self.header {
            let mut block = String::new();
            for comment in &self.header_comments {
                block.push_str(comment);
                block.push('\n');
            }
            block.push_str(&format!("msgid \"\"\nmsgstr \"{}\"\n", escape(header)));
            blocks.push(block);
        }

        for entry in &self.entries {
            let mut block = String::new();
            for comment in &entry.comments {
                block.push_str(comment);
                block.push('\n');
            }
            if !entry.flags.is_empty() {
                block.push_str("#, ");
                block.push_str(&entry.flags.join(", "));
                block.push('\n');
            }
            let prefix = if entry.obsolete { "#~ " } else { "" };
            if let Some(context) = &entry.context {
                block.push_str(&format!("{}msgctxt \"{}\"\n", prefix, escape(context)));
            }
            block.push_str(&format!("{}msgid \"{}\"\n", prefix, escape(&entry.id)));
            block.push_str(&format!(
                "{}msgstr \"{}\"\n",
                prefix,
                escape(&entry.translation)
            ));
            blocks.push(block);
        }

        writer
            .write_all(blocks.join("\n").as_bytes())
            .map_err(Error::Io)
    }

    /// BOM-aware reading so catalogs saved by UTF-16 editors still load.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::Io)?;
        let mut decoder = encoding_rs_io::DecodeReaderBytesBuilder::new()
            .bom_override(true)
            .build(file);

        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).map_err(Error::Io)?;

        Self::from_str(&decoded).map_err(|e| attach_path(e, path))
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

/// Escapes a string for a double-quoted PO literal.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
