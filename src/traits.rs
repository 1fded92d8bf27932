//! Traits for format-agnostic catalog parsing and serialization.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Cursor, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::error::Error;

/// A trait for parsing and writing one catalog file.
///
/// Writes go through a temporary file in the destination directory which is
/// then renamed over the target, so a catalog on disk is always complete even
/// when a build is abandoned half way.
///
/// # Example
///
/// ```rust,no_run
/// use mdpo_sync::traits::Parser;
/// let format = mdpo_sync::formats::po::Format::read_from("locales/es/index.md.po")?;
/// format.write_to("locales/es/index-copy.md.po")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from any reader.
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::Io)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader).map_err(|e| attach_path(e, path))
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Atomically replace the file at `path` with the serialized catalog.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        write_atomic(path, &self.to_bytes()?)
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    /// Parse from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Serialize into an in-memory buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        Ok(buffer)
    }
}

/// Replaces `path` with `bytes` through a sibling temporary file.
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), Error> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Fills in the file path of parse errors produced by a reader without one.
pub(crate) fn attach_path(error: Error, path: &Path) -> Error {
    match error {
        Error::Parse {
            path: p,
            line,
            message,
        } if p.as_os_str().is_empty() => Error::Parse {
            path: path.to_path_buf(),
            line,
            message,
        },
        other => other,
    }
}
