//! Reading, writing and removing catalog files.
//!
//! The format of a catalog is inferred from its extension. Writes are skipped
//! when the serialized bytes equal what is already on disk, and otherwise
//! replace the whole file atomically.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::Error,
    formats::{FormatType, JsonFormat, PoFormat},
    traits::{Parser, write_atomic},
    types::Catalog,
};

/// Loads a catalog, inferring the format from the path.
///
/// A malformed file is a fatal error; the catalog's `path` is set on success.
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog, Error> {
    let path = path.as_ref();
    let mut catalog = match FormatType::from_path(path)? {
        FormatType::Po => Catalog::from(PoFormat::read_from(path)?),
        FormatType::Json => Catalog::from(JsonFormat::read_from(path)?),
    };
    catalog.validate().map_err(|e| match e {
        Error::InvalidEntry(message) => Error::parse_error(path, 0, message),
        other => other,
    })?;
    catalog.path = Some(path.to_path_buf());
    debug!("Loaded {} entries from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Loads a catalog, or returns an empty one bound to `path` if the file does
/// not exist yet.
pub fn read_catalog_or_new<P: AsRef<Path>>(path: P) -> Result<Catalog, Error> {
    let path = path.as_ref();
    if path.is_file() {
        read_catalog(path)
    } else {
        Ok(Catalog::with_path(path))
    }
}

/// Serializes a catalog in the given format.
pub fn catalog_to_bytes(catalog: &Catalog, format: FormatType) -> Result<Vec<u8>, Error> {
    match format {
        FormatType::Po => PoFormat::from(catalog).to_bytes(),
        FormatType::Json => JsonFormat::from(catalog).to_bytes(),
    }
}

/// Persists a catalog to its path.
///
/// Returns `Ok(false)` without touching the file when the catalog has no
/// path (excluded document) or the content on disk is already identical.
pub fn write_catalog(catalog: &Catalog) -> Result<bool, Error> {
    let Some(path) = catalog.path.as_deref() else {
        return Ok(false);
    };
    let bytes = catalog_to_bytes(catalog, FormatType::from_path(path)?)?;
    if fs::read(path).ok().as_deref() == Some(bytes.as_slice()) {
        return Ok(false);
    }
    write_atomic(path, &bytes)?;
    debug!("Saved {} entries to {}", catalog.len(), path.display());
    Ok(true)
}

/// Removes a catalog file and its parent directory if that leaves it empty.
pub fn remove_catalog<P: AsRef<Path>>(path: P) -> Result<(), Error> {
    let path = path.as_ref();
    fs::remove_file(path)?;
    debug!("Removed {}", path.display());

    if let Some(parent) = path.parent() {
        if parent.read_dir()?.next().is_none() {
            fs::remove_dir(parent)?;
        }
    }
    Ok(())
}

/// Catalog files under `dir`, sorted by path, skipping files of other formats.
pub fn find_catalogs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, Error> {
    let mut found = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];
    while let Some(current) = pending.pop() {
        if !current.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if FormatType::from_path(&path).is_ok() {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageEntry;
    use tempfile::TempDir;

    fn sample(path: PathBuf) -> Catalog {
        Catalog {
            header: None,
            header_comments: Vec::new(),
            entries: vec![
                MessageEntry::new("Hello").with_translation("Hola"),
                MessageEntry::new("Bye"),
            ],
            path: Some(path),
        }
    }

    #[test]
    fn test_write_then_read_po() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("es").join("index.md.po");
        let catalog = sample(path.clone());

        assert!(write_catalog(&catalog).unwrap());
        let loaded = read_catalog(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_write_then_read_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.md.json");
        let catalog = sample(path.clone());

        write_catalog(&catalog).unwrap();
        assert_eq!(read_catalog(&path).unwrap(), catalog);
    }

    #[test]
    fn test_unchanged_catalog_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let catalog = sample(dir.path().join("index.md.po"));

        assert!(write_catalog(&catalog).unwrap());
        assert!(!write_catalog(&catalog).unwrap());
    }

    #[test]
    fn test_catalog_without_path_is_not_written() {
        let catalog = Catalog::new();
        assert!(!write_catalog(&catalog).unwrap());
    }

    #[test]
    fn test_read_or_new_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.po");
        let catalog = read_catalog_or_new(&path).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_read_rejects_duplicate_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.po");
        fs::write(&path, "msgid \"A\"\nmsgstr \"\"\n\nmsgid \"A\"\nmsgstr \"a\"\n").unwrap();

        assert!(matches!(read_catalog(&path), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_read_malformed_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.po");
        fs::write(&path, "msgid \"A\n").unwrap();

        let err = read_catalog(&path).unwrap_err();
        assert!(err.to_string().contains("broken.po"));
    }

    #[test]
    fn test_remove_catalog_removes_empty_parent() {
        let dir = TempDir::new().unwrap();
        let lang_dir = dir.path().join("es");
        let path = lang_dir.join("_compendium.po");
        write_catalog(&sample(path.clone())).unwrap();

        remove_catalog(&path).unwrap();
        assert!(!path.exists());
        assert!(!lang_dir.exists());
    }

    #[test]
    fn test_find_catalogs_is_sorted() {
        let dir = TempDir::new().unwrap();
        write_catalog(&sample(dir.path().join("b.md.po"))).unwrap();
        write_catalog(&sample(dir.path().join("sub").join("a.md.po"))).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = find_catalogs(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("b.md.po"), dir.path().join("sub").join("a.md.po")]
        );
    }
}
