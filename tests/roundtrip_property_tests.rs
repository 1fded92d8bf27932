use mdpo_sync::{
    Catalog, ExtractedMessage, Extraction, MessageEntry, PageMetadata, merge_with_metadata,
    read_catalog, write_catalog,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;

fn id_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9][A-Za-z0-9 _\\-\\.,!\\?\"\\\\\t\n]{0,24}")
        .expect("valid id regex")
}

fn translation_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 _\\-\\.,!\\?\"\\\\\t\nñé]{0,30}")
        .expect("valid translation regex")
}

fn comment_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("#(\\.|:)? [a-z0-9.:]{1,12}").expect("valid comment regex")
}

fn flag_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_-]{0,12}").expect("valid flag regex")
}

#[derive(Debug, Clone)]
struct EntryParts {
    translation: String,
    context: Option<String>,
    obsolete: bool,
    flags: Vec<String>,
    comments: Vec<String>,
}

fn parts_strategy() -> impl Strategy<Value = EntryParts> {
    (
        translation_strategy(),
        proptest::option::of(proptest::string::string_regex("[a-z]{1,8}").expect("valid context regex")),
        any::<bool>(),
        prop::collection::vec(flag_strategy(), 0..3),
        prop::collection::vec(comment_strategy(), 0..3),
    )
        .prop_map(|(translation, context, obsolete, flags, comments)| EntryParts {
            translation,
            context,
            obsolete,
            flags,
            comments,
        })
}

fn header_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        proptest::string::string_regex("[A-Za-z-]{1,16}: [a-z0-9/=; -]{1,16}\n")
            .expect("valid header regex"),
        prop::collection::vec(
            proptest::string::string_regex("(# [A-Za-z0-9]{1,16}|#, fuzzy)")
                .expect("valid header comment regex"),
            0..3,
        ),
    )
}

fn catalog_strategy() -> impl Strategy<Value = Catalog> {
    (
        proptest::option::of(header_strategy()),
        prop::collection::btree_map(id_strategy(), parts_strategy(), 0..8),
    )
        .prop_map(|(header, entries)| build_catalog(header, entries))
}

fn build_catalog(
    header: Option<(String, Vec<String>)>,
    entries: BTreeMap<String, EntryParts>,
) -> Catalog {
    let (header, header_comments) = match header {
        Some((value, comments)) => (Some(value), comments),
        None => (None, Vec::new()),
    };
    let entries = entries
        .into_iter()
        .map(|(id, parts)| MessageEntry {
            id,
            translation: parts.translation,
            context: parts.context,
            obsolete: parts.obsolete,
            flags: parts.flags,
            comments: parts.comments,
        })
        .collect();
    Catalog {
        header,
        header_comments,
        entries,
        path: None,
    }
}

fn assert_stable_roundtrip(mut catalog: Catalog, file_name: &str) -> Result<(), TestCaseError> {
    let tmp = tempfile::tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
    let path = tmp.path().join(file_name);
    catalog.path = Some(path.clone());

    write_catalog(&catalog).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let first = fs::read(&path).map_err(|e| TestCaseError::fail(e.to_string()))?;

    let loaded = read_catalog(&path).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(&loaded.entries, &catalog.entries);
    prop_assert_eq!(&loaded.header, &catalog.header);
    prop_assert_eq!(&loaded.header_comments, &catalog.header_comments);

    fs::remove_file(&path).map_err(|e| TestCaseError::fail(e.to_string()))?;
    write_catalog(&loaded).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let second = fs::read(&path).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(first, second);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn po_save_load_save_is_byte_identical(catalog in catalog_strategy()) {
        assert_stable_roundtrip(catalog, "index.md.po")?;
    }

    #[test]
    fn json_save_load_save_is_byte_identical(catalog in catalog_strategy()) {
        assert_stable_roundtrip(catalog, "index.md.json")?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn merge_twice_changes_nothing(
        existing in catalog_strategy(),
        extracted in prop::collection::vec(id_strategy(), 0..10),
        title in proptest::option::of(id_strategy()),
        compendium in catalog_strategy(),
    ) {
        let extraction = Extraction {
            messages: extracted.into_iter().map(ExtractedMessage::new).collect(),
            ..Extraction::default()
        };
        let metadata = PageMetadata::new(title.as_deref(), None);
        let mut catalog = existing;

        merge_with_metadata(&mut catalog, &extraction, &metadata, &compendium)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let once = catalog.clone();
        let report = merge_with_metadata(&mut catalog, &extraction, &metadata, &compendium)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert!(report.is_unchanged());
        prop_assert_eq!(catalog, once);
    }
}
