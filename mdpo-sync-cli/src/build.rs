use std::{fs, path::Path};

use mdpo_sync::{Build, BuildReport, Config, Document, gate::readable_float};
use tracing::{debug, info};

/// Runs one full build over every Markdown file of `docs_dir`.
///
/// Default-language documents land in `output`, translated ones in
/// `output/<language>`. Variants excluded by the completion gate are not
/// written.
pub fn run_build_command(
    docs_dir: &Path,
    config_path: &Path,
    output: &Path,
    json: bool,
) -> Result<(), String> {
    let config = Config::load(config_path)
        .map_err(|e| format!("Failed to load config '{}': {}", config_path.display(), e))?;
    let sources = discover_documents(docs_dir, &config, output)?;
    let mut build = Build::new(config, docs_dir).map_err(|e| e.to_string())?;

    if let Err(e) = process_documents(&mut build, docs_dir, &sources, output) {
        build.on_build_failed();
        return Err(e);
    }
    let report = build
        .on_build_finished()
        .map_err(|e| format!("Failed to finish build: {}", e))?;
    info!(
        "Processed {} document(s) into {}",
        sources.len(),
        output.display()
    );
    print_report(&report, json)
}

/// Source paths of the documents under `docs_dir`, relative and sorted.
fn discover_documents(docs_dir: &Path, config: &Config, output: &Path) -> Result<Vec<String>, String> {
    if !docs_dir.is_dir() {
        return Err(format!(
            "Docs directory '{}' does not exist",
            docs_dir.display()
        ));
    }
    let root = docs_dir
        .to_str()
        .ok_or_else(|| format!("Docs directory '{}' is not valid UTF-8", docs_dir.display()))?;
    let pattern = format!("{}/**/*.md", glob::Pattern::escape(root));

    let mut sources = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| format!("Invalid docs pattern: {}", e))? {
        let path = entry.map_err(|e| format!("Failed to read '{}': {}", e.path().display(), e))?;
        if !path.is_file() || config.is_ignored_file(&path) || path.starts_with(output) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(docs_dir) else {
            continue;
        };
        let src_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        sources.push(src_path);
    }
    sources.sort();
    debug!("Found {} document(s) in {}", sources.len(), docs_dir.display());
    Ok(sources)
}

fn process_documents(
    build: &mut Build,
    docs_dir: &Path,
    sources: &[String],
    output: &Path,
) -> Result<(), String> {
    for src_path in sources {
        build.on_document_discovered(src_path);
    }

    for src_path in sources {
        let path = docs_dir.join(src_path);
        let content = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        let mut document = Document::new(src_path.as_str(), content);
        if let Some(title) = page_title(&document.content) {
            document = document.with_title(title);
        }
        let result = build
            .on_document_content_ready(&document)
            .map_err(|e| format!("Failed to process '{}': {}", src_path, e))?;

        write_document(&output.join(src_path), &result.content)?;
        for variant in &result.variants {
            let Some(rendered) = build.on_document_rendered(variant, &variant.content) else {
                debug!("Not writing {} for {}", variant.src_path, variant.language);
                continue;
            };
            write_document(&output.join(&variant.language).join(src_path), &rendered)?;
        }
    }
    Ok(())
}

/// Text of the first level-one ATX heading outside fenced code, which the
/// site generator uses as the page title.
fn page_title(content: &str) -> Option<String> {
    let mut fence: Option<&str> = None;
    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }
        let Some(heading) = line.strip_prefix("# ") else {
            continue;
        };
        let title = heading.trim().trim_end_matches('#').trim_end();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    None
}

fn write_document(path: &Path, content: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, content).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

fn print_report(report: &BuildReport, json: bool) -> Result<(), String> {
    if json {
        let body = serde_json::to_string_pretty(report)
            .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
        println!("{}", body);
        return Ok(());
    }

    println!("=== Build ===");
    for language in &report.languages {
        println!("\nLanguage: {}", language.language);
        println!("  Documents: {}", language.documents);
        println!(
            "  Translated: {} of {} ({}%)",
            language.stats.translated,
            language.stats.total,
            readable_float(language.completion)
        );
        if language.excluded {
            println!("  Excluded: below min_translated_messages");
        }
        if let Some(dedup) = &language.dedup {
            println!("  Moved to compendium: {}", dedup.promoted.len());
            println!("  Obsoleted in compendium: {}", dedup.demoted.len());
            for path in &dedup.skipped {
                println!("  Skipped missing catalog: {}", path.display());
            }
            if dedup.compendium_removed {
                println!("  Compendium removed (no shared messages)");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title_is_first_heading() {
        assert_eq!(
            page_title("Intro\n\n# Welcome #\n\n# Later\n").as_deref(),
            Some("Welcome")
        );
        assert_eq!(page_title("## Sub\n\nText\n"), None);
        assert_eq!(page_title("#NoSpace\n"), None);
    }

    #[test]
    fn test_page_title_skips_fenced_code() {
        let content = "```sh\n# not a title\n```\n\n# Real\n";
        assert_eq!(page_title(content).as_deref(), Some("Real"));
    }
}
