use std::path::Path;

use mdpo_sync::{CatalogStats, Config, codec::find_catalogs, read_catalog};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Default, Serialize)]
struct LanguageStats {
    language: String,
    catalogs: usize,
    translated: usize,
    total: usize,
    obsolete: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    compendium: Option<CatalogStats>,
    completion_percent: f64,
}

fn collect(docs_dir: &Path, config: &Config, language: &str) -> Result<LanguageStats, String> {
    let compendium_path = config.compendium_path(docs_dir, language);
    let mut stats = LanguageStats {
        language: language.to_string(),
        ..LanguageStats::default()
    };
    let mut totals = CatalogStats::default();

    let catalogs =
        find_catalogs(config.language_dir(docs_dir, language)).map_err(|e| e.to_string())?;
    for path in catalogs {
        let catalog = read_catalog(&path).map_err(|e| e.to_string())?;
        if path == compendium_path {
            stats.compendium = Some(catalog.stats());
            continue;
        }
        stats.catalogs += 1;
        stats.obsolete += catalog.iter().filter(|e| e.obsolete).count();
        totals += catalog.stats();
    }

    stats.translated = totals.translated;
    stats.total = totals.total;
    stats.completion_percent = (totals.percent() * 100.0).round() / 100.0;
    Ok(stats)
}

/// Prints per-language translation progress of the catalogs on disk.
pub fn run_stats_command(
    docs_dir: &Path,
    config_path: &Path,
    lang: Option<&str>,
    json_output: bool,
) -> Result<(), String> {
    let config = Config::load(config_path)
        .map_err(|e| format!("Failed to load config '{}': {}", config_path.display(), e))?;
    let languages: Vec<String> = config
        .translation_languages()
        .into_iter()
        .filter(|l| lang.is_none_or(|wanted| wanted == l))
        .collect();
    if let Some(wanted) = lang {
        if languages.is_empty() {
            return Err(format!("Language '{}' is not a translation language", wanted));
        }
    }

    let per_lang = languages
        .iter()
        .map(|language| collect(docs_dir, &config, language))
        .collect::<Result<Vec<_>, _>>()?;

    if json_output {
        let body = json!({
            "summary": {
                "languages": per_lang.len(),
                "catalogs": per_lang.iter().map(|s| s.catalogs).sum::<usize>(),
            },
            "languages": per_lang,
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| format!("Failed to serialize stats JSON: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("=== Stats ===");
    println!("Languages: {}", per_lang.len());
    for stats in &per_lang {
        println!("\nLanguage: {}", stats.language);
        println!("  Catalogs: {}", stats.catalogs);
        println!("  Translated: {} of {}", stats.translated, stats.total);
        println!("  Obsolete: {}", stats.obsolete);
        if let Some(compendium) = stats.compendium {
            println!(
                "  Compendium: {} of {} translated",
                compendium.translated, compendium.total
            );
        }
        println!("  Completion: {:.2}%", stats.completion_percent);
    }
    Ok(())
}
