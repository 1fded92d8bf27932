use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn mdpo_sync_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mdpo-sync"))
}

fn write_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let path = dir.path().join("mdpo-sync.toml");
    fs::write(
        &path,
        format!("languages = [\"en\", \"es\"]\nlocale_dir = \"locales\"\n{}", extra),
    )
    .unwrap();
    path
}

fn write_doc(docs: &Path, name: &str, content: &str) {
    let path = docs.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run_build(dir: &TempDir, config: &Path, extra_args: &[&str]) -> Output {
    let docs = dir.path().join("docs");
    let site = dir.path().join("site");
    mdpo_sync_cmd()
        .args([
            "build",
            "--docs-dir",
            docs.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--output",
            site.to_str().unwrap(),
        ])
        .args(extra_args)
        .output()
        .unwrap()
}

#[test]
fn test_build_writes_catalogs_compendium_and_variants() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");
    let docs = dir.path().join("docs");
    write_doc(&docs, "index.md", "# Welcome\n\nHello\n");
    write_doc(&docs, "guide/intro.md", "Hello\n");

    let output = run_build(&dir, &config, &[]);
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let locales = docs.join("locales").join("es");
    assert!(locales.join("index.md.po").is_file());
    assert!(locales.join("guide").join("intro.md.po").is_file());
    let compendium = fs::read_to_string(locales.join("_compendium.po")).unwrap();
    assert!(compendium.contains("msgid \"Hello\""), "{}", compendium);

    let site = dir.path().join("site");
    assert!(site.join("index.md").is_file());
    assert!(site.join("es").join("guide").join("intro.md").is_file());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Language: es"), "{}", stdout);
    assert!(stdout.contains("Moved to compendium: 1"), "{}", stdout);
}

#[test]
fn test_build_takes_title_from_first_heading() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");
    let docs = dir.path().join("docs");
    // the heading body is not translated, but the page title still is
    write_doc(
        &docs,
        "index.md",
        "<!-- mdpo-disable-next-line -->\n# Welcome\n\nBody\n",
    );

    let output = run_build(&dir, &config, &[]);
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let catalog = fs::read_to_string(docs.join("locales").join("es").join("index.md.po")).unwrap();
    assert!(catalog.starts_with("msgid \"Welcome\""), "{}", catalog);
    assert!(catalog.contains("msgid \"Body\""), "{}", catalog);
}

#[test]
fn test_build_json_report() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "min_translated_messages = \"50%\"\n");
    write_doc(&dir.path().join("docs"), "index.md", "Hello\n");

    let output = run_build(&dir, &config, &["--json"]);
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let es = &report["languages"][0];
    assert_eq!(es["language"], "es");
    assert_eq!(es["excluded"], true);
    assert_eq!(es["stats"]["total"], 1);
    assert!(!dir.path().join("site").join("es").join("index.md").exists());
}

#[test]
fn test_build_fails_on_missing_languages() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("mdpo-sync.toml");
    fs::write(&config, "locale_dir = \"locales\"\n").unwrap();
    write_doc(&dir.path().join("docs"), "index.md", "Hello\n");

    let output = run_build(&dir, &config, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("languages"), "{}", stderr);
}

#[test]
fn test_build_fails_on_malformed_catalog() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");
    let docs = dir.path().join("docs");
    write_doc(&docs, "index.md", "Hello\n");
    write_doc(&docs, "locales/es/index.md.po", "msgid \"Hello\"\nmsgstr\n");

    let output = run_build(&dir, &config, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("index.md.po"), "{}", stderr);
}

#[test]
fn test_stats_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    write_doc(
        &docs,
        "locales/es/index.md.po",
        "msgid \"Hello\"\nmsgstr \"Hola\"\n\nmsgid \"World\"\nmsgstr \"\"\n\n#~ msgid \"Old\"\n#~ msgstr \"Viejo\"\n",
    );
    write_doc(
        &docs,
        "locales/es/_compendium.po",
        "msgid \"Shared\"\nmsgstr \"Compartido\"\n",
    );

    let output = mdpo_sync_cmd()
        .args([
            "stats",
            "--docs-dir",
            docs.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["summary"]["languages"], 1);
    assert_eq!(v["summary"]["catalogs"], 1);
    let es = &v["languages"][0];
    assert_eq!(es["translated"], 1);
    assert_eq!(es["total"], 2);
    assert_eq!(es["obsolete"], 1);
    assert_eq!(es["completion_percent"], 50.0);
    assert_eq!(es["compendium"]["translated"], 1);
}

#[test]
fn test_stats_rejects_unknown_language() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    let output = mdpo_sync_cmd()
        .args([
            "stats",
            "--docs-dir",
            dir.path().join("docs").to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--lang",
            "fr",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("fr"));
}
