use super::*;
use crate::config::OutputFormat;
use tempfile::TempDir;

fn offline_config(dir: &TempDir) -> Config {
    let mut config = Config {
        book_name: Some("Offline Book".to_string()),
        corpus_path: dir.path().join("papers"),
        output_path: dir.path().join("out"),
        prompts_dir: dir.path().join("prompts"),
        output_format: OutputFormat::Markdown,
        ..Default::default()
    };
    config.llm.mock = true;
    config
}

#[test]
fn test_timing_scope_records_phases_in_order() {
    let mut timing = TimingScope::new();
    timing.start_phase("a");
    timing.start_phase("b");
    timing.end_phase("b");
    timing.end_phase("a");

    let phases: Vec<&str> = timing
        .get_phase_durations()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(phases, vec!["b", "a"]);
    assert!(timing.end_phase("missing").is_none());
    assert!(timing.generate_timing_report().contains("- a:"));
}

#[test]
fn test_scan_corpus_finds_pdf_and_markdown() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("sub");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
    std::fs::write(nested.join("b.md"), "# b").unwrap();
    std::fs::write(dir.path().join("catalog.json"), "[]").unwrap();

    let docs = scan_corpus(dir.path()).unwrap();

    assert_eq!(docs, vec![dir.path().join("a.pdf"), nested.join("b.md")]);
}

#[test]
fn test_scan_missing_corpus_is_empty() {
    let dir = TempDir::new().unwrap();
    assert!(scan_corpus(&dir.path().join("absent")).unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_launch_stitches_manuscript() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(&dir);

    let report = launch(&config).await.unwrap();

    assert!(report.succeeded());
    assert!(report.acquisition.is_none());
    let master = report.master_file.unwrap();
    assert_eq!(master, dir.path().join("out").join("offline_book_full.md"));
    let content = std::fs::read_to_string(&master).unwrap();
    assert_eq!(content.matches("# Chapter Content").count(), 2);
    assert!(dir.path().join("out").join("refs.bib").exists());
    assert_eq!(report.export, Some(ExportOutcome::Markdown(master)));
}
