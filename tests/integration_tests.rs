use std::fs;
use std::path::Path;
use tempfile::TempDir;
use manuscript_factory::config::{Config, ConfigError, OutputFormat};
use manuscript_factory::generator::outlet::ExportOutcome;
use manuscript_factory::generator::types::ManifestStatus;
use manuscript_factory::generator::workflow::launch;
use manuscript_factory::utils::cost_guard::BudgetExceeded;

/// 创建一个只含摘要记录的语料目录
fn create_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("2401.00001.md"),
        "# Agents\n\n**Authors:** Ada\n\n## Abstract\n\nTool use.\n",
    )
    .unwrap();
    fs::write(
        dir.join("catalog.json"),
        r#"[{"id":"2401.00001","title":"Agents","authors":["Ada"],"summary":"Tool use.","url":"https://arxiv.org/abs/2401.00001","pdf_url":null,"source":"arxiv"}]"#,
    )
    .unwrap();
}

fn offline_config(root: &Path) -> Config {
    let mut config = Config {
        book_name: Some("Integration Manuscript".to_string()),
        corpus_path: root.join("papers"),
        output_path: root.join("book_out"),
        prompts_dir: root.join("prompts"),
        chapters: vec![
            "Chapter 1: Foundation".to_string(),
            "Chapter 2: Logic".to_string(),
            "Chapter 3: Tools & Costs".to_string(),
        ],
        output_format: OutputFormat::Markdown,
        ..Default::default()
    };
    config.llm.mock = true;
    config
}

#[tokio::test]
async fn test_offline_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    create_corpus(&temp_dir.path().join("papers"));
    let config = offline_config(temp_dir.path());

    let report = launch(&config).await.unwrap();

    assert_eq!(report.outcome.manifest.status, ManifestStatus::Ready);
    assert_eq!(report.corpus.len(), 1);
    assert_eq!(report.outcome.runs.len(), 3);

    let out = temp_dir.path().join("book_out");
    for file in [
        "chapter_1_foundation.md",
        "chapter_2_logic.md",
        "chapter_3_tools_costs.md",
    ] {
        assert!(out.join(file).exists(), "missing {}", file);
    }

    let master = out.join("integration_manuscript_full.md");
    assert_eq!(report.master_file.as_deref(), Some(master.as_path()));
    let content = fs::read_to_string(&master).unwrap();
    assert!(content.starts_with("---\ntitle: \"Integration Manuscript\""));
    assert_eq!(content.matches("[1], [2], and [3]").count(), 3);

    let bib = fs::read_to_string(out.join("refs.bib")).unwrap();
    assert!(bib.contains("@misc{2401.00001,"));
    assert_eq!(report.export, Some(ExportOutcome::Markdown(master)));
}

#[tokio::test]
async fn test_rerun_overwrites_chapters() {
    let temp_dir = TempDir::new().unwrap();
    let config = offline_config(temp_dir.path());

    launch(&config).await.unwrap();
    let first = fs::read_to_string(
        temp_dir.path().join("book_out").join("integration_manuscript_full.md"),
    )
    .unwrap();
    launch(&config).await.unwrap();
    let second = fs::read_to_string(
        temp_dir.path().join("book_out").join("integration_manuscript_full.md"),
    )
    .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_json_export_writes_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = offline_config(temp_dir.path());
    config.output_format = OutputFormat::Json;

    let report = launch(&config).await.unwrap();

    let path = temp_dir.path().join("book_out").join("integration_manuscript.json");
    assert_eq!(report.export, Some(ExportOutcome::Metadata(path.clone())));
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["chapters"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_budget_exhaustion_aborts_before_export() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = offline_config(temp_dir.path());
    config.llm.token_budget = 50;

    let err = launch(&config).await.unwrap_err();

    assert!(err.downcast_ref::<BudgetExceeded>().is_some());
    assert!(
        !temp_dir
            .path()
            .join("book_out")
            .join("integration_manuscript_full.md")
            .exists()
    );
}

#[tokio::test]
async fn test_strict_mode_requires_api_key() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = offline_config(temp_dir.path());
    config.llm.mock = false;
    config.llm.api_key = String::new();
    config.llm.strict_mode = true;

    let err = launch(&config).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::MissingApiKey)
    );
}

#[tokio::test]
async fn test_custom_prompts_and_protocol_are_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = offline_config(temp_dir.path());
    let prompts = temp_dir.path().join("prompts");
    fs::create_dir_all(&prompts).unwrap();
    fs::write(prompts.join("writer.md"), "# The Writer\nWrite {{CHAPTER_TITLE}}.").unwrap();
    let protocol = temp_dir.path().join("protocol.md");
    fs::write(&protocol, "Protocol v1").unwrap();
    config.protocol_path = Some(protocol);

    let report = launch(&config).await.unwrap();

    assert!(report.succeeded());
}
