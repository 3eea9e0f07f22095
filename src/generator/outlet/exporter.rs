use anyhow::{Context, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::{info, warn};

use crate::config::{Config, OutputFormat};
use crate::generator::types::Manifest;

/// 导出结果，仅用于日志与报告，不改变流水线结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// 自定义导出脚本已执行
    Script { success: bool },
    /// pandoc 渲染产物
    Rendered(PathBuf),
    /// markdown 格式，合订本即成品
    Markdown(PathBuf),
    /// JSON 元数据
    Metadata(PathBuf),
    /// 未执行导出
    Skipped(String),
}

#[derive(Serialize)]
struct BookMetadata<'a> {
    title: String,
    goal: Option<&'a str>,
    keywords: Option<&'a str>,
    master_file: String,
    chapters: Vec<ChapterMetadata>,
    generated_at: String,
}

#[derive(Serialize)]
struct ChapterMetadata {
    position: usize,
    title: String,
    file: String,
}

/// 合订本导出器
///
/// 配置了 `export_script` 时交给脚本（bash）处理，否则按输出格式调用pandoc。
/// 外部工具缺失或失败只记录警告。
pub struct Exporter;

impl Exporter {
    /// 检查外部程序是否可用
    pub async fn is_available(program: &str) -> bool {
        match TokioCommand::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    pub fn output_path(config: &Config) -> PathBuf {
        config.output_path.join(format!(
            "{}.{}",
            config.book_slug(),
            config.output_format.extension()
        ))
    }

    pub fn pandoc_args(config: &Config, master: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            master.as_os_str().to_owned(),
            "-o".into(),
            Self::output_path(config).into_os_string(),
            "--toc".into(),
        ];
        if matches!(config.output_format, OutputFormat::Html | OutputFormat::Latex) {
            args.push("--standalone".into());
        }
        args
    }

    pub async fn export(config: &Config, manifest: &Manifest, master: &Path) -> Result<ExportOutcome> {
        if let Some(script) = &config.export_script {
            return Self::run_script(config, script, master).await;
        }

        match config.output_format {
            OutputFormat::Markdown => {
                info!("📄 markdown 格式无需转换: {}", master.display());
                Ok(ExportOutcome::Markdown(master.to_path_buf()))
            }
            OutputFormat::Json => Self::write_metadata(config, manifest, master),
            _ => Self::run_pandoc(config, master).await,
        }
    }

    async fn run_script(config: &Config, script: &Path, master: &Path) -> Result<ExportOutcome> {
        if !script.is_file() {
            warn!("⚠️ 导出脚本不存在，跳过导出: {}", script.display());
            return Ok(ExportOutcome::Skipped(format!(
                "export script not found: {}",
                script.display()
            )));
        }

        // 脚本在输出目录中运行，相对路径需先按当前目录解析
        let script = std::fs::canonicalize(script)
            .with_context(|| format!("Failed to resolve export script: {:?}", script))?;
        let master = std::path::absolute(master)
            .with_context(|| format!("Failed to resolve master file: {:?}", master))?;

        info!("🚀 执行导出脚本: bash {}", script.display());
        let status = TokioCommand::new("bash")
            .arg(&script)
            .env("BOOK_NAME", config.get_book_name())
            .env("OUTPUT_FORMAT", config.output_format.to_string())
            .env("MASTER_FILE", &master)
            .current_dir(&config.output_path)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                info!("✅ 导出脚本执行完成");
                Ok(ExportOutcome::Script { success: true })
            }
            Ok(status) => {
                warn!(
                    "⚠️ 导出脚本返回非零状态码: {}",
                    status.code().unwrap_or(-1)
                );
                Ok(ExportOutcome::Script { success: false })
            }
            Err(e) => {
                warn!("⚠️ 执行导出脚本时出错: {}", e);
                Ok(ExportOutcome::Script { success: false })
            }
        }
    }

    async fn run_pandoc(config: &Config, master: &Path) -> Result<ExportOutcome> {
        if !Self::is_available("pandoc").await {
            warn!("⚠️ pandoc 未安装或不可用，跳过 {} 导出", config.output_format);
            return Ok(ExportOutcome::Skipped("pandoc not available".to_string()));
        }

        let output = Self::output_path(config);
        info!("🖨️ pandoc 导出 {} -> {}", master.display(), output.display());
        let status = TokioCommand::new("pandoc")
            .args(Self::pandoc_args(config, master))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(ExportOutcome::Rendered(output)),
            Ok(status) => {
                warn!("⚠️ pandoc 返回非零状态码: {}", status.code().unwrap_or(-1));
                Ok(ExportOutcome::Skipped(format!("pandoc exited with {}", status)))
            }
            Err(e) => {
                warn!("⚠️ 执行pandoc时出错: {}", e);
                Ok(ExportOutcome::Skipped(e.to_string()))
            }
        }
    }

    fn write_metadata(config: &Config, manifest: &Manifest, master: &Path) -> Result<ExportOutcome> {
        let metadata = BookMetadata {
            title: config.get_book_name(),
            goal: config.goal.as_deref(),
            keywords: config.keywords.as_deref(),
            master_file: master.display().to_string(),
            chapters: manifest
                .ready_chapters()
                .into_iter()
                .map(|chapter| ChapterMetadata {
                    position: chapter.position,
                    title: chapter.title.clone(),
                    file: chapter.file_name(),
                })
                .collect(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        };

        let path = Self::output_path(config);
        let json = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write metadata: {:?}", path))?;
        info!("🧾 元数据已导出: {}", path.display());
        Ok(ExportOutcome::Metadata(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::types::ChapterSpec;
    use tempfile::TempDir;

    fn config_in(dir: &Path, format: OutputFormat) -> Config {
        Config {
            book_name: Some("Agentic AI".to_string()),
            output_path: dir.to_path_buf(),
            output_format: format,
            ..Default::default()
        }
    }

    #[test]
    fn test_output_path_uses_format_extension() {
        let config = config_in(Path::new("/tmp/out"), OutputFormat::Latex);
        assert_eq!(
            Exporter::output_path(&config),
            PathBuf::from("/tmp/out/agentic_ai.tex")
        );
    }

    #[test]
    fn test_pandoc_args() {
        let config = config_in(Path::new("out"), OutputFormat::Html);
        let args = Exporter::pandoc_args(&config, Path::new("out/agentic_ai_full.md"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "out/agentic_ai_full.md",
                "-o",
                "out/agentic_ai.html",
                "--toc",
                "--standalone"
            ]
        );
    }

    #[tokio::test]
    async fn test_markdown_needs_no_tool() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), OutputFormat::Markdown);
        let master = dir.path().join("agentic_ai_full.md");

        let outcome = Exporter::export(&config, &Manifest::new(), &master)
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Markdown(master));
    }

    #[tokio::test]
    async fn test_json_metadata_lists_ready_chapters() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), OutputFormat::Json);
        let chapters = ChapterSpec::enumerate(&["Intro".to_string()]);
        let mut manifest = Manifest::new();
        manifest.mark_ready(&chapters[0]);

        let outcome = Exporter::export(&config, &manifest, &dir.path().join("m.md"))
            .await
            .unwrap();

        let path = dir.path().join("agentic_ai.json");
        assert_eq!(outcome, ExportOutcome::Metadata(path.clone()));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["title"], "Agentic AI");
        assert_eq!(value["chapters"][0]["file"], "intro.md");
    }

    #[tokio::test]
    async fn test_script_resolves_relative_paths() {
        // 相对于当前目录的临时目录，路径保持相对形式
        let dir = TempDir::new_in(".").unwrap();
        assert!(dir.path().is_relative());
        let out = dir.path().join("book_out");
        std::fs::create_dir_all(&out).unwrap();
        let master = out.join("agentic_ai_full.md");
        std::fs::write(&master, "# Book").unwrap();
        let script = dir.path().join("export.sh");
        std::fs::write(
            &script,
            "test -f \"$MASTER_FILE\" && test \"$OUTPUT_FORMAT\" = pdf\n",
        )
        .unwrap();

        let mut config = config_in(&out, OutputFormat::Pdf);
        config.export_script = Some(script);

        let outcome = Exporter::export(&config, &Manifest::new(), &master)
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Script { success: true });
    }

    #[tokio::test]
    async fn test_missing_script_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), OutputFormat::Pdf);
        config.export_script = Some(dir.path().join("absent.sh"));

        let outcome = Exporter::export(&config, &Manifest::new(), &dir.path().join("m.md"))
            .await
            .unwrap();

        assert!(matches!(outcome, ExportOutcome::Skipped(_)));
    }
}
