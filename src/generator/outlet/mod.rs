use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::generator::sanitize::sanitize;
use crate::generator::types::{ChapterSpec, Manifest};
use crate::research::{self, ResearchPaper};

pub mod exporter;

pub use exporter::{ExportOutcome, Exporter};

/// 参考文献文件名
pub const BIBLIOGRAPHY_FILE: &str = "refs.bib";

/// 磁盘输出：章节文件、合订本与参考文献
pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn chapter_path(&self, chapter: &ChapterSpec) -> PathBuf {
        self.output_dir.join(chapter.file_name())
    }

    /// 转义后写入章节文件，覆盖已有内容
    pub fn save_chapter(&self, chapter: &ChapterSpec, draft: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output dir: {:?}", self.output_dir))?;
        let path = self.chapter_path(chapter);
        fs::write(&path, sanitize(draft))
            .with_context(|| format!("Failed to write chapter: {:?}", path))?;
        info!("💾 章节已保存: {}", path.display());
        Ok(path)
    }

    /// 按章节顺序拼接所有已完成章节为 `<book_slug>_full.md`
    pub fn stitch(&self, config: &Config, manifest: &Manifest) -> Result<PathBuf> {
        let book_name = config.get_book_name();
        let mut master = format!("---\ntitle: \"{}\"\n---\n\n", book_name.replace('"', "'"));

        for chapter in manifest.ready_chapters() {
            let path = self.chapter_path(chapter);
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read chapter: {:?}", path))?;
            master.push_str(content.trim_end());
            master.push_str("\n\n");
        }

        let master_path = self
            .output_dir
            .join(format!("{}_full.md", config.book_slug()));
        fs::write(&master_path, master)
            .with_context(|| format!("Failed to write master file: {:?}", master_path))?;
        info!("📚 合订本已生成: {}", master_path.display());
        Ok(master_path)
    }

    /// 根据语料目录中的检索目录生成BibTeX，没有目录时写入占位条目；已有非空文件保持不变
    pub fn write_bibliography(&self, corpus_dir: &Path) -> Result<PathBuf> {
        let path = self.output_dir.join(BIBLIOGRAPHY_FILE);
        if std::fs::metadata(&path).is_ok_and(|meta| meta.len() > 0) {
            info!("📖 保留已有参考文献: {}", path.display());
            return Ok(path);
        }

        let papers = match research::load_catalog(corpus_dir) {
            Ok(papers) => papers,
            Err(err) => {
                warn!("⚠️ 未能读取文献目录，参考文献使用占位条目: {}", err);
                Vec::new()
            }
        };

        fs::write(&path, render_bibtex(&papers))
            .with_context(|| format!("Failed to write bibliography: {:?}", path))?;
        Ok(path)
    }
}

fn bibtex_escape(value: &str) -> String {
    value.replace('{', "(").replace('}', ")")
}

pub fn render_bibtex(papers: &[ResearchPaper]) -> String {
    if papers.is_empty() {
        return "@misc{placeholder,\n  title = {Bibliography pending},\n  note = {No acquisition catalog was found}\n}\n"
            .to_string();
    }

    papers
        .iter()
        .map(|paper| {
            format!(
                "@misc{{{},\n  title = {{{}}},\n  author = {{{}}},\n  howpublished = {{\\url{{{}}}}},\n  note = {{{}}}\n}}\n",
                paper.safe_id(),
                bibtex_escape(&paper.title),
                bibtex_escape(&paper.authors.join(" and ")),
                paper.url,
                paper.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
