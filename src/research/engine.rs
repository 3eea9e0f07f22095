use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::research::confirm::{Confirmation, ConsoleConfirmation};
use crate::research::download::{HttpFetcher, PdfFetcher, acquire_paper};
use crate::research::providers::{SearchProvider, build_provider, http_client};
use crate::research::types::{
    AcquisitionReport, AcquisitionRequest, ResearchPaper, SourceKind,
};

/// 检索目录文件名
pub const CATALOG_FILE: &str = "catalog.json";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// 按id去重，先出现者保留
pub fn dedup_first_seen(papers: Vec<ResearchPaper>) -> Vec<ResearchPaper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|paper| seen.insert(paper.id.clone()))
        .collect()
}

pub fn write_catalog(dir: &Path, papers: &[ResearchPaper]) -> Result<PathBuf> {
    let path = dir.join(CATALOG_FILE);
    let json = serde_json::to_string_pretty(papers)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write catalog: {:?}", path))?;
    Ok(path)
}

pub fn load_catalog(dir: &Path) -> Result<Vec<ResearchPaper>> {
    let path = dir.join(CATALOG_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read catalog: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse catalog: {:?}", path))
}

/// 文献获取引擎
///
/// 按请求中的来源顺序逐个检索，单个后端失败只记录错误；
/// 合并去重截断后（可选）请操作员确认，先写检索目录再逐篇下载。
pub struct ResearchEngine {
    output_dir: PathBuf,
    providers: Vec<(SourceKind, Box<dyn SearchProvider>)>,
    fetcher: Box<dyn PdfFetcher>,
    confirmation: Box<dyn Confirmation>,
}

impl ResearchEngine {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        fetcher: Box<dyn PdfFetcher>,
        confirmation: Box<dyn Confirmation>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            providers: Vec::new(),
            fetcher,
            confirmation,
        }
    }

    pub fn register(mut self, kind: SourceKind, provider: Box<dyn SearchProvider>) -> Self {
        self.providers.retain(|(existing, _)| *existing != kind);
        self.providers.push((kind, provider));
        self
    }

    /// 注册全部在线后端，下载到语料目录
    pub fn from_config(config: &Config) -> Result<Self> {
        let search_http = http_client(SEARCH_TIMEOUT)?;
        let download_http = http_client(DOWNLOAD_TIMEOUT)?;
        let engine = Self::new(
            config.corpus_path.clone(),
            Box::new(HttpFetcher::new(download_http)),
            Box::new(ConsoleConfirmation::stdio()),
        );
        Ok([SourceKind::Arxiv, SourceKind::SemanticScholar, SourceKind::OpenAlex]
            .into_iter()
            .fold(engine, |engine, kind| {
                engine.register(kind, build_provider(kind, &search_http))
            }))
    }

    fn provider(&self, kind: SourceKind) -> Option<&dyn SearchProvider> {
        self.providers
            .iter()
            .find(|(registered, _)| *registered == kind)
            .map(|(_, provider)| provider.as_ref())
    }

    /// 依次检索各来源，合并后去重并截断
    pub async fn search(&self, request: &AcquisitionRequest) -> Vec<ResearchPaper> {
        let mut merged = Vec::new();
        for kind in &request.sources {
            let Some(provider) = self.provider(*kind) else {
                warn!("⚠️ 未注册的检索来源: {}", kind);
                continue;
            };
            match provider
                .search(&request.query, request.limit, &request.date_range)
                .await
            {
                Ok(papers) => {
                    info!("🔎 {} 返回 {} 篇", provider.name(), papers.len());
                    merged.extend(papers);
                }
                Err(e) => error!("❌ {} 检索失败: {}", provider.name(), e),
            }
        }

        let mut unique = dedup_first_seen(merged);
        unique.truncate(request.limit);
        unique
    }

    pub async fn search_and_download(&mut self, request: &AcquisitionRequest) -> Result<AcquisitionReport> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create corpus dir: {:?}", self.output_dir))?;

        let selected = self.search(request).await;
        let mut report = AcquisitionReport {
            selected,
            ..Default::default()
        };
        if report.selected.is_empty() {
            warn!("⚠️ 没有检索到论文: {}", request.query);
        } else if !request.auto_confirm && !self.confirmation.confirm(&report.selected)? {
            info!("操作员取消了下载");
            report.declined = true;
            return Ok(report);
        }

        report.catalog_path = Some(write_catalog(&self.output_dir, &report.selected)?);

        for paper in &report.selected {
            match acquire_paper(
                paper,
                &self.output_dir,
                request.fetch_mode,
                self.fetcher.as_ref(),
            )
            .await
            {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => error!("❌ 保存 {} 失败: {}", paper.id, e),
            }
        }

        info!(
            "📥 获取完成: 下载 {} 篇，跳过 {} 篇，摘要 {} 篇",
            report.downloaded(),
            report.skipped(),
            report.abstracts()
        );
        Ok(report)
    }
}
