use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::ConfigError;

/// 论文获取方式
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// 优先下载PDF全文，失败时回退为摘要
    #[serde(rename = "fulltext")]
    #[default]
    Fulltext,
    /// 只保存摘要与元数据
    #[serde(rename = "abstract")]
    Abstract,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Fulltext => write!(f, "fulltext"),
            FetchMode::Abstract => write!(f, "abstract"),
        }
    }
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fulltext" | "full" | "pdf" => Ok(FetchMode::Fulltext),
            "abstract" | "abstracts" | "metadata" => Ok(FetchMode::Abstract),
            _ => Err(format!("Unknown fetch mode: {}", s)),
        }
    }
}

/// 学术检索后端
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    #[serde(rename = "arxiv")]
    Arxiv,
    #[serde(rename = "semantic_scholar")]
    SemanticScholar,
    #[serde(rename = "openalex")]
    OpenAlex,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Arxiv => write!(f, "arxiv"),
            SourceKind::SemanticScholar => write!(f, "semantic_scholar"),
            SourceKind::OpenAlex => write!(f, "openalex"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(SourceKind::Arxiv),
            "semantic_scholar" | "semanticscholar" | "s2" => Ok(SourceKind::SemanticScholar),
            "openalex" => Ok(SourceKind::OpenAlex),
            _ => Err(format!("Unknown source: {}", s)),
        }
    }
}

impl SourceKind {
    /// 解析逗号分隔的来源列表，未知来源报错
    pub fn parse_list(list: &str) -> Result<Vec<SourceKind>, ConfigError> {
        let mut sources = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind = item
                .parse::<SourceKind>()
                .map_err(|_| ConfigError::UnknownSource(item.to_string()))?;
            if !sources.contains(&kind) {
                sources.push(kind);
            }
        }
        Ok(sources)
    }
}

/// 发表日期过滤区间（闭区间，两端均可缺省）
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(after: Option<NaiveDate>, before: Option<NaiveDate>) -> Self {
        Self { after, before }
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    /// 解析 `YYYY-MM-DD`
    pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| ConfigError::InvalidDate(value.to_string()))
    }

    /// 解析 `YYYY-MM-DD,YYYY-MM-DD` 或 `YYYY-MM-DD..YYYY-MM-DD`
    pub fn parse_between(value: &str) -> Result<Self, ConfigError> {
        let (start, end) = value
            .split_once("..")
            .or_else(|| value.split_once(','))
            .ok_or_else(|| ConfigError::InvalidBetween(value.to_string()))?;
        let after = Self::parse_date(start)?;
        let before = Self::parse_date(end)?;
        if after > before {
            return Err(ConfigError::InvalidBetween(value.to_string()));
        }
        Ok(Self::new(Some(after), Some(before)))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.after.is_none_or(|after| date >= after)
            && self.before.is_none_or(|before| date <= before)
    }
}

/// 各检索后端统一后的论文记录，也是Catalog中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPaper {
    /// 后端提供的标识，单次获取内的去重键
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub url: String,
    pub pdf_url: Option<String>,
    /// 后端名称
    pub source: String,
}

impl ResearchPaper {
    /// 由id派生的文件系统安全文件名主体
    pub fn safe_id(&self) -> String {
        sanitize_file_stem(&self.id)
    }

    /// 摘要形式的语料记录（markdown）
    pub fn abstract_record(&self) -> String {
        let authors = if self.authors.is_empty() {
            "Unknown".to_string()
        } else {
            self.authors.join(", ")
        };
        let mut record = format!(
            "# {}\n\n**Authors:** {}\n\n**Source:** {} ({})\n",
            self.title.trim(),
            authors,
            self.url,
            self.source
        );
        if let Some(pdf_url) = &self.pdf_url {
            record.push_str(&format!("\n**PDF:** {}\n", pdf_url));
        }
        record.push_str(&format!("\n## Abstract\n\n{}\n", self.summary.trim()));
        record
    }
}

/// 将任意标识转换为可用作文件名的字符串
pub fn sanitize_file_stem(raw: &str) -> String {
    let stem: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.').to_string();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

/// 一次获取请求
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub query: String,
    pub limit: usize,
    pub date_range: DateRange,
    pub fetch_mode: FetchMode,
    pub auto_confirm: bool,
    pub sources: Vec<SourceKind>,
}

/// 单篇论文的落盘结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// 已下载PDF全文
    Downloaded(PathBuf),
    /// 文件已存在且非空，跳过
    AlreadyPresent(PathBuf),
    /// 写入了摘要记录
    AbstractWritten(PathBuf),
}

impl DownloadOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            DownloadOutcome::Downloaded(path)
            | DownloadOutcome::AlreadyPresent(path)
            | DownloadOutcome::AbstractWritten(path) => path,
        }
    }
}

/// 一次获取的汇总
#[derive(Debug, Clone, Default)]
pub struct AcquisitionReport {
    /// 去重截断后的论文
    pub selected: Vec<ResearchPaper>,
    pub catalog_path: Option<PathBuf>,
    pub outcomes: Vec<DownloadOutcome>,
    /// 操作员拒绝了下载
    pub declined: bool,
}

impl AcquisitionReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Downloaded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::AlreadyPresent(_)))
    }

    pub fn abstracts(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::AbstractWritten(_)))
    }

    fn count(&self, predicate: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}
