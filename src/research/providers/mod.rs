//! 学术检索后端：统一的检索能力，每个后端一个实现

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::research::types::{DateRange, ResearchPaper, SourceKind};

pub mod arxiv;
pub mod openalex;
pub mod semantic_scholar;

pub use arxiv::ArxivProvider;
pub use openalex::OpenAlexProvider;
pub use semantic_scholar::SemanticScholarProvider;

const USER_AGENT: &str = concat!("manuscript-factory/", env!("CARGO_PKG_VERSION"));

/// 单个检索后端
#[async_trait(?Send)]
pub trait SearchProvider {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize, dates: &DateRange) -> Result<Vec<ResearchPaper>>;
}

/// 检索与下载共用的HTTP客户端
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

pub fn build_provider(kind: SourceKind, http: &Client) -> Box<dyn SearchProvider> {
    match kind {
        SourceKind::Arxiv => Box::new(ArxivProvider::new(http.clone())),
        SourceKind::SemanticScholar => Box::new(SemanticScholarProvider::new(http.clone())),
        SourceKind::OpenAlex => Box::new(OpenAlexProvider::new(http.clone())),
    }
}

/// 折叠多余空白（标题常跨行）
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
