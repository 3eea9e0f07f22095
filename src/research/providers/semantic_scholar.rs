use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{SearchProvider, collapse_whitespace};
use crate::research::types::{DateRange, ResearchPaper};

const FIELDS: &str = "paperId,title,abstract,authors,url,openAccessPdf,publicationDate";
/// 单次请求的最大条数
const MAX_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    open_access_pdf: Option<S2Pdf>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Pdf {
    #[serde(default)]
    url: Option<String>,
}

impl From<S2Paper> for ResearchPaper {
    fn from(paper: S2Paper) -> Self {
        ResearchPaper {
            url: paper.url.unwrap_or_else(|| {
                format!("https://www.semanticscholar.org/paper/{}", paper.paper_id)
            }),
            pdf_url: paper
                .open_access_pdf
                .and_then(|pdf| pdf.url)
                .filter(|url| !url.is_empty()),
            title: collapse_whitespace(paper.title.as_deref().unwrap_or("Untitled")),
            summary: paper.abstract_text.unwrap_or_default(),
            authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
            source: "semantic_scholar".to_string(),
            id: paper.paper_id,
        }
    }
}

/// Semantic Scholar Graph API
pub struct SemanticScholarProvider {
    http: Client,
    base: String,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    pub const DEFAULT_BASE: &'static str = "https://api.semanticscholar.org/graph/v1/paper/search";

    pub fn new(http: Client) -> Self {
        Self {
            http,
            base: Self::DEFAULT_BASE.to_string(),
            api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }

    /// `publicationDateOrYear` 参数，两端均可为空
    pub fn date_param(dates: &DateRange) -> Option<String> {
        if dates.is_unbounded() {
            return None;
        }
        let fmt = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        Some(format!("{}:{}", fmt(dates.after), fmt(dates.before)))
    }
}

pub fn parse_response(body: &str) -> Result<Vec<ResearchPaper>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("Failed to parse Semantic Scholar response")?;
    Ok(response.data.into_iter().map(ResearchPaper::from).collect())
}

#[async_trait(?Send)]
impl SearchProvider for SemanticScholarProvider {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, query: &str, limit: usize, dates: &DateRange) -> Result<Vec<ResearchPaper>> {
        let mut request = self
            .http
            .get(&self.base)
            .query(&[("query", query), ("fields", FIELDS)])
            .query(&[("limit", limit.clamp(1, MAX_PAGE))]);
        if let Some(range) = Self::date_param(dates) {
            request = request.query(&[("publicationDateOrYear", range)]);
        }
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Semantic Scholar API error: HTTP {}", status));
        }
        let mut papers = parse_response(&resp.text().await?)?;
        papers.truncate(limit);
        Ok(papers)
    }
}
