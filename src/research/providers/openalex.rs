use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{SearchProvider, collapse_whitespace};
use crate::research::types::{DateRange, ResearchPaper};

const ID_PREFIX: &str = "https://openalex.org/";
const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    primary_location: Option<Location>,
    #[serde(default)]
    open_access: Option<OpenAccess>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Author,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    #[serde(default)]
    oa_url: Option<String>,
}

/// 由倒排索引还原摘要
pub fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();
    words.sort_unstable_by_key(|(position, _)| *position);
    words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

impl From<Work> for ResearchPaper {
    fn from(work: Work) -> Self {
        let id = work
            .id
            .strip_prefix(ID_PREFIX)
            .unwrap_or(&work.id)
            .to_string();
        let location = work.primary_location;
        let pdf_url = location
            .as_ref()
            .and_then(|l| l.pdf_url.clone())
            .or_else(|| work.open_access.and_then(|oa| oa.oa_url))
            .filter(|url| url.to_lowercase().ends_with(".pdf") || url.contains("/pdf"));
        let url = location
            .and_then(|l| l.landing_page_url)
            .or(work.doi)
            .unwrap_or_else(|| work.id.clone());

        ResearchPaper {
            title: collapse_whitespace(work.display_name.as_deref().unwrap_or("Untitled")),
            authors: work
                .authorships
                .into_iter()
                .filter_map(|a| a.author.display_name)
                .collect(),
            summary: work
                .abstract_inverted_index
                .as_ref()
                .map(rebuild_abstract)
                .unwrap_or_default(),
            url,
            pdf_url,
            source: "openalex".to_string(),
            id,
        }
    }
}

pub fn parse_response(body: &str) -> Result<Vec<ResearchPaper>> {
    let response: WorksResponse =
        serde_json::from_str(body).context("Failed to parse OpenAlex response")?;
    Ok(response.results.into_iter().map(ResearchPaper::from).collect())
}

/// OpenAlex works API
pub struct OpenAlexProvider {
    http: Client,
    base: String,
}

impl OpenAlexProvider {
    pub const DEFAULT_BASE: &'static str = "https://api.openalex.org/works";

    pub fn new(http: Client) -> Self {
        Self {
            http,
            base: Self::DEFAULT_BASE.to_string(),
        }
    }

    /// `from_publication_date` / `to_publication_date` 过滤条件
    pub fn date_filter(dates: &DateRange) -> Option<String> {
        let mut filters = Vec::new();
        if let Some(after) = dates.after {
            filters.push(format!("from_publication_date:{}", after.format("%Y-%m-%d")));
        }
        if let Some(before) = dates.before {
            filters.push(format!("to_publication_date:{}", before.format("%Y-%m-%d")));
        }
        (!filters.is_empty()).then(|| filters.join(","))
    }
}

#[async_trait(?Send)]
impl SearchProvider for OpenAlexProvider {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn search(&self, query: &str, limit: usize, dates: &DateRange) -> Result<Vec<ResearchPaper>> {
        let mut request = self
            .http
            .get(&self.base)
            .query(&[("search", query)])
            .query(&[("per-page", limit.clamp(1, MAX_PER_PAGE))]);
        if let Some(filter) = Self::date_filter(dates) {
            request = request.query(&[("filter", filter)]);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("OpenAlex API error: HTTP {}", status));
        }
        let mut papers = parse_response(&resp.text().await?)?;
        papers.truncate(limit);
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_abstract() {
        let mut index = HashMap::new();
        index.insert("agents".to_string(), vec![1]);
        index.insert("Language".to_string(), vec![0]);
        index.insert("plan".to_string(), vec![2, 4]);
        index.insert("and".to_string(), vec![3]);
        assert_eq!(rebuild_abstract(&index), "Language agents plan and plan");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "meta": {"count": 1},
            "results": [{
                "id": "https://openalex.org/W4321",
                "display_name": "ReAct",
                "doi": "https://doi.org/10.1/react",
                "authorships": [{"author": {"display_name": "Shunyu Yao"}}],
                "abstract_inverted_index": {"Reason": [0], "act": [2], "and": [1]},
                "primary_location": {"landing_page_url": "https://arxiv.org/abs/2210.03629", "pdf_url": "https://arxiv.org/pdf/2210.03629"},
                "open_access": {"oa_url": null}
            }]
        }"#;

        let papers = parse_response(body).unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.id, "W4321");
        assert_eq!(paper.summary, "Reason and act");
        assert_eq!(paper.authors, vec!["Shunyu Yao"]);
        assert_eq!(paper.url, "https://arxiv.org/abs/2210.03629");
        assert_eq!(paper.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2210.03629"));
    }

    #[test]
    fn test_landing_page_is_not_a_pdf() {
        let body = r#"{"results": [{
            "id": "https://openalex.org/W1",
            "open_access": {"oa_url": "https://publisher.example/article/1"}
        }]}"#;

        let papers = parse_response(body).unwrap();

        assert!(papers[0].pdf_url.is_none());
        assert_eq!(papers[0].url, "https://openalex.org/W1");
        assert_eq!(papers[0].title, "Untitled");
    }

    #[test]
    fn test_date_filter() {
        assert!(OpenAlexProvider::date_filter(&DateRange::default()).is_none());
        let between = DateRange::parse_between("2020-01-01..2021-12-31").unwrap();
        assert_eq!(
            OpenAlexProvider::date_filter(&between).unwrap(),
            "from_publication_date:2020-01-01,to_publication_date:2021-12-31"
        );
    }
}
