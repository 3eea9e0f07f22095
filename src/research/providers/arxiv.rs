use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::{SearchProvider, collapse_whitespace};
use crate::research::types::{DateRange, ResearchPaper};

/// arXiv 最早的投稿日期，作为缺省下界
const ARXIV_EPOCH: &str = "19910801";

pub struct ArxivProvider {
    http: Client,
    base: String,
}

impl ArxivProvider {
    pub const DEFAULT_BASE: &'static str = "https://export.arxiv.org/api/query";

    pub fn new(http: Client) -> Self {
        Self::with_base(http, Self::DEFAULT_BASE)
    }

    pub fn with_base(http: Client, base: &str) -> Self {
        Self {
            http,
            base: base.to_string(),
        }
    }

    /// 多个词用 AND 连接，日期区间转为 `submittedDate:[... TO ...]`
    pub fn build_query(query: &str, dates: &DateRange) -> String {
        let toks: Vec<String> = query
            .split_whitespace()
            .map(|t| format!("all:{}", t))
            .collect();
        let mut parts = vec![if toks.is_empty() {
            "all:*".to_string()
        } else {
            toks.join(" AND ")
        }];
        if let Some(clause) = Self::date_clause(dates, chrono::Utc::now().date_naive()) {
            parts.push(clause);
        }
        parts.join(" AND ")
    }

    fn date_clause(dates: &DateRange, today: NaiveDate) -> Option<String> {
        if dates.is_unbounded() {
            return None;
        }
        let from = dates
            .after
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| ARXIV_EPOCH.to_string());
        let to = dates.before.unwrap_or(today).format("%Y%m%d");
        Some(format!("submittedDate:[{}0000 TO {}2359]", from, to))
    }
}

#[async_trait(?Send)]
impl SearchProvider for ArxivProvider {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(&self, query: &str, limit: usize, dates: &DateRange) -> Result<Vec<ResearchPaper>> {
        let search_query = Self::build_query(query, dates);
        debug!("arXiv search_query={}", search_query);
        let resp = self
            .http
            .get(&self.base)
            .query(&[("search_query", search_query.as_str())])
            .query(&[("start", 0), ("max_results", limit)])
            .query(&[("sortBy", "relevance"), ("sortOrder", "descending")])
            .header(ACCEPT, "application/atom+xml, application/xml;q=0.9")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("arXiv API error: HTTP {}", status));
        }
        let text = resp.text().await?;
        let mut papers = parse_atom_feed(&text)?;
        papers.truncate(limit);
        Ok(papers)
    }
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

/// `http://arxiv.org/abs/2501.01234v2` -> `2501.01234`，旧式 `hep-th/9901001v1` 保留分类前缀
pub fn normalize_id(raw: &str) -> String {
    let raw = raw.trim();
    let id = match raw.find("/abs/") {
        Some(ix) => &raw[ix + "/abs/".len()..],
        None => raw.rsplit('/').next().unwrap_or(raw),
    };
    let id = id.strip_prefix("arXiv:").unwrap_or(id);
    match id.rsplit_once('v') {
        Some((core, version))
            if !core.is_empty()
                && !version.is_empty()
                && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            core.to_string()
        }
        _ => id.to_string(),
    }
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    authors: Vec<String>,
    html_url: Option<String>,
    pdf_url: Option<String>,
}

impl EntryBuilder {
    fn read_link(&mut self, e: &BytesStart) {
        let mut rel = None;
        let mut href = None;
        let mut typ = None;
        let mut title = None;
        for a in e.attributes().flatten() {
            let v = String::from_utf8_lossy(&a.value).to_string();
            match a.key.as_ref() {
                b"rel" => rel = Some(v),
                b"href" => href = Some(v),
                b"type" => typ = Some(v),
                b"title" => title = Some(v),
                _ => {}
            }
        }
        let Some(href) = href else { return };
        let is_pdf = typ.as_deref().is_some_and(|t| t.contains("pdf"))
            || title.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("pdf"));
        if is_pdf && self.pdf_url.is_none() {
            self.pdf_url = Some(href);
        } else if rel.as_deref() == Some("alternate") && self.html_url.is_none() {
            self.html_url = Some(href);
        }
    }

    fn build(self) -> ResearchPaper {
        let id = normalize_id(&self.id);
        ResearchPaper {
            url: self
                .html_url
                .unwrap_or_else(|| format!("https://arxiv.org/abs/{}", id)),
            pdf_url: Some(
                self.pdf_url
                    .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", id)),
            ),
            title: collapse_whitespace(&self.title),
            summary: collapse_whitespace(&self.summary),
            authors: self.authors,
            source: "arxiv".to_string(),
            id,
        }
    }
}

/// 解析 arXiv Atom 响应
pub fn parse_atom_feed(xml: &str) -> Result<Vec<ResearchPaper>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    let mut entry: Option<EntryBuilder> = None;
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"entry" {
                    entry = Some(EntryBuilder::default());
                    text_target = None;
                } else if let Some(current) = entry.as_mut() {
                    match local {
                        b"id" => text_target = Some("id"),
                        b"title" => text_target = Some("title"),
                        b"summary" => text_target = Some("summary"),
                        b"name" => text_target = Some("author"),
                        b"link" => current.read_link(&e),
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"link"
                    && let Some(current) = entry.as_mut()
                {
                    current.read_link(&e);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(tag), Some(current)) = (text_target.take(), entry.as_mut()) {
                    let txt = t.unescape().unwrap_or_default().to_string();
                    match tag {
                        "id" => current.id = txt,
                        "title" => current.title = txt,
                        "summary" => current.summary = txt,
                        "author" => current.authors.push(txt),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                text_target = None;
                let name = e.name();
                if local_name(name.as_ref()) == b"entry"
                    && let Some(done) = entry.take()
                {
                    out.push(done.build());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2501.01234v2</id>
    <title>Tool Use in
      Language Agents</title>
    <summary>We study tool use &amp; planning.</summary>
    <author><name>Doe, J.</name></author>
    <author><name>Smith, A.</name></author>
    <link rel="alternate" type="text/html" href="https://arxiv.org/abs/2501.01234v2"/>
    <link title="pdf" href="https://arxiv.org/pdf/2501.01234v2" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <title>Old Style</title>
    <summary>Legacy identifier.</summary>
    <author><name>Solo</name></author>
  </entry>
</feed>
"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_atom_feed(SAMPLE).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.id, "2501.01234");
        assert_eq!(first.title, "Tool Use in Language Agents");
        assert_eq!(first.summary, "We study tool use & planning.");
        assert_eq!(first.authors, vec!["Doe, J.", "Smith, A."]);
        assert_eq!(first.url, "https://arxiv.org/abs/2501.01234v2");
        assert_eq!(first.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2501.01234v2"));
        assert_eq!(first.source, "arxiv");

        let legacy = &papers[1];
        assert_eq!(legacy.id, "hep-th/9901001");
        assert_eq!(legacy.pdf_url.as_deref(), Some("https://arxiv.org/pdf/hep-th/9901001"));
        assert_eq!(legacy.safe_id(), "hep-th_9901001");
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("2401.00001"), "2401.00001");
        assert_eq!(normalize_id("arXiv:2401.00001v3"), "2401.00001");
        assert_eq!(normalize_id("http://arxiv.org/abs/solv-int/9901001v1"), "solv-int/9901001");
    }

    #[test]
    fn test_build_query_with_dates() {
        let dates = DateRange::parse_between("2023-01-01..2023-06-30").unwrap();
        assert_eq!(
            ArxivProvider::build_query("agent planning", &dates),
            "all:agent AND all:planning AND submittedDate:[202301010000 TO 202306302359]"
        );
        assert_eq!(
            ArxivProvider::build_query("agents", &DateRange::default()),
            "all:agents"
        );
    }

    #[test]
    fn test_open_ended_date_clause() {
        let after = DateRange::new(DateRange::parse_date("2024-02-01").ok(), None);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            ArxivProvider::date_clause(&after, today).unwrap(),
            "submittedDate:[202402010000 TO 202403012359]"
        );

        let before = DateRange::new(None, DateRange::parse_date("2000-01-01").ok());
        assert_eq!(
            ArxivProvider::date_clause(&before, today).unwrap(),
            "submittedDate:[199108010000 TO 200001012359]"
        );
    }
}
