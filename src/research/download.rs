use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::research::types::{DownloadOutcome, FetchMode, ResearchPaper};

/// 全文下载能力
#[async_trait(?Send)]
pub trait PdfFetcher {
    /// 把 `url` 的内容写入 `dest`，失败时不得留下 `dest`
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// 基于reqwest的流式下载，先写 `.part` 临时文件，完成后重命名
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

async fn stream_body(resp: &mut reqwest::Response, file: &mut tokio::fs::File) -> Result<usize> {
    let mut written = 0usize;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait(?Send)]
impl PdfFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let mut resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("PDF fetch error: HTTP {}", status));
        }

        let part = part_path(dest);
        let mut file = tokio::fs::File::create(&part)
            .await
            .with_context(|| format!("Failed to create {:?}", part))?;
        let written = match stream_body(&mut resp, &mut file).await {
            Ok(written) => written,
            Err(err) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(err);
            }
        };
        drop(file);
        if written == 0 {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(anyhow!("Empty response body from {}", url));
        }

        tokio::fs::rename(&part, dest)
            .await
            .with_context(|| format!("Failed to move {:?} into place", part))?;
        debug!("下载完成 {} 字节 -> {}", written, dest.display());
        Ok(())
    }
}

/// 已存在且非空的文件视为已满足
pub fn is_satisfied(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn write_abstract(paper: &ResearchPaper, dir: &Path) -> Result<DownloadOutcome> {
    let path = dir.join(format!("{}.md", paper.safe_id()));
    if is_satisfied(&path) {
        debug!("摘要已存在，跳过: {}", path.display());
        return Ok(DownloadOutcome::AlreadyPresent(path));
    }
    std::fs::write(&path, paper.abstract_record())
        .with_context(|| format!("Failed to write abstract: {:?}", path))?;
    Ok(DownloadOutcome::AbstractWritten(path))
}

/// 获取单篇论文：全文优先，失败回退为摘要；已有文件直接跳过
pub async fn acquire_paper(
    paper: &ResearchPaper,
    dir: &Path,
    mode: FetchMode,
    fetcher: &dyn PdfFetcher,
) -> Result<DownloadOutcome> {
    let pdf_url = match (mode, paper.pdf_url.as_deref()) {
        (FetchMode::Fulltext, Some(url)) if !url.is_empty() => url,
        _ => return write_abstract(paper, dir),
    };

    let pdf_path = dir.join(format!("{}.pdf", paper.safe_id()));
    if is_satisfied(&pdf_path) {
        debug!("全文已存在，跳过: {}", pdf_path.display());
        return Ok(DownloadOutcome::AlreadyPresent(pdf_path));
    }

    info!("⬇️ 下载 {} ({})", paper.title, pdf_url);
    match fetcher.fetch(pdf_url, &pdf_path).await {
        Ok(()) => Ok(DownloadOutcome::Downloaded(pdf_path)),
        Err(err) => {
            warn!("⚠️ 全文下载失败，改为保存摘要: {} ({})", paper.id, err);
            write_abstract(paper, dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// 记录调用，可选择失败
    #[derive(Default)]
    struct FakeFetcher {
        fail: bool,
        urls: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl PdfFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            self.urls.borrow_mut().push(url.to_string());
            if self.fail {
                anyhow::bail!("HTTP 503");
            }
            std::fs::write(dest, b"%PDF-1.7")?;
            Ok(())
        }
    }

    fn paper(pdf_url: Option<&str>) -> ResearchPaper {
        ResearchPaper {
            id: "2401.00001".to_string(),
            title: "Agents".to_string(),
            authors: vec!["Ada".to_string()],
            summary: "About agents.".to_string(),
            url: "https://arxiv.org/abs/2401.00001".to_string(),
            pdf_url: pdf_url.map(str::to_string),
            source: "arxiv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fulltext_download() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::default();

        let outcome = acquire_paper(&paper(Some("https://x/p.pdf")), dir.path(), FetchMode::Fulltext, &fetcher)
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Downloaded(dir.path().join("2401.00001.pdf")));
        assert_eq!(fetcher.urls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_nonempty_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2401.00001.pdf"), b"%PDF").unwrap();
        let fetcher = FakeFetcher::default();

        let outcome = acquire_paper(&paper(Some("https://x/p.pdf")), dir.path(), FetchMode::Fulltext, &fetcher)
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::AlreadyPresent(_)));
        assert!(fetcher.urls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_downloaded_again() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2401.00001.pdf"), b"").unwrap();
        let fetcher = FakeFetcher::default();

        let outcome = acquire_paper(&paper(Some("https://x/p.pdf")), dir.path(), FetchMode::Fulltext, &fetcher)
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::Downloaded(_)));
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_abstract() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };

        let outcome = acquire_paper(&paper(Some("https://x/p.pdf")), dir.path(), FetchMode::Fulltext, &fetcher)
            .await
            .unwrap();

        let path = dir.path().join("2401.00001.md");
        assert_eq!(outcome, DownloadOutcome::AbstractWritten(path.clone()));
        assert!(std::fs::read_to_string(path).unwrap().contains("## Abstract"));
        assert!(!dir.path().join("2401.00001.pdf").exists());
    }

    #[tokio::test]
    async fn test_abstract_mode_never_fetches() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::default();
        let paper = paper(Some("https://x/p.pdf"));

        let first = acquire_paper(&paper, dir.path(), FetchMode::Abstract, &fetcher).await.unwrap();
        let second = acquire_paper(&paper, dir.path(), FetchMode::Abstract, &fetcher).await.unwrap();

        assert!(matches!(first, DownloadOutcome::AbstractWritten(_)));
        assert!(matches!(second, DownloadOutcome::AlreadyPresent(_)));
        assert!(fetcher.urls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pdf_url_writes_abstract() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::default();

        let outcome = acquire_paper(&paper(None), dir.path(), FetchMode::Fulltext, &fetcher)
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::AbstractWritten(_)));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("/a/b.pdf")), PathBuf::from("/a/b.pdf.part"));
    }
}
