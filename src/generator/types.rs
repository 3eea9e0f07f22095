use serde::{Deserialize, Serialize};

use crate::config::slugify;

/// 评审通过标记
pub const PASS_MARKER: &str = "Status: PASS";

/// 章节身份：标题与顺序，运行前静态确定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpec {
    pub position: usize,
    pub title: String,
}

impl ChapterSpec {
    pub fn enumerate(titles: &[String]) -> Vec<ChapterSpec> {
        titles
            .iter()
            .enumerate()
            .map(|(position, title)| ChapterSpec {
                position,
                title: title.clone(),
            })
            .collect()
    }

    /// 章节输出文件名
    pub fn file_name(&self) -> String {
        format!("{}.md", slugify(&self.title))
    }
}

/// 一次草稿的评审结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Critique(String);

impl Critique {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn fail(reason: &str) -> Self {
        Self(format!("FAIL: {}", reason))
    }

    pub fn passed(&self) -> bool {
        self.0.contains(PASS_MARKER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Critique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    InProgress,
    Ready,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterStatus {
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub chapter: ChapterSpec,
    pub status: ChapterStatus,
}

/// 运行期的章节完成清单，决定是否进入导出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub status: ManifestStatus,
    chapters: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            status: ManifestStatus::InProgress,
            chapters: Vec::new(),
        }
    }

    pub fn mark_ready(&mut self, chapter: &ChapterSpec) {
        if !self.is_ready(&chapter.title) {
            self.chapters.push(ManifestEntry {
                chapter: chapter.clone(),
                status: ChapterStatus::Ready,
            });
        }
    }

    pub fn mark_broken(&mut self) {
        self.status = ManifestStatus::Broken;
    }

    /// 循环结束：仍在进行中则转为READY，BROKEN保持不变
    pub fn finish(&mut self) {
        if self.status == ManifestStatus::InProgress {
            self.status = ManifestStatus::Ready;
        }
    }

    pub fn is_ready(&self, title: &str) -> bool {
        self.chapters
            .iter()
            .any(|entry| entry.chapter.title == title && entry.status == ChapterStatus::Ready)
    }

    /// 按章节顺序返回已完成的章节
    pub fn ready_chapters(&self) -> Vec<&ChapterSpec> {
        let mut ready: Vec<&ChapterSpec> = self
            .chapters
            .iter()
            .filter(|entry| entry.status == ChapterStatus::Ready)
            .map(|entry| &entry.chapter)
            .collect();
        ready.sort_by_key(|chapter| chapter.position);
        ready
    }
}
