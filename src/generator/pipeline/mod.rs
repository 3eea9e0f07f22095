//! 章节生成状态机
//!
//! Architect 先给出大纲，随后逐章执行 Writer → 关卡 → Critic 的重试循环，
//! 通过的章节转义后落盘并交给 Summarizer 压缩为下一章的上下文。
//! 任一章节耗尽重试次数即整体标记为 BROKEN 并停止，后续章节不再尝试。

use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::types::{ChapterSpec, Critique, Manifest};
use crate::generator::validators::{self, GateOutcome};
use crate::llm::client::Role;

/// 每章最多尝试次数
pub const MAX_ATTEMPTS: u32 = 3;
/// 每隔多少章重新规划一次大纲
pub const REPLAN_INTERVAL: usize = 5;
/// 架构师输出中没有大纲时使用的占位大纲
pub const DEFAULT_OUTLINE: &str = "Default Outline";
/// 架构师输出中没有来源标记时的期望引用数
pub const DEFAULT_REFERENCE_SLOTS: usize = 3;

const OUTLINE_HEADING: &str = "## Outline";

static SOURCE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<source\s+id\s*=\s*['"]?([^'"\s>]+)"#).expect("valid source tag regex")
});

/// 架构师产出的大纲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
    pub outline: String,
    /// 综合矩阵中不同来源的数量，作为引用关卡的期望值
    pub reference_slots: usize,
}

impl Blueprint {
    pub fn from_architect(output: &str) -> Self {
        let outline = output
            .find(OUTLINE_HEADING)
            .map(|idx| output[idx + OUTLINE_HEADING.len()..].trim().to_string())
            .filter(|outline| !outline.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTLINE.to_string());

        let sources: BTreeSet<&str> = SOURCE_TAG
            .captures_iter(output)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        let reference_slots = if sources.is_empty() {
            DEFAULT_REFERENCE_SLOTS
        } else {
            sources.len()
        };

        Self {
            outline,
            reference_slots,
        }
    }
}

/// 单章状态
#[derive(Debug)]
enum DraftState {
    Drafting { attempt: u32 },
    Validating { attempt: u32, draft: String },
    Retry { attempt: u32 },
    Passed { attempt: u32, draft: String },
    Exhausted,
}

/// 单章执行记录
#[derive(Debug, Clone)]
pub struct ChapterRun {
    pub chapter: ChapterSpec,
    /// 实际调用Writer的次数
    pub attempts: u32,
    pub critiques: Vec<String>,
    pub saved_to: Option<PathBuf>,
}

impl ChapterRun {
    pub fn passed(&self) -> bool {
        self.saved_to.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub manifest: Manifest,
    pub runs: Vec<ChapterRun>,
    pub blueprint: Blueprint,
}

/// 把语料文件列表整理为Architect可读的上下文
pub fn corpus_context(documents: &[PathBuf]) -> String {
    if documents.is_empty() {
        return "No corpus documents available; rely on established literature.".to_string();
    }
    documents
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| format!("- {}", name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Pipeline<'a> {
    context: &'a mut GeneratorContext,
    corpus_context: String,
}

impl<'a> Pipeline<'a> {
    pub fn new(context: &'a mut GeneratorContext, corpus_context: String) -> Self {
        Self {
            context,
            corpus_context,
        }
    }

    /// 执行完整流水线，仅在预算超限或落盘失败时返回错误
    pub async fn run(mut self) -> Result<PipelineOutcome> {
        let chapters = ChapterSpec::enumerate(&self.context.config.chapters);
        let mut manifest = Manifest::new();
        let mut runs = Vec::with_capacity(chapters.len());

        info!("🏛️ Architect 规划大纲...");
        let mut blueprint = self.plan("None", "None").await?;
        debug!(
            "大纲 {} 字符，期望引用 {} 个",
            blueprint.outline.len(),
            blueprint.reference_slots
        );

        let mut previous_summary = String::from("None");

        for chapter in &chapters {
            if chapter.position > 0 && chapter.position % REPLAN_INTERVAL == 0 {
                info!("🔁 第 {} 章前重新规划大纲", chapter.position + 1);
                let progress = self.progress_report(&manifest, &previous_summary);
                blueprint = self.plan(&progress, &blueprint.outline).await?;
            }

            info!("✍️ 开始撰写: {}", chapter.title);
            let (mut run, draft) = self
                .draft_chapter(chapter, &blueprint, &previous_summary)
                .await?;

            match draft {
                Some(draft) => {
                    run.saved_to = Some(self.context.outlet.save_chapter(chapter, &draft)?);
                    manifest.mark_ready(chapter);
                    previous_summary = self.summarize(&draft).await?;
                    runs.push(run);
                }
                None => {
                    error!(
                        "🚫 {} 在 {} 次尝试后仍未通过，停止后续章节",
                        chapter.title, MAX_ATTEMPTS
                    );
                    manifest.mark_broken();
                    runs.push(run);
                    break;
                }
            }
        }

        manifest.finish();
        Ok(PipelineOutcome {
            manifest,
            runs,
            blueprint,
        })
    }

    fn progress_report(&self, manifest: &Manifest, previous_summary: &str) -> String {
        let done = manifest
            .ready_chapters()
            .iter()
            .map(|chapter| format!("- {} (READY)", chapter.title))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nLatest summary:\n{}", done, previous_summary)
    }

    async fn plan(&mut self, progress: &str, current_blueprint: &str) -> Result<Blueprint> {
        let role_prompt = self.context.renderer.render(
            self.context.prompts.template(Role::Architect),
            &[
                ("CORPUS_CONTEXT", self.corpus_context.as_str()),
                ("PREVIOUS_PROGRESS", progress),
                ("CURRENT_BLUEPRINT", current_blueprint),
            ],
        );
        let output = self
            .context
            .gateway
            .ask(Role::Architect, &role_prompt, "Design blueprint.")
            .await?;
        Ok(Blueprint::from_architect(&output))
    }

    /// 单章重试循环，返回执行记录与通过的草稿
    async fn draft_chapter(
        &mut self,
        chapter: &ChapterSpec,
        blueprint: &Blueprint,
        previous_summary: &str,
    ) -> Result<(ChapterRun, Option<String>)> {
        let mut writer_prompt = self.context.renderer.render(
            self.context.prompts.template(Role::Writer),
            &[
                ("CHAPTER_TITLE", chapter.title.as_str()),
                ("BLUEPRINT", blueprint.outline.as_str()),
                ("PREVIOUS_CHAPTER_SUMMARY", previous_summary),
            ],
        );
        let mut critiques: Vec<String> = Vec::new();
        let mut state = DraftState::Drafting { attempt: 0 };

        loop {
            state = match state {
                DraftState::Drafting { attempt } => {
                    debug!("{} 第 {} 次起草", chapter.title, attempt + 1);
                    let draft = self
                        .context
                        .gateway
                        .ask(
                            Role::Writer,
                            &writer_prompt,
                            &format!("Draft {}", chapter.title),
                        )
                        .await?;
                    DraftState::Validating { attempt, draft }
                }
                DraftState::Validating { attempt, draft } => {
                    let critique = self
                        .review(&draft, blueprint.reference_slots, &critiques)
                        .await?;
                    critiques.push(critique.to_string());
                    if critique.passed() {
                        DraftState::Passed { attempt, draft }
                    } else {
                        warn!("⚠️ {} 未通过: {}", chapter.title, critique);
                        writer_prompt
                            .push_str(&format!("\n\nLATEST PROTOCOL FEEDBACK: {}", critique));
                        let next = attempt + 1;
                        if next >= MAX_ATTEMPTS {
                            DraftState::Exhausted
                        } else {
                            DraftState::Retry { attempt: next }
                        }
                    }
                }
                DraftState::Retry { attempt } => {
                    info!(
                        "🔄 {} 重试 (第 {} / {} 次尝试)",
                        chapter.title,
                        attempt + 1,
                        MAX_ATTEMPTS
                    );
                    DraftState::Drafting { attempt }
                }
                DraftState::Passed { attempt, draft } => {
                    info!("✅ {} 通过 (第 {} 次尝试)", chapter.title, attempt + 1);
                    let run = ChapterRun {
                        chapter: chapter.clone(),
                        attempts: attempt + 1,
                        critiques,
                        saved_to: None,
                    };
                    return Ok((run, Some(draft)));
                }
                DraftState::Exhausted => {
                    let run = ChapterRun {
                        chapter: chapter.clone(),
                        attempts: MAX_ATTEMPTS,
                        critiques,
                        saved_to: None,
                    };
                    return Ok((run, None));
                }
            };
        }
    }

    /// 先过确定性关卡，全部通过后才交给Critic
    async fn review(&mut self, draft: &str, expected_refs: usize, history: &[String]) -> Result<Critique> {
        if let GateOutcome::Rejected { gate, reason } = validators::run_gates(draft, expected_refs) {
            debug!("关卡 {} 拒绝草稿", gate);
            return Ok(Critique::fail(&reason));
        }

        let previous = if history.is_empty() {
            "None".to_string()
        } else {
            history.join("\n")
        };
        let role_prompt = self.context.renderer.render(
            self.context.prompts.template(Role::Critic),
            &[("PREVIOUS_CRITIQUES", previous.as_str())],
        );
        let verdict = self
            .context
            .gateway
            .ask(Role::Critic, &role_prompt, draft)
            .await?;
        Ok(Critique::new(verdict))
    }

    async fn summarize(&mut self, draft: &str) -> Result<String> {
        let role_prompt = self.context.renderer.render(
            self.context.prompts.template(Role::Summarizer),
            &[("CHAPTER_CONTENT", draft)],
        );
        let summary = self
            .context
            .gateway
            .ask(Role::Summarizer, &role_prompt, "Summarize.")
            .await?;
        Ok(summary)
    }
}

/// 执行生成流水线
pub async fn execute(context: &mut GeneratorContext, documents: &[PathBuf]) -> Result<PipelineOutcome> {
    Pipeline::new(context, corpus_context(documents)).run().await
}
