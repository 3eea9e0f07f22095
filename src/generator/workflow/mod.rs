use crate::config::Config;
use crate::generator::context::GeneratorContext;
use crate::generator::outlet::{ExportOutcome, Exporter};
use crate::generator::pipeline::{self, PipelineOutcome};
use crate::generator::types::ManifestStatus;
use crate::research::{AcquisitionReport, AcquisitionRequest, ResearchEngine};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<String, Instant>,
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        self.phase_durations.push((phase_name.to_string(), duration));
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 按结束顺序返回各阶段的执行时间
    pub fn get_phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.get_total_duration().as_secs_f64()
        );

        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const ACQUISITION: &'static str = "acquisition";
    pub const CORPUS_SCAN: &'static str = "corpus_scan";
    pub const GENERATION: &'static str = "generation";
    pub const EXPORT: &'static str = "export";
}

/// 一次运行的结果
#[derive(Debug)]
pub struct RunReport {
    pub acquisition: Option<AcquisitionReport>,
    pub corpus: Vec<PathBuf>,
    pub outcome: PipelineOutcome,
    pub master_file: Option<PathBuf>,
    pub export: Option<ExportOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.manifest.status == ManifestStatus::Ready
    }
}

/// 扫描语料目录下的pdf与markdown文件，按路径排序
pub fn scan_corpus(corpus_dir: &Path) -> Result<Vec<PathBuf>> {
    if !corpus_dir.is_dir() {
        warn!("⚠️ 语料目录不存在: {}", corpus_dir.display());
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for extension in ["pdf", "md"] {
        let pattern = corpus_dir.join("**").join(format!("*.{}", extension));
        let pattern = pattern.to_string_lossy();
        for entry in glob::glob(&pattern)
            .with_context(|| format!("Invalid corpus pattern: {}", pattern))?
        {
            match entry {
                Ok(path) if path.is_file() => documents.push(path),
                Ok(_) => {}
                Err(e) => warn!("⚠️ 无法读取语料文件: {}", e),
            }
        }
    }
    documents.sort();
    Ok(documents)
}

async fn acquire(config: &Config, query: &str) -> Option<AcquisitionReport> {
    let request = AcquisitionRequest {
        query: query.to_string(),
        limit: config.research.paper_limit,
        date_range: config.date_range(),
        fetch_mode: config.research.fetch_mode,
        auto_confirm: config.research.auto_confirm,
        sources: config.research.sources.clone(),
    };

    let mut engine = match ResearchEngine::from_config(config) {
        Ok(engine) => engine,
        Err(e) => {
            warn!("⚠️ 文献获取模块不可用，跳过: {}", e);
            return None;
        }
    };

    match engine.search_and_download(&request).await {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("⚠️ 文献获取失败，继续使用已有语料: {}", e);
            None
        }
    }
}

/// 启动书稿生成工作流
pub async fn launch(config: &Config) -> Result<RunReport> {
    let mut timing = TimingScope::new();

    let acquisition = match config
        .research
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        Some(query) => {
            timing.start_phase(TimingKeys::ACQUISITION);
            let report = acquire(config, query).await;
            timing.end_phase(TimingKeys::ACQUISITION);
            report
        }
        None => None,
    };

    timing.start_phase(TimingKeys::CORPUS_SCAN);
    let corpus = scan_corpus(&config.corpus_path)?;
    timing.end_phase(TimingKeys::CORPUS_SCAN);
    if corpus.is_empty() {
        warn!("⚠️ 语料为空，仅依赖模型自身知识生成");
    } else {
        info!("📂 语料文件 {} 个", corpus.len());
    }

    let mut context = GeneratorContext::new(config.clone())?;

    timing.start_phase(TimingKeys::GENERATION);
    let outcome = pipeline::execute(&mut context, &corpus).await?;
    timing.end_phase(TimingKeys::GENERATION);
    info!(
        "💰 预算消耗 {} / {}",
        context.gateway.cost_guard().consumed(),
        context.gateway.cost_guard().budget()
    );

    let mut master_file = None;
    let mut export = None;
    if outcome.manifest.status == ManifestStatus::Ready {
        timing.start_phase(TimingKeys::EXPORT);
        let master = context.outlet.stitch(config, &outcome.manifest)?;
        context.outlet.write_bibliography(&config.corpus_path)?;
        let exported = Exporter::export(config, &outcome.manifest, &master).await?;
        info!("📦 导出结果: {:?}", exported);
        master_file = Some(master);
        export = Some(exported);
        timing.end_phase(TimingKeys::EXPORT);
    } else {
        error!("🚫 ABORTED: Incomplete Manifest.");
    }

    info!("\n{}", timing.generate_timing_report());

    Ok(RunReport {
        acquisition,
        corpus,
        outcome,
        master_file,
        export,
    })
}

#[cfg(test)]
mod tests;
