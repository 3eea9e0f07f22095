use crate::config::{Config, ConfigError, LLMProvider, OutputFormat};
use crate::research::{DateRange, FetchMode, SourceKind};
use crate::utils::cost_guard::BudgetExceeded;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "factory.toml";

/// 进程退出码
pub struct ExitCodes;

impl ExitCodes {
    pub const FAILURE: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const BROKEN: u8 = 3;
    pub const BUDGET: u8 = 4;
    pub const INTERRUPTED: u8 = 130;
}

/// 运行错误对应的退出码
pub fn failure_exit_code(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<BudgetExceeded>().is_some() {
        ExitCodes::BUDGET
    } else if error.downcast_ref::<ConfigError>().is_some() {
        ExitCodes::CONFIG
    } else {
        ExitCodes::FAILURE
    }
}

/// Manuscript Factory - 由文献语料与大模型驱动的书稿生成流水线
#[derive(Parser, Debug)]
#[command(name = "manuscript-factory")]
#[command(
    about = "Turns a corpus of research papers into a multi-chapter manuscript through staged, protocol-checked model calls, with optional multi-source paper acquisition."
)]
#[command(version)]
pub struct Args {
    /// 配置文件路径（默认读取当前目录下的 factory.toml）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 书名
    #[arg(short = 'n', long)]
    pub book_name: Option<String>,

    /// 关键词，缺少书名时用于推断书名
    #[arg(short, long)]
    pub keywords: Option<String>,

    /// 研究目标
    #[arg(short, long)]
    pub goal: Option<String>,

    /// 语料目录（获取的论文也保存在这里）
    #[arg(short, long)]
    pub corpus: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 文献检索语句，设置后先执行文献获取
    #[arg(short, long)]
    pub query: Option<String>,

    /// 获取论文数量上限
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// 获取方式 (fulltext, abstract)
    #[arg(short, long)]
    pub fetch_mode: Option<String>,

    /// 跳过下载确认
    #[arg(short = 'y', long = "yes")]
    pub auto_confirm: bool,

    /// 使用离线应答，不调用模型服务
    #[arg(short, long)]
    pub mock: bool,

    /// 只检索该日期之后发表的论文 (YYYY-MM-DD)
    #[arg(short, long)]
    pub after: Option<String>,

    /// 只检索该日期之前发表的论文 (YYYY-MM-DD)
    #[arg(short, long)]
    pub before: Option<String>,

    /// 日期区间 (YYYY-MM-DD,YYYY-MM-DD)，与 --after/--before 互斥
    #[arg(short = 'B', long, conflicts_with_all = ["after", "before"])]
    pub between: Option<String>,

    /// 检索来源，逗号分隔 (arxiv, semantic_scholar, openalex)
    #[arg(short = 'S', long)]
    pub sources: Option<String>,

    /// 输出格式 (pdf, html, epub, docx, latex, json, md)
    #[arg(short = 'F', long)]
    pub format: Option<String>,

    /// 成本预算（估算单位）
    #[arg(long)]
    pub token_budget: Option<usize>,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// 角色提示词模板目录
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,

    /// 协议参考文件，附加在每个系统提示词之前
    #[arg(long)]
    pub protocol: Option<PathBuf>,

    /// 章节标题，逗号分隔
    #[arg(long, value_delimiter = ',')]
    pub chapters: Option<Vec<String>>,

    /// 缺少API KEY时报错而不是进入离线模式
    #[arg(long)]
    pub strict: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn base_config(&self) -> Result<Config> {
        if let Some(config_path) = &self.config {
            return Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path));
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_config_path.exists() {
            Config::from_file(&default_config_path)
                .with_context(|| format!("无法读取默认配置文件 {:?}", default_config_path))
        } else {
            Ok(Config::default())
        }
    }

    /// 将CLI参数转换为配置，命令行参数覆盖配置文件
    pub fn into_config(self) -> Result<Config> {
        let mut config = self.base_config()?;
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(self, config: &mut Config) -> Result<()> {
        if self.book_name.is_some() {
            config.book_name = self.book_name;
        }
        if self.keywords.is_some() {
            config.keywords = self.keywords;
        }
        if self.goal.is_some() {
            config.goal = self.goal;
        }
        if let Some(corpus) = self.corpus {
            config.corpus_path = corpus;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(prompts_dir) = self.prompts_dir {
            config.prompts_dir = prompts_dir;
        }
        if self.protocol.is_some() {
            config.protocol_path = self.protocol;
        }
        if let Some(chapters) = self.chapters {
            let chapters: Vec<String> = chapters
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !chapters.is_empty() {
                config.chapters = chapters;
            }
        }
        if let Some(format) = self.format {
            config.output_format = format.parse::<OutputFormat>().map_err(|e| anyhow!(e))?;
        }

        // 文献获取
        let research = &mut config.research;
        if self.query.is_some() {
            research.search_query = self.query;
        }
        if let Some(limit) = self.limit {
            research.paper_limit = limit;
        }
        if let Some(mode) = self.fetch_mode {
            research.fetch_mode = mode.parse::<FetchMode>().map_err(|e| anyhow!(e))?;
        }
        if let Some(sources) = self.sources {
            let sources = SourceKind::parse_list(&sources)?;
            if !sources.is_empty() {
                research.sources = sources;
            }
        }
        if let Some(between) = self.between {
            let range = DateRange::parse_between(&between)?;
            research.after = range.after;
            research.before = range.before;
        }
        if let Some(after) = self.after {
            research.after = Some(DateRange::parse_date(&after)?);
        }
        if let Some(before) = self.before {
            research.before = Some(DateRange::parse_date(&before)?);
        }
        if self.auto_confirm {
            research.auto_confirm = true;
        }

        // LLM
        let llm = &mut config.llm;
        if let Some(provider_str) = self.llm_provider {
            llm.provider = provider_str
                .parse::<LLMProvider>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(api_key) = self.llm_api_key {
            llm.api_key = api_key;
        }
        if let Some(base_url) = self.llm_api_base_url {
            llm.api_base_url = base_url;
        }
        if let Some(model) = self.model {
            llm.model = model;
        }
        if let Some(budget) = self.token_budget {
            llm.token_budget = budget;
        }
        if self.mock {
            llm.mock = true;
        }
        if self.strict {
            llm.strict_mode = true;
        }

        if self.verbose {
            config.verbose = true;
        }
        Ok(())
    }
}
