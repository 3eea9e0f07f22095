use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::research::types::{DateRange, FetchMode, SourceKind};

/// 配置取值错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid date range '{0}', expected YYYY-MM-DD,YYYY-MM-DD")]
    InvalidBetween(String),
    #[error("unknown research source '{0}'")]
    UnknownSource(String),
    #[error("no API key configured and strict mode is enabled")]
    MissingApiKey,
}

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    #[default]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 最终导出格式
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[serde(rename = "pdf")]
    #[default]
    Pdf,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "epub")]
    Epub,
    #[serde(rename = "docx")]
    Docx,
    #[serde(rename = "latex")]
    Latex,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "md")]
    Markdown,
}

impl OutputFormat {
    /// 导出文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Epub => "epub",
            OutputFormat::Docx => "docx",
            OutputFormat::Latex => "tex",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pdf => write!(f, "pdf"),
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Epub => write!(f, "epub"),
            OutputFormat::Docx => write!(f, "docx"),
            OutputFormat::Latex => write!(f, "latex"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "md"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" | "default" => Ok(OutputFormat::Pdf),
            "html" => Ok(OutputFormat::Html),
            "epub" => Ok(OutputFormat::Epub),
            "docx" => Ok(OutputFormat::Docx),
            "latex" | "tex" => Ok(OutputFormat::Latex),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// 应用程序配置，运行期间只读
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 书名
    pub book_name: Option<String>,

    /// 研究目标，参与命名与综述
    pub goal: Option<String>,

    /// 关键词，参与检索与命名
    pub keywords: Option<String>,

    /// 研究语料目录
    pub corpus_path: PathBuf,

    /// 章节输出目录
    pub output_path: PathBuf,

    /// 角色提示词模板目录
    pub prompts_dir: PathBuf,

    /// 写作协议文件，会被前置到每个系统提示词
    pub protocol_path: Option<PathBuf>,

    /// 章节标题，按顺序生成
    pub chapters: Vec<String>,

    /// 导出格式
    pub output_format: OutputFormat,

    /// 自定义导出脚本，未设置时使用pandoc
    pub export_script: Option<PathBuf>,

    /// 论文获取配置
    pub research: ResearchConfig,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 论文获取配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 检索词，未设置时跳过获取阶段
    pub search_query: Option<String>,

    /// 最多保留的论文数
    pub paper_limit: usize,

    /// 只要此日期之后发表的论文
    pub after: Option<chrono::NaiveDate>,

    /// 只要此日期之前发表的论文
    pub before: Option<chrono::NaiveDate>,

    pub fetch_mode: FetchMode,

    /// 检索后端，按顺序查询
    pub sources: Vec<SourceKind>,

    /// 下载前不再询问
    pub auto_confirm: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址，为空时使用provider默认地址
    pub api_base_url: String,

    /// 模型标识
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 单次调用的最大尝试次数
    pub retry_attempts: u32,

    /// 单次运行的token预算
    pub token_budget: usize,

    /// 强制使用离线应答
    pub mock: bool,

    /// 缺少API KEY时报错而不是进入离线模式
    pub strict_mode: bool,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 获取书名，优先使用配置的book_name，否则由关键词或研究目标推断
    pub fn get_book_name(&self) -> String {
        if let Some(ref name) = self.book_name
            && !name.trim().is_empty()
        {
            return name.trim().to_string();
        }

        // 没有书名时由关键词或研究目标推断
        [&self.keywords, &self.goal]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(title_case)
            .unwrap_or_else(|| "Untitled Manuscript".to_string())
    }

    /// 书名对应的文件名主体
    pub fn book_slug(&self) -> String {
        slugify(&self.get_book_name())
    }

    /// 检索时间范围
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.research.after, self.research.before)
    }

    /// 提示词渲染的基础变量，调用方上下文会覆盖同名变量
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("BOOK_NAME".to_string(), self.get_book_name());
        vars.insert(
            "GOAL".to_string(),
            self.goal.clone().unwrap_or_default(),
        );
        vars.insert(
            "KEYWORDS".to_string(),
            self.keywords.clone().unwrap_or_default(),
        );
        vars.insert(
            "SEARCH_QUERY".to_string(),
            self.research.search_query.clone().unwrap_or_default(),
        );
        vars.insert(
            "PAPER_LIMIT".to_string(),
            self.research.paper_limit.to_string(),
        );
        vars.insert("MODEL_NAME".to_string(), self.llm.model.clone());
        vars.insert("OUTPUT_FORMAT".to_string(), self.output_format.to_string());
        vars
    }
}

/// 将书名转换为文件系统安全的小写文件名
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "manuscript".to_string()
    } else {
        slug
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            book_name: None,
            goal: None,
            keywords: None,
            corpus_path: PathBuf::from("./papers"),
            output_path: PathBuf::from("./book_out"),
            prompts_dir: PathBuf::from("./prompts"),
            protocol_path: None,
            chapters: vec![
                "Chapter 1: Foundation".to_string(),
                "Chapter 2: Logic".to_string(),
            ],
            output_format: OutputFormat::default(),
            export_script: None,
            research: ResearchConfig::default(),
            llm: LLMConfig::default(),
            verbose: false,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            search_query: None,
            paper_limit: 5,
            after: None,
            before: None,
            fetch_mode: FetchMode::default(),
            sources: vec![SourceKind::Arxiv],
            auto_confirm: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: default_api_key(),
            api_base_url: String::new(),
            model: String::from("gemini-2.0-flash-exp"),
            max_tokens: 8192,
            temperature: 0.4,
            retry_attempts: 3,
            token_budget: 5_000_000,
            mock: false,
            strict_mode: false,
        }
    }
}

fn default_api_key() -> String {
    ["FACTORY_LLM_API_KEY", "GOOGLE_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_default()
}

// Include tests
#[cfg(test)]
mod tests;
