//! 模型网关 - 提供统一的"向模型提问"接口

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError, LLMConfig};
use crate::utils::cost_guard::{BudgetExceeded, CostGuard};

pub mod offline;
mod providers;
pub mod retry;
pub mod types;

pub use offline::OfflineResponder;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use types::Role;

use providers::ProviderClient;

/// 所有尝试均失败时返回的哨兵文本
pub const CRITICAL_API_FAILURE: &str = "Critical API Failure";

/// 协议参考文本与角色提示词之间的分隔标记
pub const ROLE_MARKER: &str = "### SPECIFIC AGENT ROLE:";

/// 文本生成后端
#[async_trait(?Send)]
pub trait CompletionBackend {
    fn name(&self) -> String;

    /// 响应文本是否计入成本
    fn charges_response(&self) -> bool {
        true
    }

    async fn complete(&self, role: Role, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// 基于rig provider的在线后端
pub struct LiveBackend {
    client: ProviderClient,
    llm: LLMConfig,
}

impl LiveBackend {
    pub fn new(llm: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(llm)
            .with_context(|| format!("Failed to create {} client", llm.provider))?;
        Ok(Self {
            client,
            llm: llm.clone(),
        })
    }
}

#[async_trait(?Send)]
impl CompletionBackend for LiveBackend {
    fn name(&self) -> String {
        format!("{}/{}", self.llm.provider, self.llm.model)
    }

    async fn complete(&self, _role: Role, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let agent = self
            .client
            .create_agent(&self.llm.model, system_prompt, &self.llm);
        agent.prompt(user_prompt).await
    }
}

/// 网关运行模式，由配置与环境决定，调用方无感知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    Offline,
}

impl GatewayMode {
    pub fn resolve(llm: &LLMConfig) -> Result<Self, ConfigError> {
        if llm.mock {
            return Ok(GatewayMode::Offline);
        }
        if llm.api_key.trim().is_empty() && llm.provider != crate::config::LLMProvider::Ollama {
            if llm.strict_mode {
                return Err(ConfigError::MissingApiKey);
            }
            warn!("⚠️ 未找到API KEY，进入离线(MOCK)模式");
            return Ok(GatewayMode::Offline);
        }
        Ok(GatewayMode::Live)
    }
}

/// 模型网关
///
/// 调用前按系统提示词+用户内容记账，在线响应返回后再按响应记账；
/// 传输失败按退避策略重试，全部失败时返回 [`CRITICAL_API_FAILURE`] 而不是错误。
pub struct ModelGateway {
    backend: Box<dyn CompletionBackend>,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    cost_guard: CostGuard,
    protocol: String,
}

impl ModelGateway {
    pub fn new(backend: Box<dyn CompletionBackend>, cost_guard: CostGuard) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            sleeper: Box::new(TokioSleeper),
            cost_guard,
            protocol: String::new(),
        }
    }

    /// 根据配置创建网关
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = &config.llm;
        let backend: Box<dyn CompletionBackend> = match GatewayMode::resolve(llm)? {
            GatewayMode::Live => Box::new(LiveBackend::new(llm)?),
            GatewayMode::Offline => Box::new(OfflineResponder),
        };
        info!("🔌 模型网关: {}", backend.name());

        let protocol = match &config.protocol_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read protocol file: {:?}", path))?,
            None => String::new(),
        };

        Ok(Self::new(backend, CostGuard::new(llm.token_budget))
            .with_retry(RetryPolicy::new(llm.retry_attempts), Box::new(TokioSleeper))
            .with_protocol(protocol))
    }

    pub fn with_retry(mut self, retry: RetryPolicy, sleeper: Box<dyn Sleeper>) -> Self {
        self.retry = retry;
        self.sleeper = sleeper;
        self
    }

    pub fn with_protocol(mut self, protocol: String) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    pub fn cost_guard(&self) -> &CostGuard {
        &self.cost_guard
    }

    /// 协议参考文本 + 角色标记 + 角色提示词
    pub fn compose_system_prompt(&self, role_prompt: &str) -> String {
        format!("{}\n\n{}\n{}", self.protocol, ROLE_MARKER, role_prompt)
    }

    /// 向模型提问，仅在预算超限时返回错误
    pub async fn ask(
        &mut self,
        role: Role,
        role_prompt: &str,
        user_content: &str,
    ) -> Result<String, BudgetExceeded> {
        let system_prompt = self.compose_system_prompt(role_prompt);
        let units = self
            .cost_guard
            .add(&format!("{}{}", system_prompt, user_content))?;
        debug!("💰 {} 请求记账 {} 单位", role, units);

        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            match self
                .backend
                .complete(role, &system_prompt, user_content)
                .await
            {
                Ok(response) => {
                    if self.backend.charges_response() {
                        self.cost_guard.add(&response)?;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    error!(
                        "❌ 调用模型服务出错 ({}): {}，重试中 (第 {} / {}次尝试)",
                        role, err, attempt, max_attempts
                    );
                    if self.retry.should_retry(attempt) {
                        self.sleeper.sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        error!("❌ {} 调用 {} 次均失败", role, max_attempts);
        Ok(CRITICAL_API_FAILURE.to_string())
    }
}
