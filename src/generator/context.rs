use anyhow::Result;

use crate::config::Config;
use crate::generator::outlet::DiskOutlet;
use crate::generator::prompt::{PromptLibrary, PromptRenderer};
use crate::llm::client::ModelGateway;

/// 生成器上下文：一次运行内共享的配置、模型网关、提示词与输出
pub struct GeneratorContext {
    /// 配置
    pub config: Config,
    /// 模型网关，唯一的模型访问入口，内含成本守卫
    pub gateway: ModelGateway,
    /// 角色提示词模板
    pub prompts: PromptLibrary,
    /// 占位符渲染器
    pub renderer: PromptRenderer,
    /// 章节输出
    pub outlet: DiskOutlet,
}

impl GeneratorContext {
    /// 创建新的生成器上下文
    pub fn new(config: Config) -> Result<Self> {
        let gateway = ModelGateway::from_config(&config)?;
        let prompts = PromptLibrary::load(&config.prompts_dir)?;
        Ok(Self::with_parts(config, gateway, prompts))
    }

    pub fn with_parts(config: Config, gateway: ModelGateway, prompts: PromptLibrary) -> Self {
        let renderer = PromptRenderer::new(config.template_vars());
        let outlet = DiskOutlet::new(config.output_path.clone());
        Self {
            config,
            gateway,
            prompts,
            renderer,
            outlet,
        }
    }
}
