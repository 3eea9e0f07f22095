use serde::{Deserialize, Serialize};

/// 流水线中的模型角色
///
/// 离线应答按角色切换，不依赖提示词文本匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// 规划大纲
    Architect,
    /// 撰写章节
    Writer,
    /// 整体评审，给出 PASS / FAIL
    Critic,
    /// 压缩章节，供下一章作为上下文
    Summarizer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Architect, Role::Writer, Role::Critic, Role::Summarizer];

    /// 模板文件名（不含扩展名）
    pub fn template_name(&self) -> &'static str {
        match self {
            Role::Architect => "architect",
            Role::Writer => "writer",
            Role::Critic => "critic",
            Role::Summarizer => "summarizer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Architect => write!(f, "Architect"),
            Role::Writer => write!(f, "Writer"),
            Role::Critic => write!(f, "Critic"),
            Role::Summarizer => write!(f, "Summarizer"),
        }
    }
}
