//! 角色提示词模板与 `{{KEY}}` 占位符渲染

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::llm::client::Role;

const ARCHITECT_TEMPLATE: &str = r#"# The Architect

You plan the book "{{BOOK_NAME}}".
Goal: {{GOAL}}
Keywords: {{KEYWORDS}}

## Corpus
{{CORPUS_CONTEXT}}

## Progress so far
{{PREVIOUS_PROGRESS}}

## Current blueprint
{{CURRENT_BLUEPRINT}}

## Instructions
1. Build a <synthesis_matrix> that groups the corpus by topic. Tag every source as <source id='N'>claim</source>.
2. Finish with a section that starts with the exact heading `## Outline` followed by one bullet per chapter.
3. Keep chapters that are already written unchanged in the outline.
"#;

const WRITER_TEMPLATE: &str = r#"# The Writer

Write the chapter "{{CHAPTER_TITLE}}" of "{{BOOK_NAME}}".

## Blueprint
{{BLUEPRINT}}

## Previous chapter summary
{{PREVIOUS_CHAPTER_SUMMARY}}

## Rules
- Cite at least three distinct sources with numeric markers such as [1], [2], [3].
- Prefer active voice.
- Never use: delve, showcase, underscore, testament, rich tapestry, landscape, pave the way.
- Mermaid diagrams must have balanced brackets and parentheses.
"#;

const CRITIC_TEMPLATE: &str = r#"# The Critic

Review the chapter for technical accuracy, structure and citation discipline.

## Earlier critiques
{{PREVIOUS_CRITIQUES}}

Reply with `Status: PASS` when the chapter is publishable.
Otherwise reply with `Status: FAIL` and a numbered list of concrete fixes.
"#;

const SUMMARIZER_TEMPLATE: &str = r#"# The Summarizer

Compress the chapter below into a dense summary for the next chapter's author.
Preserve every citation marker such as [1] exactly as written.

## Chapter
{{CHAPTER_CONTENT}}
"#;

/// 角色模板库
///
/// 优先读取 `<prompts_dir>/<role>.md`，不存在时使用内置模板。
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<Role, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        let templates = Role::ALL
            .into_iter()
            .map(|role| (role, Self::builtin_template(role).to_string()))
            .collect();
        Self { templates }
    }

    pub fn builtin_template(role: Role) -> &'static str {
        match role {
            Role::Architect => ARCHITECT_TEMPLATE,
            Role::Writer => WRITER_TEMPLATE,
            Role::Critic => CRITIC_TEMPLATE,
            Role::Summarizer => SUMMARIZER_TEMPLATE,
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let mut library = Self::builtin();
        for role in Role::ALL {
            let path = dir.join(format!("{}.md", role.template_name()));
            if path.is_file() {
                let template = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt template: {:?}", path))?;
                info!("📝 使用自定义提示词模板: {}", path.display());
                library.templates.insert(role, template);
            } else {
                debug!("{} 使用内置提示词模板", role);
            }
        }
        Ok(library)
    }

    pub fn template(&self, role: Role) -> &str {
        self.templates
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| Self::builtin_template(role))
    }
}

/// 占位符渲染器，持有配置派生的基础变量
#[derive(Debug, Clone, Default)]
pub struct PromptRenderer {
    base: BTreeMap<String, String>,
}

impl PromptRenderer {
    pub fn new(base: BTreeMap<String, String>) -> Self {
        Self { base }
    }

    /// 合并基础变量与调用上下文（上下文优先）后替换 `{{KEY}}`，未知占位符原样保留
    pub fn render(&self, template: &str, context: &[(&str, &str)]) -> String {
        let mut vars: BTreeMap<&str, &str> = self
            .base
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (key, value) in context {
            vars.insert(*key, *value);
        }

        let mut rendered = template.to_string();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
        }
        rendered
    }
}
