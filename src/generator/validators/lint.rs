use regex::Regex;
use std::sync::LazyLock;

/// 禁用词表
pub const BANNED_PHRASES: [&str; 7] = [
    "delve",
    "showcase",
    "underscore",
    "testament",
    "rich tapestry",
    "landscape",
    "pave the way",
];

static BANNED_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BANNED_PHRASES
        .iter()
        .map(|phrase| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
            (*phrase, Regex::new(&pattern).expect("valid banned phrase regex"))
        })
        .collect()
});

static PASSIVE_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\b(is|am|are|was|were|be|been|being)\b\s+\b([a-z]+ed)\b")
            .expect("valid passive voice regex"),
        Regex::new(r"(?i)\b(has|have|had)\b\s+been\s+\b([a-z]+ed)\b")
            .expect("valid passive voice regex"),
    ]
});

/// 词法检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    /// 命中禁用词，阻断
    pub violations: Vec<String>,
    /// 被动语态提示，不阻断
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn lint(text: &str) -> LintReport {
    let violations = BANNED_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(phrase, _)| format!("Anti-Slop Violation: Banned word '{}' found.", phrase))
        .collect();

    LintReport {
        violations,
        warnings: passive_voice_warnings(text),
    }
}

/// 每条模式最多一条提示
pub fn passive_voice_warnings(text: &str) -> Vec<String> {
    PASSIVE_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.find(text))
        .map(|m| {
            format!(
                "Passive Voice Warning: '{}'. Consider active voice.",
                m.as_str()
            )
        })
        .collect()
}
