use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid citation marker regex"));

/// 引用标记去重后的最低数量
pub const MIN_UNIQUE_CITATIONS: usize = 3;

/// 引用审计结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationAudit {
    pub unique_markers: usize,
    pub expected: usize,
}

impl CitationAudit {
    /// 期望引用数不足门槛时不做要求
    pub fn passed(&self) -> bool {
        self.expected < MIN_UNIQUE_CITATIONS || self.unique_markers >= MIN_UNIQUE_CITATIONS
    }

    pub fn gap_reason(&self) -> Option<String> {
        if self.passed() {
            return None;
        }
        Some(format!(
            "Citation Shield Gap: Only {} unique sources cited (Target: {}+).",
            self.unique_markers, MIN_UNIQUE_CITATIONS
        ))
    }
}

/// 统计去重后的 `[n]` 引用标记
///
/// `expected` 为大纲中的来源数量；门槛固定为 [`MIN_UNIQUE_CITATIONS`]，
/// 只有期望值达到门槛时才会拒绝。
pub fn audit(text: &str, expected: usize) -> CitationAudit {
    let unique: BTreeSet<&str> = CITATION_MARKER
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();
    CitationAudit {
        unique_markers: unique.len(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_count_once() {
        let result = audit("See [1]. Again [1]. And [2].", 3);
        assert_eq!(result.unique_markers, 2);
        assert!(!result.passed());
        assert_eq!(
            result.gap_reason().unwrap(),
            "Citation Shield Gap: Only 2 unique sources cited (Target: 3+)."
        );
    }

    #[test]
    fn test_three_distinct_markers_pass() {
        let result = audit("Claims [1], [2] and [13].", 3);
        assert!(result.passed());
        assert!(result.gap_reason().is_none());
    }

    #[test]
    fn test_non_numeric_brackets_are_ignored() {
        let result = audit("[a] [ 1 ] [1a] [x1]", 3);
        assert_eq!(result.unique_markers, 0);
    }

    #[test]
    fn test_threshold_is_fixed() {
        assert!(audit("[1] [2] [3]", 10).passed());
        assert!(!audit("[1] [2]", 10).passed());
    }

    #[test]
    fn test_few_expected_sources_are_not_enforced() {
        assert!(audit("[1]", 1).passed());
        assert!(audit("no markers at all", 2).passed());
        assert!(audit("[1]", 2).gap_reason().is_none());
        assert!(!audit("[1]", 3).passed());
    }
}
