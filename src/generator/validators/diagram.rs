use regex::Regex;
use std::sync::LazyLock;

static MERMAID_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid(.*?)```").expect("valid mermaid block regex"));

/// 图表块括号配平检查
///
/// 只比较每个mermaid代码块内 `{}` 与 `()` 的数量，不是语法解析。没有图表块时通过。
pub fn check(text: &str) -> Result<(), String> {
    for (index, caps) in MERMAID_BLOCK.captures_iter(text).enumerate() {
        let body = caps.get(1).map_or("", |m| m.as_str());
        let braces = (body.matches('{').count(), body.matches('}').count());
        let parens = (body.matches('(').count(), body.matches(')').count());
        if braces.0 != braces.1 || parens.0 != parens.1 {
            return Err(format!(
                "Visuals (Broken Mermaid Syntax in diagram {}).",
                index + 1
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_diagram_passes() {
        assert!(check("plain prose with (parens and {braces").is_ok());
    }

    #[test]
    fn test_balanced_diagram_passes() {
        let text = "Intro\n```mermaid\ngraph TD\n  A(Start) --> B{Choice}\n```\nOutro";
        assert!(check(text).is_ok());
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        let text = "```mermaid\ngraph TD\n  A --> B{Choice\n```";
        assert!(check(text).is_err());
    }

    #[test]
    fn test_unbalanced_parens_fail_in_second_block() {
        let text = "```mermaid\nA(ok)\n```\ntext\n```mermaid\nB((broken)\n```";
        let reason = check(text).unwrap_err();
        assert!(reason.contains("diagram 2"));
    }

    #[test]
    fn test_imbalance_outside_diagram_is_ignored() {
        let text = "```rust\nfn main() {\n```\n```mermaid\nA(x)\n```";
        assert!(check(text).is_ok());
    }
}
