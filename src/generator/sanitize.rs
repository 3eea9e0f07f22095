use regex::Regex;
use std::sync::LazyLock;

/// 受保护区域：围栏代码块（``` 或 ~~~）与行内代码
static PROTECTED_SPANS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```.*?```|~~~.*?~~~|`.*?`").expect("valid protected span regex")
});

fn escape_segment(segment: &str, out: &mut String) {
    for ch in segment.chars() {
        match ch {
            '%' | '$' | '&' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

/// 在代码区域之外转义排版敏感字符 `%` `$` `&`，代码区域原样保留
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut last = 0;
    for span in PROTECTED_SPANS.find_iter(text) {
        escape_segment(&text[last..span.start()], &mut out);
        out.push_str(span.as_str());
        last = span.end();
    }
    escape_segment(&text[last..], &mut out);
    out
}
