use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::info;

use crate::research::types::ResearchPaper;

/// 下载前的操作员确认
pub trait Confirmation {
    fn confirm(&mut self, papers: &[ResearchPaper]) -> Result<bool>;
}

/// 终端确认：列出论文后读取一行回答
///
/// 输入结束（EOF）视为同意，避免非交互环境卡住。
pub struct ConsoleConfirmation<R, W> {
    input: R,
    output: W,
}

impl ConsoleConfirmation<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleConfirmation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirmation for ConsoleConfirmation<R, W> {
    fn confirm(&mut self, papers: &[ResearchPaper]) -> Result<bool> {
        writeln!(self.output, "\n📑 即将获取 {} 篇论文:", papers.len())?;
        for (i, paper) in papers.iter().enumerate() {
            writeln!(
                self.output,
                "  {:>2}. [{}] {} ({})",
                i + 1,
                paper.source,
                paper.title,
                paper.id
            )?;
        }
        write!(self.output, "Proceed with download? [Y/n] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            info!("未读取到输入，按同意处理");
            return Ok(true);
        }
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "" | "y" | "yes"
        ))
    }
}
