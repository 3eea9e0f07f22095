/// 预算超限，当前运行必须终止
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Token budget exceeded ({consumed} > {budget})")]
pub struct BudgetExceeded {
    pub consumed: usize,
    pub budget: usize,
}

/// 粗略的token计数器：字符数除以固定除数
///
/// 每次模型调用前后都会记账，累计值超过上限的那一次调用立即失败。
/// 一个实例只属于一次流水线运行，运行中不会重置。
#[derive(Debug, Clone)]
pub struct CostGuard {
    budget: usize,
    consumed: usize,
}

impl CostGuard {
    /// 每个单位对应的字符数
    pub const CHARS_PER_UNIT: usize = 4;

    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            consumed: 0,
        }
    }

    /// 记账并返回本次文本折算的单位数
    pub fn add(&mut self, text: &str) -> Result<usize, BudgetExceeded> {
        let units = Self::estimate(text);
        self.consumed = self.consumed.saturating_add(units);
        if self.consumed > self.budget {
            return Err(BudgetExceeded {
                consumed: self.consumed,
                budget: self.budget,
            });
        }
        Ok(units)
    }

    pub fn estimate(text: &str) -> usize {
        text.chars().count() / Self::CHARS_PER_UNIT
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.consumed)
    }
}
