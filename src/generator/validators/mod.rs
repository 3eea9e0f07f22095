//! 确定性质量关卡：图表、词法、引用，按固定顺序执行，首个失败即短路

pub mod citation;
pub mod diagram;
pub mod lint;

/// 失败的关卡
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Diagram,
    Lint,
    Citation,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Gate::Diagram => "diagram",
            Gate::Lint => "lint",
            Gate::Citation => "citation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Passed,
    Rejected { gate: Gate, reason: String },
}

impl GateOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, GateOutcome::Passed)
    }
}

/// 依次执行三道关卡，返回第一个失败原因
///
/// 被动语态提示不阻断，只在词法关卡失败时附加到原因末尾。
pub fn run_gates(text: &str, expected_refs: usize) -> GateOutcome {
    if let Err(reason) = diagram::check(text) {
        return GateOutcome::Rejected {
            gate: Gate::Diagram,
            reason,
        };
    }

    let report = lint::lint(text);
    if let Some(first) = report.violations.first() {
        let mut reason = format!("Protocol Violation. {}", first);
        for warning in &report.warnings {
            reason.push(' ');
            reason.push_str(warning);
        }
        return GateOutcome::Rejected {
            gate: Gate::Lint,
            reason,
        };
    }

    if let Some(reason) = citation::audit(text, expected_refs).gap_reason() {
        return GateOutcome::Rejected {
            gate: Gate::Citation,
            reason,
        };
    }

    GateOutcome::Passed
}
