use clap::Parser;
use manuscript_factory::cli::{self, ExitCodes};
use manuscript_factory::generator::workflow::launch;
use manuscript_factory::utils::logging;
use std::process::ExitCode;
use tracing::{Instrument, error, info, info_span};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = cli::Args::parse();
    let verbose = args.verbose;
    logging::init(verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 配置错误: {:#}", e);
            return ExitCode::from(ExitCodes::CONFIG);
        }
    };

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", id = %run_id, book = %config.get_book_name());

    let result = tokio::select! {
        result = launch(&config).instrument(span) => result,
        _ = tokio::signal::ctrl_c() => {
            error!("⚠️ 用户中断，已写入的章节与下载文件会在下次运行时复用");
            return ExitCode::from(ExitCodes::INTERRUPTED);
        }
    };

    match result {
        Ok(report) if report.succeeded() => {
            info!("✅ 书稿生成完成");
            if let Some(master) = &report.master_file {
                info!("📚 {}", master.display());
            }
            ExitCode::SUCCESS
        }
        Ok(report) => {
            let failed = report.outcome.runs.iter().find(|run| !run.passed());
            match failed {
                Some(run) => error!(
                    "🚫 章节 \"{}\" 在 {} 次尝试后仍未通过，书稿不完整: {}",
                    run.chapter.title,
                    run.attempts,
                    run.critiques.last().map(String::as_str).unwrap_or("")
                ),
                None => error!("🚫 书稿不完整"),
            }
            ExitCode::from(ExitCodes::BROKEN)
        }
        Err(e) => {
            let code = cli::failure_exit_code(&e);
            match code {
                ExitCodes::BUDGET => error!("💸 预算耗尽，运行中止: {:#}", e),
                ExitCodes::CONFIG => error!("❌ 配置错误: {:#}", e),
                _ => error!("❌ 运行失败: {:#}", e),
            }
            ExitCode::from(code)
        }
    }
}
