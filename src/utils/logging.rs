use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// 初始化日志
///
/// `FACTORY_LOG` 控制过滤级别（如 `manuscript_factory=debug`），未设置时为 `info`，
/// `verbose` 时为 `debug`。`FACTORY_LOG_JSON=1` 输出JSON日志。重复调用无副作用。
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_env("FACTORY_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        let fmt = fmt().with_env_filter(filter).with_target(false);
        if std::env::var("FACTORY_LOG_JSON").ok().as_deref() == Some("1") {
            fmt.json().init();
        } else {
            fmt.init();
        }
    });
}
