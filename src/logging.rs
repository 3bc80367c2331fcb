// ==========================================
// 日志系统初始化
// ==========================================
// tracing + tracing-subscriber
// RUST_LOG 控制级别；PRINT_STOCK_LOG_FORMAT=json 切换为 JSON 行输出
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "PRINT_STOCK_LOG_FORMAT";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=print_stock=trace
/// - PRINT_STOCK_LOG_FORMAT: `json` 输出结构化日志，其它值为文本
///
/// 重复调用不会 panic（第二次起静默忽略）
///
/// # 示例
/// ```no_run
/// use print_stock::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // 日志写到 stderr，stdout 留给命令输出
    let result = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "日志系统已初始化，跳过");
    }
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("print_stock=debug"))
        .with_test_writer()
        .try_init();
}
