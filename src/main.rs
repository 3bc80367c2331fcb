// ==========================================
// 3D打印库存与排产系统 - 命令行入口
// ==========================================
// 用法:
//   print-stock                 输出库存快照 (JSON)
//   print-stock snapshot        同上
//   print-stock atp <SKU>       输出 SKU 的可承诺量 (JSON)
//   print-stock actions [N]     输出最近 N 条操作日志 (JSON)
// 数据库: PRINT_STOCK_DB_PATH 或用户数据目录
// ==========================================

use std::process::ExitCode;

use print_stock::api::{ApiError, ApiResult, Operator};
use print_stock::app::{get_default_db_path, AppState};
use serde::Serialize;

/// 命令行操作人（本机管理工具）
const CLI_OPERATOR_ENV: &str = "PRINT_STOCK_OPERATOR";

fn main() -> ExitCode {
    print_stock::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", print_stock::APP_NAME, print_stock::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let username = std::env::var(CLI_OPERATOR_ENV).unwrap_or_else(|_| "cli".to_string());
    let operator = Operator::admin(username);

    match run(&state, &operator, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = ?e.kind(), "命令执行失败: {}", e);
            if let Ok(body) = serde_json::to_string_pretty(&e.to_response()) {
                eprintln!("{}", body);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(state: &AppState, operator: &Operator, args: &[String]) -> ApiResult<()> {
    match args.first().map(String::as_str) {
        None | Some("snapshot") => print_json(&state.stock_api.snapshot(operator)?),
        Some("atp") => {
            let sku = args
                .get(1)
                .ok_or_else(|| ApiError::InvalidInput("用法: print-stock atp <SKU>".to_string()))?;
            print_json(&state.stock_api.atp(operator, sku)?)
        }
        Some("actions") => {
            let limit = match args.get(1) {
                Some(raw) => raw
                    .parse::<i32>()
                    .map_err(|_| ApiError::InvalidInput(format!("无效的条数: {}", raw)))?,
                None => 20,
            };
            print_json(&state.stock_api.list_recent_actions(operator, limit)?)
        }
        Some(other) => Err(ApiError::InvalidInput(format!(
            "未知命令: {}（可用: snapshot / atp <SKU> / actions [N]）",
            other
        ))),
    }
}

fn print_json<T: Serialize>(value: &T) -> ApiResult<()> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InternalError(format!("JSON序列化失败: {}", e)))?;
    println!("{}", body);
    Ok(())
}
