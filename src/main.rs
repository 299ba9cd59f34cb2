// ==========================================
// 预算承诺控制引擎 - 命令行入口
// ==========================================
// 用法: budget-commitment <command> [json-args]
//       budget-commitment commands
// 命令的 JSON 结果输出到 stdout,错误载荷输出到 stderr
// ==========================================

use std::process::ExitCode;

use budget_commitment::app::{dispatch, get_default_db_path, AppState, COMMANDS};

#[tokio::main]
async fn main() -> ExitCode {
    budget_commitment::logging::init();

    let mut argv = std::env::args().skip(1);
    let Some(command) = argv.next() else {
        eprintln!("usage: budget-commitment <command> [json-args]");
        eprintln!("       budget-commitment commands");
        return ExitCode::from(2);
    };

    if command == "commands" {
        for name in COMMANDS {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let args: serde_json::Value = match argv.next() {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                eprintln!("invalid JSON arguments: {}", e);
                return ExitCode::from(2);
            }
        },
        None => serde_json::json!({}),
    };

    tracing::info!(
        version = budget_commitment::VERSION,
        "{} starting",
        budget_commitment::APP_NAME
    );
    let db_path = get_default_db_path();
    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&state, &command, &args).await {
        Ok(result) => {
            println!("{}", result);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}
