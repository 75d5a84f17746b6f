mod cli;

use clap::Parser;
use cli::{Cli, Command};
use snapsync_lib::commands::{check, status, sync};
use snapsync_lib::{logging, AppConfig, AppState, ErrorMode, SyncError};
use std::process::ExitCode;

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// 同步失败时的退出码
fn sync_exit_code(err: &SyncError, mode: ErrorMode) -> ExitCode {
    if err.is_declined() {
        return ExitCode::SUCCESS;
    }
    match (err, mode) {
        // 生产模式下未知错误已通知用户，本次同步静默结束
        (SyncError::Transport(_), ErrorMode::Production) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(snapsync_lib::resolve_config_dir);
    let _ = std::fs::create_dir_all(&data_dir);

    // 初始化日志系统
    let log_config = AppConfig::load(&data_dir).log;
    let _log_guard = logging::init_logging(&data_dir.join("logs"), &log_config);

    let state = match AppState::new(Some(data_dir)).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("初始化应用状态失败: {:#}", e);
            eprintln!("初始化失败: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match cli.cmd {
        Command::Sync {
            snapshot,
            non_interactive,
            yes,
        } => match sync::run_sync(&state, &snapshot, !non_interactive, yes).await {
            Ok(outcome) => {
                print_json(&outcome);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("同步未完成: {}", e);
                sync_exit_code(&e, state.config.sync.error_mode)
            }
        },
        Command::Status => match status::run_status(&state).await {
            Ok(s) => {
                print_json(&s);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("读取同步状态失败: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Command::Check => {
            let result = check::run_check(&state).await;
            print_json(&result);
            if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    state.cleanup().await;
    code
}
