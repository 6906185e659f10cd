use std::env;
use std::fs;
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

use sqler_core::{AppCache, CacheError, DataSource, sources_db};

use crate::exec::ShellRunner;
use crate::import::{DataSourceTarget, ImportRequest, ImportStatus, ImportTarget};

mod compress;
mod exec;
mod import;
mod optimize;

/// 导入配置
#[derive(Debug, Deserialize)]
pub struct ImportConfig {
    pub file: String,
    #[serde(default)]
    pub compression: Option<String>,
    /// 只输出导入命令，不执行
    #[serde(default)]
    pub only_command: bool,
    /// 目标库已有表时跳过导入
    #[serde(default)]
    pub only_if_empty: bool,
    /// 导入前合并单行 INSERT（不能与 compression 同时使用）
    #[serde(default)]
    pub optimize: bool,
}

/// 任务配置（<task-dir>/config.json）
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    pub source_id: String,
    pub created_at: String,
    pub import: ImportConfig,
}

/// 进度输出消息（写入 stdout 的 JSON Lines）
#[derive(Debug, Serialize)]
pub struct ProgressMessage {
    kind: MessageKind,
    data: serde_json::Value,
}

/// 消息类型
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Error,
    Completed,
}

/// 初始化任务日志系统
///
/// 控制台日志写到 stderr，stdout 只留给 JSON 结果。
fn init_task_logging(task_dir: &Path) -> non_blocking::WorkerGuard {
    let log_file = never(task_dir, "task.log");
    let (non_blocking, guard) = non_blocking(log_file);

    tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(layer().with_writer(stderr))
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn main() {
    // 1. 解析命令行参数
    let task_dir = match parse_task_dir(env::args()) {
        Some(dir) => dir,
        None => {
            print_error("fatal", "缺少 --task-dir 参数");
            eprintln!("用法: sqler-import --task-dir <DIR>");
            exit(1);
        }
    };

    // 2. 初始化日志系统
    let _log_guard = init_task_logging(&task_dir);
    tracing::info!("任务进程启动，task_dir: {:?}", task_dir);

    // 3. 读取并解析任务配置
    let config_path = task_dir.join("config.json");
    let config_content = match fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(e) => {
            print_error("fatal", &format!("无法读取配置文件: {}", e));
            exit(1);
        }
    };
    let config: TaskConfig = match serde_json::from_str(&config_content) {
        Ok(cfg) => cfg,
        Err(e) => {
            print_error("fatal", &format!("配置文件格式错误: {}", e));
            exit(1);
        }
    };
    tracing::info!(
        "任务配置解析成功: task_id={}, created_at={}",
        config.task_id,
        config.created_at
    );

    // 4. 校验导入选项（不触碰任何文件）
    let request = match ImportRequest::try_from(&config.import) {
        Ok(req) => req,
        Err(e) => {
            print_error("fatal", &e.to_string());
            exit(1);
        }
    };

    // 5. 从加密存储读取数据源
    tracing::info!("加载数据源: {}", config.source_id);
    let datasource = match load_data_source(&config.source_id) {
        Ok(ds) => ds,
        Err(e) => {
            print_error("fatal", &format!("无法加载数据源: {}", e));
            exit(1);
        }
    };
    tracing::info!("数据源类型: {}", datasource.kind.label());
    let mut target = DataSourceTarget::new(datasource);

    // 6. 执行导入
    let start_time = Instant::now();
    let status = match import::run(&request, &mut target, &mut ShellRunner) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("导入中止: {}", e);
            print_error("fatal", &e.to_string());
            exit(1);
        }
    };

    // 7. 输出结果
    for msg in report(status, &request, &target, start_time.elapsed().as_secs_f64()) {
        print_progress(msg);
    }
}

fn parse_task_dir<I: IntoIterator<Item = String>>(args: I) -> Option<PathBuf> {
    let args: Vec<String> = args.into_iter().collect();
    args.iter()
        .position(|arg| arg == "--task-dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// 从加密存储读取数据源配置
fn load_data_source(id: &str) -> Result<DataSource, CacheError> {
    let cache = AppCache::load(&sources_db())?;
    tracing::debug!("数据源存储: {:?}", cache.sources_path());
    cache.source(id)
}

/// 按导入结果生成输出消息
///
/// 退出码大于 0 时先输出一条 import 错误（被信号终止的 -1 不算），
/// 每次实际导入都以 completed 结束。
fn report(
    status: ImportStatus,
    request: &ImportRequest,
    target: &impl ImportTarget,
    elapsed: f64,
) -> Vec<ProgressMessage> {
    match status {
        ImportStatus::CommandOnly(command) => vec![command_message(&command)],
        ImportStatus::Skipped { tables } => vec![completed_message(serde_json::json!({
            "status": "skipped",
            "message": "数据库非空，跳过导入",
            "tables": tables,
        }))],
        ImportStatus::Imported(outcome) => {
            let mut messages = vec![];
            if outcome.exit_code > 0 {
                messages.push(error_message("import", &outcome.output_text()));
            }
            let result = if outcome.success() { "success" } else { "failed" };
            messages.push(completed_message(serde_json::json!({
                "status": result,
                "exit_code": outcome.exit_code,
                "file": request.source().display().to_string(),
                "target": target.name(),
                "output_lines": outcome.output.len(),
                "elapsed_seconds": format!("{:.1}", elapsed),
                "finished_at": Utc::now().to_rfc3339(),
            })));
            messages
        }
    }
}

fn error_message(
    severity: &str,
    message: &str,
) -> ProgressMessage {
    ProgressMessage {
        kind: MessageKind::Error,
        data: serde_json::json!({
            "severity": severity,
            "message": message,
        }),
    }
}

fn command_message(command: &str) -> ProgressMessage {
    ProgressMessage {
        kind: MessageKind::Command,
        data: serde_json::json!({ "command": command }),
    }
}

fn completed_message(data: serde_json::Value) -> ProgressMessage {
    ProgressMessage {
        kind: MessageKind::Completed,
        data,
    }
}

pub fn print_error(
    severity: &str,
    message: &str,
) {
    print_progress(error_message(severity, message));
}

pub fn print_progress(msg: ProgressMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        println!("{}", json);
    }
}
