use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;

use sqler_core::{DataSource, DatabaseSession, DriverError, create_connection};

use crate::ImportConfig;
use crate::compress::{Compression, build_command, supported_ids};
use crate::exec::{CommandRunner, ImportOutcome};
use crate::optimize::optimize;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("文件不存在: {}", .0.display())]
    InvalidInput(PathBuf),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    #[error("不支持的压缩格式: {}（可选: {}）", .0, supported_ids())]
    UnknownCompression(String),

    #[error("第 {line} 行不是可识别的 INSERT 语句: {content}")]
    MalformedInsert { line: u64, content: String },

    #[error("数据库错误: {0}")]
    Driver(#[from] DriverError),
}

/// 一次导入请求，构造后不可变
#[derive(Debug, Clone)]
pub struct ImportRequest {
    source: PathBuf,
    compression: Option<String>,
    only_command: bool,
    only_if_empty: bool,
    optimize: bool,
}

impl ImportRequest {
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl TryFrom<&ImportConfig> for ImportRequest {
    type Error = ImportError;

    fn try_from(config: &ImportConfig) -> Result<Self, Self::Error> {
        let compression = config
            .compression
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        // 优化后的文件是明文，无法再按压缩格式解压
        if config.optimize && compression.is_some() {
            return Err(ImportError::Configuration("compression 与 optimize 不能同时使用".into()));
        }

        Ok(Self {
            source: PathBuf::from(&config.file),
            compression,
            only_command: config.only_command,
            only_if_empty: config.only_if_empty,
            optimize: config.optimize,
        })
    }
}

/// 导入目标库：提供客户端调用串和已有表名
pub trait ImportTarget {
    fn name(&self) -> String;

    fn client_command(&self) -> Result<String, DriverError>;

    fn tables(&mut self) -> Result<Vec<String>, DriverError>;
}

/// 基于数据源配置的导入目标，仅在需要检查表时才建立连接
pub struct DataSourceTarget {
    source: DataSource,
    session: Option<Box<dyn DatabaseSession>>,
}

impl DataSourceTarget {
    pub fn new(source: DataSource) -> Self {
        Self { source, session: None }
    }
}

impl ImportTarget for DataSourceTarget {
    fn name(&self) -> String {
        format!("{} ({})", self.source.name, self.source.display_endpoint())
    }

    fn client_command(&self) -> Result<String, DriverError> {
        self.source.options.client_command()
    }

    fn tables(&mut self) -> Result<Vec<String>, DriverError> {
        if self.session.is_none() {
            tracing::info!("正在连接数据库: {}", self.source.display_endpoint());
            self.session = Some(create_connection(&self.source.options)?);
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DriverError::Other("数据库连接未建立".into()))?;
        session.tables()
    }
}

/// 导入流程的最终状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    /// 只输出命令，不执行
    CommandOnly(String),
    /// 目标库非空，跳过导入
    Skipped { tables: usize },
    Imported(ImportOutcome),
}

/// 执行导入流程
///
/// 1. 校验文件存在
/// 2. 按需优化到临时文件
/// 3. 解析压缩格式并生成命令
/// 4. 只输出命令 / 非空跳过 / 执行导入
/// 5. 删除临时文件
///
/// 临时文件在任何退出路径上都会被删除，包括第 4 步出错。
pub fn run<T, R>(
    request: &ImportRequest,
    target: &mut T,
    runner: &mut R,
) -> Result<ImportStatus, ImportError>
where
    T: ImportTarget,
    R: CommandRunner,
{
    if !request.source.is_file() {
        return Err(ImportError::InvalidInput(request.source.clone()));
    }

    let optimized = if request.optimize {
        tracing::info!("优化 {:?} 到临时文件", request.source);
        Some(optimize(&request.source)?)
    } else {
        None
    };
    let file: &Path = optimized.as_deref().unwrap_or(request.source.as_path());

    let compression = Compression::resolve(request.compression.as_deref())?;
    let client = target.client_command()?;
    let command = build_command(compression, &client, file);
    tracing::debug!("导入命令: compression={}, command={}", compression, command);

    let status = dispatch(request, target, runner, file, command)?;

    if let Some(path) = optimized {
        cleanup(path);
    }
    Ok(status)
}

fn dispatch<T, R>(
    request: &ImportRequest,
    target: &mut T,
    runner: &mut R,
    file: &Path,
    command: String,
) -> Result<ImportStatus, ImportError>
where
    T: ImportTarget,
    R: CommandRunner,
{
    if request.only_command {
        return Ok(ImportStatus::CommandOnly(command));
    }

    if request.only_if_empty {
        let tables = target.tables()?;
        if !tables.is_empty() {
            tracing::warn!("数据库非空（{} 张表），跳过导入", tables.len());
            return Ok(ImportStatus::Skipped { tables: tables.len() });
        }
    }

    tracing::info!("导入 SQL 文件 {:?} 到数据库 {}", file, target.name());
    let outcome = runner.run(&command)?;
    if outcome.success() {
        tracing::info!("导入完成");
    } else {
        tracing::error!("导入失败，退出码: {}", outcome.exit_code);
    }
    Ok(ImportStatus::Imported(outcome))
}

fn cleanup(path: TempPath) {
    let temp_path = path.to_path_buf();
    match path.close() {
        Ok(()) => tracing::debug!("已删除临时文件: {:?}", temp_path),
        Err(e) => tracing::warn!("删除临时文件失败: {:?}, {}", temp_path, e),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    struct SpyTarget {
        tables: Vec<&'static str>,
        table_calls: usize,
    }

    impl SpyTarget {
        fn with_tables(tables: Vec<&'static str>) -> Self {
            Self { tables, table_calls: 0 }
        }
    }

    impl ImportTarget for SpyTarget {
        fn name(&self) -> String {
            "spy".into()
        }

        fn client_command(&self) -> Result<String, DriverError> {
            Ok("mysql 'shop'".into())
        }

        fn tables(&mut self) -> Result<Vec<String>, DriverError> {
            self.table_calls += 1;
            Ok(self.tables.iter().map(|name| name.to_string()).collect())
        }
    }

    /// 记录命令，执行时读取被导入文件的内容
    struct SpyRunner {
        commands: Vec<String>,
        seen_content: Option<String>,
        outcome: io::Result<ImportOutcome>,
    }

    impl SpyRunner {
        fn exiting(code: i32) -> Self {
            Self {
                commands: vec![],
                seen_content: None,
                outcome: Ok(ImportOutcome {
                    exit_code: code,
                    output: vec![format!("exit {}", code)],
                }),
            }
        }

        fn failing() -> Self {
            Self {
                commands: vec![],
                seen_content: None,
                outcome: Err(io::Error::new(io::ErrorKind::NotFound, "sh not found")),
            }
        }
    }

    impl CommandRunner for SpyRunner {
        fn run(
            &mut self,
            command: &str,
        ) -> io::Result<ImportOutcome> {
            self.commands.push(command.to_string());
            if let Some(file) = redirected_file(command) {
                self.seen_content = fs::read_to_string(file).ok();
            }
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn redirected_file(command: &str) -> Option<PathBuf> {
        let (_, file) = command.rsplit_once(" < ")?;
        Some(PathBuf::from(file.trim_matches('\'')))
    }

    fn config(file: &Path) -> ImportConfig {
        ImportConfig {
            file: file.to_string_lossy().into_owned(),
            compression: None,
            only_command: false,
            only_if_empty: false,
            optimize: false,
        }
    }

    fn dump_file(dir: &Path) -> PathBuf {
        let path = dir.join("shop.sql");
        fs::write(
            &path,
            "INSERT INTO `x` (a,b) VALUES (1,2);\nINSERT INTO `x` (a,b) VALUES (3,4);\n-- done\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn optimize_with_compression_is_rejected() {
        let mut cfg = config(Path::new("/nonexistent/shop.sql.gz"));
        cfg.optimize = true;
        cfg.compression = Some("gzip".into());
        assert!(matches!(ImportRequest::try_from(&cfg), Err(ImportError::Configuration(_))));
    }

    #[test]
    fn blank_compression_counts_as_absent() {
        let mut cfg = config(Path::new("shop.sql"));
        cfg.optimize = true;
        cfg.compression = Some(" ".into());
        let request = ImportRequest::try_from(&cfg).unwrap();
        assert!(request.compression.is_none());
        assert_eq!(request.source(), Path::new("shop.sql"));
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = ImportRequest::try_from(&config(&dir.path().join("missing.sql"))).unwrap();
        let mut target = SpyTarget::with_tables(vec![]);
        let mut runner = SpyRunner::exiting(0);

        let result = run(&request, &mut target, &mut runner);
        assert!(matches!(result, Err(ImportError::InvalidInput(_))));
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = ImportRequest::try_from(&config(dir.path())).unwrap();
        let result = run(&request, &mut SpyTarget::with_tables(vec![]), &mut SpyRunner::exiting(0));
        assert!(matches!(result, Err(ImportError::InvalidInput(_))));
    }

    #[test]
    fn only_command_returns_command_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let file = dump_file(dir.path());
        let mut cfg = config(&file);
        cfg.only_command = true;
        cfg.only_if_empty = true;
        cfg.compression = Some("gz".into());
        let request = ImportRequest::try_from(&cfg).unwrap();

        let mut target = SpyTarget::with_tables(vec!["customer"]);
        let mut runner = SpyRunner::exiting(0);
        let status = run(&request, &mut target, &mut runner).unwrap();

        let expected = format!("gzip -dc < '{}' | mysql 'shop'", file.display());
        assert_eq!(status, ImportStatus::CommandOnly(expected));
        assert!(runner.commands.is_empty());
        assert_eq!(target.table_calls, 0);
    }

    #[test]
    fn only_if_empty_skips_non_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dump_file(dir.path()));
        cfg.only_if_empty = true;
        let request = ImportRequest::try_from(&cfg).unwrap();

        let mut target = SpyTarget::with_tables(vec!["customer", "order"]);
        let mut runner = SpyRunner::exiting(0);
        let status = run(&request, &mut target, &mut runner).unwrap();

        assert_eq!(status, ImportStatus::Skipped { tables: 2 });
        assert_eq!(target.table_calls, 1);
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn only_if_empty_imports_into_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let file = dump_file(dir.path());
        let mut cfg = config(&file);
        cfg.only_if_empty = true;
        let request = ImportRequest::try_from(&cfg).unwrap();

        let mut target = SpyTarget::with_tables(vec![]);
        let mut runner = SpyRunner::exiting(0);
        let status = run(&request, &mut target, &mut runner).unwrap();

        assert!(matches!(status, ImportStatus::Imported(ref outcome) if outcome.success()));
        assert_eq!(runner.commands, vec![format!("mysql 'shop' < '{}'", file.display())]);
    }

    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let request = ImportRequest::try_from(&config(&dump_file(dir.path()))).unwrap();
        let mut runner = SpyRunner::exiting(1);

        let status = run(&request, &mut SpyTarget::with_tables(vec![]), &mut runner).unwrap();
        match status {
            ImportStatus::Imported(outcome) => {
                assert_eq!(outcome.exit_code, 1);
                assert_eq!(outcome.output_text(), "exit 1");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unknown_compression_fails_before_execution() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dump_file(dir.path()));
        cfg.compression = Some("rar".into());
        let request = ImportRequest::try_from(&cfg).unwrap();
        let mut runner = SpyRunner::exiting(0);

        let result = run(&request, &mut SpyTarget::with_tables(vec![]), &mut runner);
        assert!(matches!(result, Err(ImportError::UnknownCompression(_))));
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn optimized_file_is_imported_then_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dump_file(dir.path());
        let mut cfg = config(&file);
        cfg.optimize = true;
        let request = ImportRequest::try_from(&cfg).unwrap();

        let mut runner = SpyRunner::exiting(0);
        run(&request, &mut SpyTarget::with_tables(vec![]), &mut runner).unwrap();

        assert_eq!(
            runner.seen_content.as_deref(),
            Some("INSERT INTO `x` VALUES (1,2),(3,4);\n-- done\n")
        );
        let temp = redirected_file(&runner.commands[0]).unwrap();
        assert_ne!(temp, file);
        assert!(!temp.exists());
        assert!(file.exists());
    }

    #[test]
    fn optimized_file_is_removed_when_execution_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dump_file(dir.path()));
        cfg.optimize = true;
        let request = ImportRequest::try_from(&cfg).unwrap();

        let mut runner = SpyRunner::failing();
        let result = run(&request, &mut SpyTarget::with_tables(vec![]), &mut runner);

        assert!(matches!(result, Err(ImportError::Io(_))));
        let temp = redirected_file(&runner.commands[0]).unwrap();
        assert!(!temp.exists());
    }

    #[test]
    fn optimized_file_is_removed_after_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dump_file(dir.path()));
        cfg.optimize = true;
        cfg.only_command = true;
        let request = ImportRequest::try_from(&cfg).unwrap();

        let status = run(&request, &mut SpyTarget::with_tables(vec![]), &mut SpyRunner::exiting(0)).unwrap();
        match status {
            ImportStatus::CommandOnly(command) => {
                let temp = redirected_file(&command).unwrap();
                assert!(!temp.exists());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn malformed_dump_aborts_optimization() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.sql");
        fs::write(&file, "INSERT INTO `x` VALUES (1,2);\n").unwrap();
        let mut cfg = config(&file);
        cfg.optimize = true;
        let request = ImportRequest::try_from(&cfg).unwrap();
        let mut runner = SpyRunner::exiting(0);

        let result = run(&request, &mut SpyTarget::with_tables(vec![]), &mut runner);
        assert!(matches!(result, Err(ImportError::MalformedInsert { line: 1, .. })));
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = ImportError::UnknownCompression("rar".into());
        assert!(err.to_string().contains("rar"));
        assert!(err.to_string().contains("gzip"));

        let err = ImportError::InvalidInput(PathBuf::from("/tmp/missing.sql"));
        assert_eq!(err.to_string(), "文件不存在: /tmp/missing.sql");
    }
}
