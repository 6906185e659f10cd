use crate::DataSourceOptions;

pub use mysql::MySQLDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SQLiteDriver;

mod mysql;
mod postgres;
mod sqlite;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Other(String),
    #[error("配置字段缺失: {0}")]
    MissingField(String),
    #[error("配置字段非法: {0}")]
    InvalidField(String),
}

pub trait DatabaseDriver {
    type Config;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError>;
}

/// 导入流程只需要一个能力：列出目标库中已存在的表名
pub trait DatabaseSession: Send {
    fn tables(&mut self) -> Result<Vec<String>, DriverError>;
}

pub fn create_connection(opts: &DataSourceOptions) -> Result<Box<dyn DatabaseSession>, DriverError> {
    match opts {
        DataSourceOptions::MySQL(config) => MySQLDriver.create_connection(config),
        DataSourceOptions::SQLite(config) => SQLiteDriver.create_connection(config),
        DataSourceOptions::Postgres(config) => PostgresDriver.create_connection(config),
    }
}

/// POSIX shell 单引号转义，结果可以原样拼接进 `sh -c` 的命令串
pub fn escape_shell(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
