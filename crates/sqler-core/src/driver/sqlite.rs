use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::SQLiteOptions;

use super::{DatabaseDriver, DatabaseSession, DriverError};

#[derive(Debug, Clone, Copy)]
pub struct SQLiteDriver;

/// 文件不存在时没有连接，视为空库
struct SQLiteConnection {
    conn: Option<Connection>,
}

impl SQLiteConnection {
    fn new(conn: Option<Connection>) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for SQLiteConnection {
    fn tables(&mut self) -> Result<Vec<String>, DriverError> {
        let Some(conn) = &self.conn else {
            return Ok(vec![]);
        };

        let sql = "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
        let mut stmt = conn
            .prepare(sql)
            .map_err(|err| DriverError::Other(format!("查询表列表失败: {}", err)))?;

        stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| DriverError::Other(format!("查询表列表失败: {}", err)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DriverError::Other(format!("读取表名失败: {}", err)))
    }
}

impl DatabaseDriver for SQLiteDriver {
    type Config = SQLiteOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(SQLiteConnection::new(conn)))
    }
}

/// 只读打开，不创建文件或目录
fn open_conn(config: &SQLiteOptions) -> Result<Option<Connection>, DriverError> {
    let path_str = config.filepath.trim();
    if path_str.is_empty() {
        return Err(DriverError::MissingField("file_path".into()));
    }

    let path = Path::new(path_str);
    if !path.exists() {
        tracing::debug!("SQLite 文件不存在，视为空库: {:?}", path);
        return Ok(None);
    }

    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map(Some)
        .map_err(|err| DriverError::Other(format!("打开 SQLite 失败: {}", err)))
}
