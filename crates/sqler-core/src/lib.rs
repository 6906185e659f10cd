use serde::{Deserialize, Serialize};

// 核心模块导出
pub mod cache;
pub mod driver;
pub mod paths;

// 重新导出 driver 和 cache 类型
pub use driver::{DatabaseSession, DriverError, create_connection, escape_shell};

pub use cache::{AppCache, CacheError};
pub use paths::{root_dir, sources_db};

// ============================================================================
// Model Types
// ============================================================================

#[derive(Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub kind: DataSourceKind,
    pub options: DataSourceOptions,
}

impl DataSource {
    pub fn display_endpoint(&self) -> String {
        self.options.endpoint()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceKind {
    MySQL,
    SQLite,
    Postgres,
}

impl DataSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DataSourceKind::MySQL => "MySQL",
            DataSourceKind::SQLite => "SQLite",
            DataSourceKind::Postgres => "PostgreSQL",
        }
    }

    /// 导入时调用的命令行客户端
    pub fn client_tool(&self) -> &'static str {
        match self {
            DataSourceKind::MySQL => "mysql",
            DataSourceKind::SQLite => "sqlite3",
            DataSourceKind::Postgres => "psql",
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MySQLOptions {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub use_tls: bool,
}

impl Default for MySQLOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: "3306".into(),
            username: "root".into(),
            password: "".into(),
            database: String::new(),
            use_tls: false,
        }
    }
}

impl MySQLOptions {
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_tls { "mysqls" } else { "mysql" };
        let db = self.database.trim();
        if db.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, db)
        }
    }

    /// mysql 客户端调用串，例如 `mysql -h'127.0.0.1' -P'3306' -u'root' -p'secret' 'shop'`
    ///
    /// host 以 `/` 开头时视为 unix socket 路径。
    pub fn client_command(&self) -> Result<String, DriverError> {
        let db = self.database.trim();
        if db.is_empty() {
            return Err(DriverError::MissingField("database".into()));
        }

        let host = self.host.trim();
        let mut cmd = String::from(DataSourceKind::MySQL.client_tool());
        if host.starts_with('/') {
            cmd.push_str(&format!(" --socket={}", escape_shell(host)));
        } else {
            if !host.is_empty() {
                cmd.push_str(&format!(" -h{}", escape_shell(host)));
            }
            let port = self.port.trim();
            if !port.is_empty() {
                cmd.push_str(&format!(" -P{}", escape_shell(port)));
            }
        }
        if !self.username.trim().is_empty() {
            cmd.push_str(&format!(" -u{}", escape_shell(self.username.trim())));
        }
        if !self.password.is_empty() {
            cmd.push_str(&format!(" -p{}", escape_shell(&self.password)));
        }
        if self.use_tls {
            cmd.push_str(" --ssl-mode=REQUIRED");
        }
        cmd.push(' ');
        cmd.push_str(&escape_shell(db));
        Ok(cmd)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SQLiteOptions {
    pub readonly: bool,
    pub filepath: String,
}

impl Default for SQLiteOptions {
    fn default() -> Self {
        Self {
            readonly: false,
            filepath: String::new(),
        }
    }
}

impl SQLiteOptions {
    pub fn endpoint(&self) -> String {
        let path = self.filepath.trim();
        if path.is_empty() {
            return "sqlite://<未配置文件>".into();
        }

        let name = std::path::Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(path);

        if self.readonly {
            format!("sqlite://{}?mode=ro", name)
        } else {
            format!("sqlite://{}", name)
        }
    }

    pub fn client_command(&self) -> Result<String, DriverError> {
        let path = self.filepath.trim();
        if path.is_empty() {
            return Err(DriverError::MissingField("file_path".into()));
        }
        if self.readonly {
            return Err(DriverError::InvalidField("只读数据源不能导入".into()));
        }
        Ok(format!("{} {}", DataSourceKind::SQLite.client_tool(), escape_shell(path)))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresOptions {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: "5432".into(),
            database: String::new(),
            username: "postgres".into(),
            password: "".into(),
            use_tls: false,
        }
    }
}

impl PostgresOptions {
    pub fn endpoint(&self) -> String {
        let db = self.database.trim();
        let suffix = if db.is_empty() {
            String::new()
        } else {
            format!("/{}", db)
        };
        format!("postgres://{}:{}{}", self.host, self.port, suffix)
    }

    /// psql 调用串，密码通过 PGPASSWORD 传入，遇到错误立即停止
    pub fn client_command(&self) -> Result<String, DriverError> {
        let db = self.database.trim();
        if db.is_empty() {
            return Err(DriverError::MissingField("database".into()));
        }

        let mut cmd = String::new();
        if !self.password.is_empty() {
            cmd.push_str(&format!("PGPASSWORD={} ", escape_shell(&self.password)));
        }
        if self.use_tls {
            cmd.push_str("PGSSLMODE=require ");
        }
        cmd.push_str(DataSourceKind::Postgres.client_tool());
        cmd.push_str(" -q -v ON_ERROR_STOP=1");
        if !self.host.trim().is_empty() {
            cmd.push_str(&format!(" -h {}", escape_shell(self.host.trim())));
        }
        if !self.port.trim().is_empty() {
            cmd.push_str(&format!(" -p {}", escape_shell(self.port.trim())));
        }
        if !self.username.trim().is_empty() {
            cmd.push_str(&format!(" -U {}", escape_shell(self.username.trim())));
        }
        cmd.push_str(&format!(" -d {}", escape_shell(db)));
        Ok(cmd)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub enum DataSourceOptions {
    MySQL(MySQLOptions),
    SQLite(SQLiteOptions),
    Postgres(PostgresOptions),
}

impl DataSourceOptions {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSourceOptions::MySQL(_) => DataSourceKind::MySQL,
            DataSourceOptions::SQLite(_) => DataSourceKind::SQLite,
            DataSourceOptions::Postgres(_) => DataSourceKind::Postgres,
        }
    }

    pub fn endpoint(&self) -> String {
        match self {
            DataSourceOptions::MySQL(opts) => opts.endpoint(),
            DataSourceOptions::SQLite(opts) => opts.endpoint(),
            DataSourceOptions::Postgres(opts) => opts.endpoint(),
        }
    }

    /// 生成可直接拼接进 shell 的客户端调用串
    pub fn client_command(&self) -> Result<String, DriverError> {
        match self {
            DataSourceOptions::MySQL(opts) => opts.client_command(),
            DataSourceOptions::SQLite(opts) => opts.client_command(),
            DataSourceOptions::Postgres(opts) => opts.client_command(),
        }
    }
}
