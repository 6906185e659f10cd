use postgres::{Client, Config, NoTls};

use crate::PostgresOptions;

use super::{DatabaseDriver, DatabaseSession, DriverError};

#[derive(Debug, Clone, Copy)]
pub struct PostgresDriver;

impl DatabaseDriver for PostgresDriver {
    type Config = PostgresOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let client = open_conn(config)?;
        Ok(Box::new(PostgresSession::new(client)))
    }
}

struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DatabaseSession for PostgresSession {
    fn tables(&mut self) -> Result<Vec<String>, DriverError> {
        let sql = "SELECT tablename FROM pg_tables WHERE schemaname = 'public' ORDER BY tablename";
        let rows = self
            .client
            .query(sql, &[])
            .map_err(|err| DriverError::Other(format!("查询表列表失败: {}", err)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|err| DriverError::Other(format!("读取表名失败: {}", err)))
            })
            .collect()
    }
}

fn open_conn(config: &PostgresOptions) -> Result<Client, DriverError> {
    if config.host.trim().is_empty() {
        return Err(DriverError::MissingField("host".into()));
    }
    if config.username.trim().is_empty() {
        return Err(DriverError::MissingField("username".into()));
    }
    if config.database.trim().is_empty() {
        return Err(DriverError::MissingField("database".into()));
    }
    if config.use_tls {
        return Err(DriverError::Other("PostgreSQL 暂未支持 TLS 连接".into()));
    }

    let mut pg_config = Config::new();
    pg_config.host(config.host.trim());
    pg_config.port(config.port.parse().unwrap_or(5432));
    pg_config.user(config.username.trim());
    if !config.password.is_empty() {
        pg_config.password(config.password.as_str());
    }
    pg_config.dbname(config.database.trim());

    pg_config
        .connect(NoTls)
        .map_err(|err| DriverError::Other(format!("连接失败: {}", err)))
}
