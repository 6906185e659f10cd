use mysql::{Conn, Opts, OptsBuilder, SslOpts, prelude::Queryable};

use crate::MySQLOptions;

use super::{DatabaseDriver, DatabaseSession, DriverError};

#[derive(Debug, Clone, Copy)]
pub struct MySQLDriver;

impl DatabaseDriver for MySQLDriver {
    type Config = MySQLOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(MySQLSession::new(conn)))
    }
}

struct MySQLSession {
    conn: Conn,
}

impl MySQLSession {
    fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for MySQLSession {
    fn tables(&mut self) -> Result<Vec<String>, DriverError> {
        self.conn
            .query::<String, _>("SHOW TABLES")
            .map_err(|err| DriverError::Other(format!("查询表列表失败: {}", err)))
    }
}

fn open_conn(config: &MySQLOptions) -> Result<Conn, DriverError> {
    if config.host.trim().is_empty() {
        return Err(DriverError::MissingField("host".into()));
    }
    if config.username.trim().is_empty() {
        return Err(DriverError::MissingField("username".into()));
    }
    if config.database.trim().is_empty() {
        return Err(DriverError::MissingField("database".into()));
    }

    let mut builder = OptsBuilder::new();
    let host = config.host.trim();
    if host.starts_with('/') {
        builder = builder.socket(Some(host.to_string()));
    } else {
        builder = builder.ip_or_hostname(Some(host.to_string()));
        builder = builder.tcp_port(config.port.parse().unwrap_or(3306));
    }
    builder = builder.user(Some(config.username.clone()));
    if !config.password.is_empty() {
        builder = builder.pass(Some(config.password.clone()));
    }
    builder = builder.db_name(Some(config.database.clone()));

    if config.use_tls {
        builder = builder.ssl_opts(Some(SslOpts::default()));
    }
    let opts = Opts::from(builder);
    Conn::new(opts).map_err(|err| DriverError::Other(format!("连接失败: {}", err)))
}
