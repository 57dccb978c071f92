use crate::db::sql::{quote_ident, quote_literal};

/// The database a run writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Postgres {
        user: String,
        password: String,
        host: String,
        port: u16,
        database: String,
    },
    /// A DuckDB database file, or `:memory:`.
    DuckDb { path: String },
}

impl Destination {
    pub fn connection_string(&self) -> String {
        match self {
            Destination::Postgres {
                user,
                password,
                host,
                port,
                database,
            } => format!(
                "postgresql://{}:{}@{}:{}/{}",
                user, password, host, port, database
            ),
            Destination::DuckDb { path } => path.clone(),
        }
    }

    /// The connection string with the password masked, for logs.
    pub fn redacted(&self) -> String {
        match self {
            Destination::Postgres {
                user,
                host,
                port,
                database,
                ..
            } => format!("postgresql://{}:***@{}:{}/{}", user, host, port, database),
            Destination::DuckDb { path } => format!("duckdb:{}", path),
        }
    }

    /// Statements that attach this destination to a DuckDB session as `alias`.
    pub fn attach_statements(&self, alias: &str) -> Vec<String> {
        let target = quote_literal(&self.connection_string());
        match self {
            Destination::Postgres { .. } => vec![
                "INSTALL postgres".to_string(),
                "LOAD postgres".to_string(),
                format!("ATTACH {} AS {} (TYPE POSTGRES)", target, quote_ident(alias)),
            ],
            Destination::DuckDb { .. } => {
                vec![format!("ATTACH {} AS {}", target, quote_ident(alias))]
            }
        }
    }
}
