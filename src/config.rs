//! Typed service configuration built from command-line arguments

use crate::cli::Args;
use crate::error::{AnalysisError, Result};
use crate::tuning::MinSamplesRange;

/// Connection parameters for the sales database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    /// Connection URL without the password, safe to log
    pub fn redacted_url(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.dbname
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            dbname: "GYK".to_string(),
            pool_size: 8,
        }
    }
}

/// Everything the server needs at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub search: MinSamplesRange,
}

impl ServiceConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.db_pool_size == 0 {
            return Err(AnalysisError::InvalidInput(
                "database pool size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: args.host.clone(),
            port: args.port,
            database: DatabaseConfig {
                host: args.db_host.clone(),
                port: args.db_port,
                user: args.db_user.clone(),
                password: args.db_password.clone(),
                dbname: args.db_name.clone(),
                pool_size: args.db_pool_size,
            },
            search: args.min_samples_range,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
