//! Command-line interface definitions and argument parsing

use crate::tuning::MinSamplesRange;
use clap::Parser;

/// DBSCAN segmentation API over the sales database
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address the HTTP server binds to
    #[arg(long, env = "SEGMENTFORGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on
    #[arg(short, long, env = "SEGMENTFORGE_PORT", default_value = "7000")]
    pub port: u16,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value = "5432")]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "GYK")]
    pub db_name: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "DB_POOL_SIZE", default_value = "8")]
    pub db_pool_size: usize,

    /// Inclusive range of min_samples values tried by the parameter search
    /// Example: --min-samples-range 2..10
    #[arg(long, env = "MIN_SAMPLES_RANGE", default_value = "2..10")]
    pub min_samples_range: MinSamplesRange,

    /// Default log filter when RUST_LOG is not set (e.g. info, debug)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
