use clap::Parser;
use std::env;

use crate::cli::command::Command;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Product catalog with per-category attribute schemas",
    long_about = "Serves a REST API over a SQLite product catalog whose attributes vary by category, or runs one-shot catalog commands.",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    #[arg(
        long,
        env = "PMT_DATA_DIR",
        default_value = ".pmt/",
        value_name = "DIR",
        help = "Directory to store persistent data"
    )]
    pub data_dir: String,

    #[arg(
        long,
        default_value_t = false,
        help = "Reset all persisted state (delete the SQLite database) before starting"
    )]
    pub reset: bool,

    #[arg(
        long = "log-file",
        env = "PMT_LOG_FILE",
        value_name = "PATH",
        help = "Write logs to PATH (in addition to stderr)"
    )]
    pub log_file: Option<String>,

    #[arg(
        long = "api-listen",
        env = "PMT_API_LISTEN",
        value_name = "ADDR",
        default_value = "127.0.0.1:5000",
        help = "REST API listen address (host:port)"
    )]
    pub api_listen: std::net::SocketAddr,

    #[arg(
        long = "busy-timeout-ms",
        env = "PMT_BUSY_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = 5000u64,
        help = "How long a write waits for the database lock before failing"
    )]
    pub busy_timeout_ms: u64,

    #[arg(
        long = "allow-foreign-attributes",
        default_value_t = false,
        help = "Accept product values for attributes defined by a different category"
    )]
    pub allow_foreign_attributes: bool,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    if dotenvy::from_filename(&dotenv_path).is_ok() {
        log::debug!("Loaded env from {}", dotenv_path);
    }
    Cli::parse()
}
