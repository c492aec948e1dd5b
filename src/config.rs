//! 命令行参数与服务默认配置。

use clap::Parser;
use shadow_rs::formatcp;
use std::path::PathBuf;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_UPLOAD_MAX_SIZE: usize = 100 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "rootbox", version = VERSION_INFO, about = "Root-confined file storage server")]
pub struct Args {
    #[arg(
        short = 'r',
        long,
        env = "ROOTBOX_ROOT_DIR",
        help = "Root directory all operations are confined to (must exist)"
    )]
    pub root_dir: PathBuf,
    #[arg(
        short = 'b',
        long,
        env = "ROOTBOX_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "ROOTBOX_PORT",
        default_value_t = DEFAULT_HTTP_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(long, env = "ROOTBOX_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "ROOTBOX_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload request size in bytes"
    )]
    pub upload_max_size: usize,
    #[arg(
        long,
        env = "ROOTBOX_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        help = "Request timeout in seconds (0 to disable)"
    )]
    pub request_timeout_secs: u64,
}
