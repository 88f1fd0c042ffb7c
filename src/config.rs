use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub staging_dir: PathBuf,
    /// TrueType font used for chart captions and labels. Charts are drawn
    /// without text when unset.
    pub chart_font: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_file_size: default_max_file_size(),
            staging_dir: std::env::temp_dir(),
            chart_font: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let mut config = Config::default();

        if let Ok(addr) = std::env::var("STATLY_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid STATLY_BIND_ADDR: {}", addr))?;
        }

        if let Ok(mb) = std::env::var("STATLY_MAX_UPLOAD_MB") {
            let mb: usize = mb
                .parse()
                .with_context(|| format!("Invalid STATLY_MAX_UPLOAD_MB: {}", mb))?;
            config.max_file_size = mb * 1024 * 1024;
        }

        if let Ok(dir) = std::env::var("STATLY_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }

        config.chart_font = std::env::var("STATLY_CHART_FONT").ok().map(PathBuf::from);

        Ok(config)
    }
}
