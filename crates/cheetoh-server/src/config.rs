use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read config from the process environment (after `.env`, if any).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("PORT", "3000")
            .parse()
            .context("PORT must be a port number")?;
        let max_upload_mb: usize = var("CHEETOH_MAX_UPLOAD_MB", "25")
            .parse()
            .context("CHEETOH_MAX_UPLOAD_MB must be a whole number")?;

        Ok(Self {
            host: var("CHEETOH_HOST", "0.0.0.0"),
            port,
            static_dir: PathBuf::from(var("CHEETOH_STATIC_DIR", "public")),
            upload_dir: PathBuf::from(var("CHEETOH_UPLOAD_DIR", "uploads")),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
