use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::FetchOptions;
use crate::package::OutputFormat;
use crate::pipeline::SchedulePolicy;
use crate::transcode::{MAX_QUALITY, MIN_QUALITY};

/// HTTP fetch parameters (optional `[fetch]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Seconds allowed for the TCP/TLS connect phase.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for the whole request, body included.
    pub timeout_secs: u64,
    /// Maximum number of redirects followed per image.
    pub max_redirections: u32,
    /// Optional User-Agent header sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 60,
            max_redirections: 10,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            max_redirections: self.max_redirections,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Global configuration loaded from `~/.config/biz/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BizConfig {
    /// Maximum number of images fetched and transcoded at once.
    pub concurrency: usize,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Default output format when the CLI does not specify one.
    pub format: OutputFormat,
    /// Directory that receives the final PDF/ZIP (relative paths resolve against cwd).
    pub output_dir: PathBuf,
    /// Scratch directory for transcoded images; removed at the end of every run.
    pub staging_dir: PathBuf,
    /// Directory scanned for `.txt` URL lists in interactive mode.
    pub source_dir: PathBuf,
    /// Scheduling policy: "pool" (default) or "chunked".
    #[serde(default)]
    pub schedule: SchedulePolicy,
    /// Optional fetch section; if missing, built-in defaults are used.
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
}

impl Default for BizConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            quality: 90,
            format: OutputFormat::Pdf,
            output_dir: PathBuf::from("output"),
            staging_dir: PathBuf::from("temp"),
            source_dir: PathBuf::from("source"),
            schedule: SchedulePolicy::Pool,
            fetch: None,
        }
    }
}

impl BizConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        validate_quality(self.quality)?;
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        self.fetch.clone().unwrap_or_default().to_options()
    }
}

/// Check that `quality` is within the JPEG quality range accepted by the transcoder.
pub fn validate_quality(quality: u8) -> Result<u8> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        anyhow::bail!(
            "quality must be between {} and {}, got {}",
            MIN_QUALITY,
            MAX_QUALITY,
            quality
        );
    }
    Ok(quality)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("biz")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BizConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BizConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BizConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
