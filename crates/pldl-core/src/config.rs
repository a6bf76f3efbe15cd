use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Read-only view of the settings the download manager depends on.
///
/// Values are read at initialization and again on
/// [`DownloadManager::update_concurrency`](crate::manager::DownloadManager::update_concurrency).
pub trait SettingsSource: Send + Sync {
    /// Parallelism cap for the download queue.
    fn concurrent_downloads(&self) -> usize;
    /// Container used when a submission does not name one.
    fn download_format(&self) -> String;
    /// Quality cap (`"720p"`, `"1080p"`, `"best"`, ...) used when a submission does not name one.
    fn max_quality(&self) -> String;
    /// Base directory for batches without a custom location.
    fn download_location(&self) -> PathBuf;
}

/// Global configuration loaded from `~/.config/pldl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PldlConfig {
    /// Maximum number of downloads running at once.
    pub concurrent_downloads: usize,
    /// Default container (`mp4`, `webm`, `mkv`).
    pub download_format: String,
    /// Default quality cap.
    pub max_quality: String,
    /// Base directory for downloads; `$HOME/Downloads/pldl` when unset.
    #[serde(default)]
    pub download_location: Option<PathBuf>,
    /// Fail an attempt after this many seconds (None = no watchdog).
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    /// yt-dlp executable; looked up on PATH when unset.
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
    /// Directory or binary passed to yt-dlp as `--ffmpeg-location`.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Capacity of the broadcast channel behind `subscribe()`.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_event_buffer() -> usize {
    256
}

impl Default for PldlConfig {
    fn default() -> Self {
        Self {
            concurrent_downloads: 3,
            download_format: "mp4".to_string(),
            max_quality: "1080p".to_string(),
            download_location: None,
            job_timeout_secs: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl PldlConfig {
    /// Resolved base download directory.
    pub fn resolved_download_location(&self) -> PathBuf {
        if let Some(dir) = &self.download_location {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) if !home.is_empty() => Path::new(&home).join("Downloads").join("pldl"),
            _ => PathBuf::from("downloads"),
        }
    }
}

impl SettingsSource for PldlConfig {
    fn concurrent_downloads(&self) -> usize {
        self.concurrent_downloads.max(1)
    }

    fn download_format(&self) -> String {
        self.download_format.clone()
    }

    fn max_quality(&self) -> String {
        self.max_quality.clone()
    }

    fn download_location(&self) -> PathBuf {
        self.resolved_download_location()
    }
}

/// Config shared between the manager and whoever edits it at runtime.
/// Call `update_concurrency()` on the manager after changing the cap.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<PldlConfig>>,
}

impl SharedSettings {
    pub fn new(cfg: PldlConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cfg)),
        }
    }

    pub fn snapshot(&self) -> PldlConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut PldlConfig)) {
        let mut cfg = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut cfg);
    }
}

impl SettingsSource for SharedSettings {
    fn concurrent_downloads(&self) -> usize {
        self.snapshot().concurrent_downloads()
    }

    fn download_format(&self) -> String {
        self.snapshot().download_format
    }

    fn max_quality(&self) -> String {
        self.snapshot().max_quality
    }

    fn download_location(&self) -> PathBuf {
        self.snapshot().resolved_download_location()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pldl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PldlConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub(crate) fn load_or_init_at(path: &Path) -> Result<PldlConfig> {
    if !path.exists() {
        let default_cfg = PldlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PldlConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
