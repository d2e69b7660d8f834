use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Configuration for hound
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of log lines retained per buffer generation
    pub max_lines: usize,
    /// How often the poller fetches the log text
    pub poll_interval_ms: u64,
    /// Per-fetch timeout; a timeout counts as an ordinary fetch failure
    pub fetch_timeout_ms: u64,
    /// Lines scanned between cooperative yields
    pub scan_chunk_lines: usize,
    /// Maximum number of result cards materialized at once
    pub result_window: usize,
    /// Context lines shown above and below each match
    pub snippet_context: usize,
    /// Quiet period before a typed query is committed
    pub debounce_ms: u64,
    /// Distance from the bottom (in lines) that still counts as "at the bottom"
    pub near_bottom_lines: usize,
    /// Memoized segment entries kept for the current term
    pub segment_cache_capacity: usize,
    /// How long a jumped-to line stays highlighted
    pub flash_ms: u64,
    /// Theme name (see `Theme::by_name`)
    pub theme: String,
    /// Directory that receives exported logs
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_lines: 50_000,
            poll_interval_ms: 1000,
            fetch_timeout_ms: 5000,
            scan_chunk_lines: 1000,
            result_window: 200,
            snippet_context: 2,
            debounce_ms: 150,
            near_bottom_lines: 2,
            segment_cache_capacity: 4096,
            flash_ms: 600,
            theme: "default".to_string(),
            export_dir: None,
        }
    }
}

impl Config {
    /// Load defaults, then the config file (if any), then environment overrides.
    pub fn load() -> Self {
        let mut config = Self::default_path()
            .filter(|path| path.exists())
            .map(|path| Self::from_file(&path))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config.sanitize();
        config
    }

    /// `$XDG_CONFIG_HOME/hound/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hound").join("config.toml"))
    }

    /// Parse a config file, falling back to defaults if it is unreadable or invalid.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply `HOUND_*` overrides. The lookup is injected so tests don't touch the process env.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        if let Some(v) = parse("HOUND_MAX_LINES") {
            self.max_lines = v as usize;
        }
        if let Some(v) = parse("HOUND_POLL_MS") {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parse("HOUND_FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = v;
        }
        if let Some(v) = parse("HOUND_DEBOUNCE_MS") {
            self.debounce_ms = v;
        }
        if let Some(theme) = lookup("HOUND_THEME") {
            self.theme = theme;
        }
    }

    /// Zero values would stall the poller or the scan loop
    fn sanitize(&mut self) {
        self.max_lines = self.max_lines.max(1);
        self.poll_interval_ms = self.poll_interval_ms.max(50);
        self.fetch_timeout_ms = self.fetch_timeout_ms.max(1);
        self.scan_chunk_lines = self.scan_chunk_lines.max(1);
        self.result_window = self.result_window.max(1);
        self.segment_cache_capacity = self.segment_cache_capacity.max(1);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
