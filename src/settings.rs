use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::ApiConfig;
use crate::notification::NotificationBackend;

pub const TOKEN_ENV: &str = "OBJECTIVE_BOARD_TOKEN";
pub const API_URL_ENV: &str = "OBJECTIVE_BOARD_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const MIN_NOTIFICATION_DISPLAY_DURATION_MS: u64 = 1_000;
const MAX_NOTIFICATION_DISPLAY_DURATION_MS: u64 = 30_000;
const DEFAULT_NOTIFICATION_DISPLAY_DURATION_MS: u64 = 4_000;
const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 200;
const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub notification_backend: String,
    pub notification_display_duration_ms: u64,
    /// Browser URL for the self-evaluation step; `{task_id}` is substituted.
    pub self_evaluation_url: String,
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            notification_backend: NotificationBackend::default().as_str().to_string(),
            notification_display_duration_ms: DEFAULT_NOTIFICATION_DISPLAY_DURATION_MS,
            self_evaluation_url: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("objective-board").join("settings.toml"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from_path(&path))
            .unwrap_or_default()
    }

    /// Reads settings from `path`. A missing file yields defaults; an
    /// unreadable or malformed one yields defaults with a warning.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(mut settings)) => {
                settings.validate();
                settings
            }
            Ok(None) => Self::default(),
            Err(err) => {
                warn!(path = %path.display(), "ignoring settings file: {err:#}");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("failed to read settings"),
        };
        let settings = toml::from_str(&contents).context("failed to parse settings")?;
        Ok(Some(settings))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("no config directory on this platform"))?;
        self.save_to_path(&path)
    }

    /// Writes the validated settings next to `path` and renames into place.
    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let mut validated = self.clone();
        validated.validate();
        let contents = toml::to_string_pretty(&validated).context("failed to encode settings")?;

        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            bail!("settings path '{}' has no parent or file name", path.display());
        };
        fs::create_dir_all(dir).with_context(|| format!("failed to create '{}'", dir.display()))?;

        let staging = dir.join(format!(".{}.tmp", name.to_string_lossy()));
        fs::write(&staging, contents)
            .with_context(|| format!("failed to write '{}'", staging.display()))?;
        fs::rename(&staging, path)
            .with_context(|| format!("failed to replace '{}'", path.display()))
    }

    pub fn validate(&mut self) {
        self.request_timeout_ms = self
            .request_timeout_ms
            .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);
        self.notification_display_duration_ms = self.notification_display_duration_ms.clamp(
            MIN_NOTIFICATION_DISPLAY_DURATION_MS,
            MAX_NOTIFICATION_DISPLAY_DURATION_MS,
        );
        self.page_size = self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

        let base_url = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if base_url.starts_with("http://") || base_url.starts_with("https://")
        {
            base_url.to_string()
        } else {
            warn!(
                "invalid api_base_url '{}' in settings config; falling back to {}",
                self.api_base_url, DEFAULT_API_BASE_URL
            );
            DEFAULT_API_BASE_URL.to_string()
        };

        self.notification_backend =
            match NotificationBackend::from_settings_value(&self.notification_backend) {
                Some(backend) => backend.as_str().to_string(),
                None => {
                    warn!(
                        "invalid notification_backend '{}' in settings config; falling back to default",
                        self.notification_backend
                    );
                    NotificationBackend::default().as_str().to_string()
                }
            };

        self.self_evaluation_url = self.self_evaluation_url.trim().to_string();
    }

    /// Applies a base URL override (env var or `--api-url`) when present.
    pub fn override_api_url(&mut self, api_url: Option<&str>) {
        if let Some(api_url) = api_url.map(str::trim).filter(|url| !url.is_empty()) {
            self.api_base_url = api_url.to_string();
            self.validate();
        }
    }

    pub fn apply_env(&mut self) {
        let api_url = std::env::var(API_URL_ENV).ok();
        self.override_api_url(api_url.as_deref());
    }

    pub fn backend(&self) -> NotificationBackend {
        NotificationBackend::from_settings_value(&self.notification_backend).unwrap_or_default()
    }

    pub fn api_config(&self, token: Option<String>) -> ApiConfig {
        ApiConfig {
            base_url: self.api_base_url.clone(),
            token: token.filter(|token| !token.trim().is_empty()),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn token_from_env() -> Option<String> {
        std::env::var(TOKEN_ENV).ok()
    }
}
