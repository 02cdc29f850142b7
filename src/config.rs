use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".SalatReminder";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_REFRESH_TIME: &str = "00:05";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Desktop,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub notifier: NotifierKind,
    pub icon_path: Option<PathBuf>,
    pub calculation_method: u8,
    pub translation_edition: String,
    pub dhikr_category: String,
    pub dua_category: String,
    pub prayer_refresh_time: String,
    pub prayer_api_base_url: String,
    pub quran_api_base_url: String,
    pub dhikr_api_base_url: String,
    pub geocoding_api_base_url: String,
    pub overpass_api_url: String,
    pub http_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("reminders.db"),
            api_port: 7891,
            notifier: NotifierKind::Desktop,
            icon_path: None,
            calculation_method: 2,
            translation_edition: "en.sahih".to_string(),
            dhikr_category: "zikir-pagi-petang".to_string(),
            dua_category: "daily-dua".to_string(),
            prayer_refresh_time: DEFAULT_REFRESH_TIME.to_string(),
            prayer_api_base_url: "https://api.aladhan.com/v1".to_string(),
            quran_api_base_url: "https://api.alquran.cloud/v1".to_string(),
            dhikr_api_base_url: "https://dua-dhikr.vercel.app".to_string(),
            geocoding_api_base_url: "https://nominatim.openstreetmap.org".to_string(),
            overpass_api_url: "https://overpass-api.de/api/interpreter".to_string(),
            http_timeout_seconds: 15,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn parse_refresh_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.prayer_refresh_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let trimmed = value.trim();

        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(trimmed);
            }
            "api_port" => {
                self.api_port = trimmed
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "notifier" => {
                self.notifier = match trimmed {
                    "desktop" => NotifierKind::Desktop,
                    "log" => NotifierKind::Log,
                    _ => bail!("notifier must be desktop/log"),
                };
            }
            "icon_path" => {
                self.icon_path = (!trimmed.is_empty()).then(|| expand_home(trimmed));
            }
            "calculation_method" => {
                self.calculation_method = trimmed
                    .parse::<u8>()
                    .map_err(|_| anyhow!("calculation_method must be a number"))?;
            }
            "translation_edition" => {
                if trimmed.is_empty() {
                    bail!("translation_edition cannot be empty");
                }
                self.translation_edition = trimmed.to_string();
            }
            "dhikr_category" => {
                self.dhikr_category = non_empty_slug(trimmed, "dhikr_category")?;
            }
            "dua_category" => {
                self.dua_category = non_empty_slug(trimmed, "dua_category")?;
            }
            "prayer_refresh_time" => {
                parse_hhmm(trimmed)?;
                self.prayer_refresh_time = trimmed.to_string();
            }
            "prayer_api_base_url" => {
                self.prayer_api_base_url = trimmed.trim_end_matches('/').to_string();
            }
            "quran_api_base_url" => {
                self.quran_api_base_url = trimmed.trim_end_matches('/').to_string();
            }
            "dhikr_api_base_url" => {
                self.dhikr_api_base_url = trimmed.trim_end_matches('/').to_string();
            }
            "geocoding_api_base_url" => {
                self.geocoding_api_base_url = trimmed.trim_end_matches('/').to_string();
            }
            "overpass_api_url" => {
                self.overpass_api_url = trimmed.to_string();
            }
            "http_timeout_seconds" => {
                self.http_timeout_seconds = trimmed
                    .parse::<u64>()
                    .map_err(|_| anyhow!("http_timeout_seconds must be a number"))?
                    .max(3);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, notifier|notify.backend, icon_path|notify.icon, calculation_method|prayer.method, translation_edition|quran.translation, dhikr_category|dhikr.category, dua_category|dua.category, prayer_refresh_time|prayer.refresh_time, prayer_api_base_url|providers.prayer_url, quran_api_base_url|providers.quran_url, dhikr_api_base_url|providers.dhikr_url, geocoding_api_base_url|providers.geocoding_url, overpass_api_url|providers.overpass_url, http_timeout_seconds|http.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "notifier" => Some(
                match self.notifier {
                    NotifierKind::Desktop => "desktop",
                    NotifierKind::Log => "log",
                }
                .to_string(),
            ),
            "icon_path" => Some(
                self.icon_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "calculation_method" => Some(self.calculation_method.to_string()),
            "translation_edition" => Some(self.translation_edition.clone()),
            "dhikr_category" => Some(self.dhikr_category.clone()),
            "dua_category" => Some(self.dua_category.clone()),
            "prayer_refresh_time" => Some(self.prayer_refresh_time.clone()),
            "prayer_api_base_url" => Some(self.prayer_api_base_url.clone()),
            "quran_api_base_url" => Some(self.quran_api_base_url.clone()),
            "dhikr_api_base_url" => Some(self.dhikr_api_base_url.clone()),
            "geocoding_api_base_url" => Some(self.geocoding_api_base_url.clone()),
            "overpass_api_url" => Some(self.overpass_api_url.clone()),
            "http_timeout_seconds" => Some(self.http_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "notifier" | "notify.backend" => "notifier",
        "icon_path" | "notify.icon" => "icon_path",
        "calculation_method" | "prayer.method" => "calculation_method",
        "translation_edition" | "quran.translation" => "translation_edition",
        "dhikr_category" | "dhikr.category" => "dhikr_category",
        "dua_category" | "dua.category" => "dua_category",
        "prayer_refresh_time" | "prayer.refresh_time" => "prayer_refresh_time",
        "prayer_api_base_url" | "providers.prayer_url" => "prayer_api_base_url",
        "quran_api_base_url" | "providers.quran_url" => "quran_api_base_url",
        "dhikr_api_base_url" | "providers.dhikr_url" => "dhikr_api_base_url",
        "geocoding_api_base_url" | "providers.geocoding_url" => "geocoding_api_base_url",
        "overpass_api_url" | "providers.overpass_url" => "overpass_api_url",
        "http_timeout_seconds" | "http.timeout_seconds" => "http_timeout_seconds",
        _ => key,
    }
}

fn non_empty_slug(value: &str, key: &str) -> Result<String> {
    if value.is_empty() || value.contains('/') {
        bail!("{key} must be a single category slug (example: daily-dua)");
    }

    Ok(value.to_string())
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 05:30 (24-hour format)"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_aliases_map_to_fields() {
        let mut config = Config::default();
        config.set_value("api.port", "8100").expect("port");
        config
            .set_value("providers.prayer_url", "http://localhost:9000/v1/")
            .expect("prayer url");
        config.set_value("notify.backend", "log").expect("notifier");

        assert_eq!(config.api_port, 8100);
        assert_eq!(config.prayer_api_base_url, "http://localhost:9000/v1");
        assert_eq!(config.notifier, NotifierKind::Log);
        assert_eq!(config.get_value("api_port").as_deref(), Some("8100"));
        assert_eq!(config.get_value("notify.icon").as_deref(), Some("not_set"));
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();

        assert!(config.set_value("api_port", "not-a-port").is_err());
        assert!(config.set_value("prayer.refresh_time", "25:99").is_err());
        assert!(config.set_value("dua.category", "a/b").is_err());
        assert!(config.set_value("unknown.key", "x").is_err());
    }

    #[test]
    fn timeout_has_a_floor() {
        let mut config = Config::default();
        config.set_value("http.timeout_seconds", "0").expect("timeout");
        assert_eq!(config.http_timeout_seconds, 3);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_port": 9001}"#).expect("parse");
        assert_eq!(config.api_port, 9001);
        assert_eq!(config.dua_category, "daily-dua");
        assert_eq!(config.parse_refresh_time().expect("time").to_string(), "00:05:00");
    }
}
