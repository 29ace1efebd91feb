use crate::core_modules::annotator::AnnotationStyle;
use crate::core_modules::region::{REGION_HEIGHT, REGION_WIDTH};
use crate::core_modules::sampler::EdgePolicy;
use crate::error::ConfigError;
use crate::estimator::{DEFAULT_LUMA_THRESHOLD, EstimatorConfig};
use crate::notice::NoticeBoard;
use crate::payload::DEFAULT_JPEG_QUALITY;
use crate::store::{DEFAULT_STORE_KEY, RegionStore};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "PARKING_VISION_CONFIG";
pub const BACKEND_URL_ENV: &str = "PARKING_VISION_BACKEND_URL";
pub const STORE_DIR_ENV: &str = "PARKING_VISION_STORE_DIR";
pub const POLL_MS_ENV: &str = "PARKING_VISION_POLL_MS";

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_STORE_DIR: &str = ".parking_vision";
const DEFAULT_POLL_MS: u64 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTICE_TTL_SECS: u64 = 5;

/// Largest accepted region side in pixels.
pub const MAX_REGION_SIDE: u32 = 8192;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    estimator: Option<EstimatorConfigFile>,
    annotation: Option<AnnotationConfigFile>,
    store: Option<StoreConfigFile>,
    backend: Option<BackendConfigFile>,
    notices: Option<NoticesConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EstimatorConfigFile {
    luma_threshold: Option<f64>,
    region_width: Option<u32>,
    region_height: Option<u32>,
    edge_policy: Option<EdgePolicy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnotationConfigFile {
    outline_thickness: Option<u32>,
    fill_alpha: Option<f32>,
    label_scale: Option<u32>,
    show_index: Option<bool>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StoreConfigFile {
    dir: Option<PathBuf>,
    key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BackendConfigFile {
    url: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NoticesConfigFile {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub estimator: EstimatorConfig,
    pub annotation: AnnotationStyle,
    pub jpeg_quality: u8,
    pub store: StoreSettings,
    pub backend: BackendSettings,
    pub notice_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub dir: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl AppConfig {
    /// Reads the file named by `PARKING_VISION_CONFIG` (if any), then applies
    /// environment overrides and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses TOML text without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file_cfg: ConfigFile = toml::from_str(text)?;
        let cfg = Self::from_file(file_cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let estimator_file = file.estimator.unwrap_or_default();
        let annotation_file = file.annotation.unwrap_or_default();
        let store_file = file.store.unwrap_or_default();
        let backend_file = file.backend.unwrap_or_default();
        let notices_file = file.notices.unwrap_or_default();
        let default_style = AnnotationStyle::default();

        Self {
            estimator: EstimatorConfig {
                luma_threshold: estimator_file.luma_threshold.unwrap_or(DEFAULT_LUMA_THRESHOLD),
                region_width: estimator_file.region_width.unwrap_or(REGION_WIDTH),
                region_height: estimator_file.region_height.unwrap_or(REGION_HEIGHT),
                edge_policy: estimator_file.edge_policy.unwrap_or_default(),
            },
            annotation: AnnotationStyle {
                outline_thickness: annotation_file
                    .outline_thickness
                    .unwrap_or(default_style.outline_thickness),
                fill_alpha: annotation_file.fill_alpha.unwrap_or(default_style.fill_alpha),
                label_scale: annotation_file.label_scale.unwrap_or(default_style.label_scale),
                show_index: annotation_file.show_index.unwrap_or(default_style.show_index),
            },
            jpeg_quality: annotation_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            store: StoreSettings {
                dir: store_file.dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
                key: store_file.key.unwrap_or_else(|| DEFAULT_STORE_KEY.to_string()),
            },
            backend: BackendSettings {
                base_url: backend_file
                    .url
                    .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
                poll_interval: Duration::from_millis(
                    backend_file.poll_interval_ms.unwrap_or(DEFAULT_POLL_MS),
                ),
                request_timeout: Duration::from_secs(
                    backend_file
                        .request_timeout_secs
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                ),
                connect_timeout: Duration::from_secs(
                    backend_file
                        .connect_timeout_secs
                        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
                ),
            },
            notice_ttl: Duration::from_secs(notices_file.ttl_secs.unwrap_or(DEFAULT_NOTICE_TTL_SECS)),
        }
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production, a closure in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(dir) = lookup(STORE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.store.dir = PathBuf::from(dir.trim());
        }
        if let Some(raw) = lookup(POLL_MS_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{POLL_MS_ENV} must be an integer, got {raw:?}"))
            })?;
            self.backend.poll_interval = Duration::from_millis(millis);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.estimator.luma_threshold.is_finite()
            || !(0.0..=255.0).contains(&self.estimator.luma_threshold)
        {
            return Err(ConfigError::Invalid(
                "estimator.luma_threshold must be within 0..=255".into(),
            ));
        }
        let side = 1..=MAX_REGION_SIDE;
        if !side.contains(&self.estimator.region_width) || !side.contains(&self.estimator.region_height) {
            return Err(ConfigError::Invalid(format!(
                "estimator region size must be within 1..={MAX_REGION_SIDE} pixels"
            )));
        }
        if !(0.0..=1.0).contains(&self.annotation.fill_alpha) {
            return Err(ConfigError::Invalid(
                "annotation.fill_alpha must be within 0.0..=1.0".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(
                "annotation.jpeg_quality must be within 1..=100".into(),
            ));
        }
        if self.store.key.is_empty() || self.store.key.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(
                "store.key must be a non-empty name without path separators".into(),
            ));
        }
        if !(self.backend.base_url.starts_with("http://")
            || self.backend.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(
                "backend.url must start with http:// or https://".into(),
            ));
        }
        if self.backend.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "backend poll interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn region_store(&self) -> RegionStore {
        RegionStore::new(self.store.dir.clone(), self.store.key.clone())
    }

    pub fn notice_board(&self) -> NoticeBoard {
        NoticeBoard::new(self.notice_ttl)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_classic_demo() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.estimator.luma_threshold, 100.0);
        assert_eq!((cfg.estimator.region_width, cfg.estimator.region_height), (100, 50));
        assert_eq!(cfg.estimator.edge_policy, EdgePolicy::Clamp);
        assert_eq!(cfg.annotation.outline_thickness, 3);
        assert_eq!(cfg.store.key, "parkingSpaces");
        assert_eq!(cfg.backend.poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.notice_ttl, Duration::from_secs(5));
        cfg.validate().unwrap();
    }

    #[test]
    fn toml_overrides_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [estimator]
            luma_threshold = 80.0
            edge_policy = "reject"

            [annotation]
            show_index = true
            jpeg_quality = 70

            [store]
            dir = "/tmp/lot"
            key = "northLot"

            [backend]
            url = "http://detector:5000"
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(cfg.estimator.luma_threshold, 80.0);
        assert_eq!(cfg.estimator.edge_policy, EdgePolicy::Reject);
        assert!(cfg.annotation.show_index);
        assert_eq!(cfg.jpeg_quality, 70);
        assert_eq!(cfg.store.dir, PathBuf::from("/tmp/lot"));
        assert_eq!(cfg.store.key, "northLot");
        assert_eq!(cfg.backend.base_url, "http://detector:5000");
        assert_eq!(cfg.backend.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.estimator.region_width, 100);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            (BACKEND_URL_ENV, "https://lot.example"),
            (STORE_DIR_ENV, "/var/lib/parking"),
            (POLL_MS_ENV, "500"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.backend.base_url, "https://lot.example");
        assert_eq!(cfg.store.dir, PathBuf::from("/var/lib/parking"));
        assert_eq!(cfg.backend.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn bad_poll_override_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_overrides(|name| (name == POLL_MS_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        for text in [
            "[estimator]\nluma_threshold = 300.0",
            "[estimator]\nregion_width = 0",
            "[annotation]\nfill_alpha = 1.5",
            "[store]\nkey = \"../escape\"",
            "[backend]\nurl = \"ftp://nope\"",
            "[backend]\npoll_interval_ms = 0",
        ] {
            assert!(
                matches!(AppConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn oversized_regions_are_rejected() {
        let err = AppConfig::from_toml_str("[estimator]\nregion_width = 100000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = AppConfig::from_toml_str("[estimator]\nregion_height = 4294967295\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(AppConfig::from_toml_str("[estimator]\nregion_width = 8192\n").is_ok());
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        assert!(matches!(
            AppConfig::from_toml_str("[estimator]\nthreshold = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = AppConfig::load_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { path, .. } if path.ends_with("here.toml")));
    }
}
