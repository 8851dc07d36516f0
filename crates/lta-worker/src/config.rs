//! Environment-variable configuration loading.
//!
//! Mirrors the Python original's `from_environment(EXPECTED_CONFIG)` merge
//! pattern: each component declares the option set it needs, a required
//! option with no default fails startup with [`ConfigError::Missing`], and
//! a present-but-unparseable value fails with [`ConfigError::Invalid`].

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),
    #[error("environment variable {name}={value:?} is invalid: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn with_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ConfigError::Invalid {
            name: name.to_string(),
            value: raw.to_string(),
            reason: format!("{e}"),
        })
}

fn required_url(name: &str) -> Result<Url, ConfigError> {
    let raw = required(name)?;
    Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        value: raw,
        reason: format!("{e}"),
    })
}

fn seconds(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let value: f64 = parse(name, raw)?;
    Ok(Duration::from_secs_f64(value))
}

/// Configuration shared by every worker, corresponding to `COMMON_CONFIG`
/// plus the runtime's own recognized options.
#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub component_name: String,
    pub lta_rest_url: Url,
    pub lta_rest_token: String,
    pub heartbeat_patch_retries: u32,
    pub heartbeat_patch_timeout: Duration,
    pub heartbeat_sleep_duration: Duration,
    pub work_retries: u32,
    pub work_sleep_duration: Duration,
    pub work_timeout: Duration,
    pub run_once_and_die: bool,
}

impl CommonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_once_and_die_raw = with_default("RUN_ONCE_AND_DIE", "False");
        Ok(CommonConfig {
            component_name: required("COMPONENT_NAME")?,
            lta_rest_url: required_url("LTA_REST_URL")?,
            lta_rest_token: required("LTA_REST_TOKEN")?,
            heartbeat_patch_retries: parse("HEARTBEAT_PATCH_RETRIES", &with_default("HEARTBEAT_PATCH_RETRIES", "3"))?,
            heartbeat_patch_timeout: seconds(
                "HEARTBEAT_PATCH_TIMEOUT_SECONDS",
                &with_default("HEARTBEAT_PATCH_TIMEOUT_SECONDS", "30"),
            )?,
            heartbeat_sleep_duration: seconds(
                "HEARTBEAT_SLEEP_DURATION_SECONDS",
                &with_default("HEARTBEAT_SLEEP_DURATION_SECONDS", "60"),
            )?,
            work_retries: parse("WORK_RETRIES", &with_default("WORK_RETRIES", "3"))?,
            work_sleep_duration: seconds(
                "WORK_SLEEP_DURATION_SECONDS",
                &with_default("WORK_SLEEP_DURATION_SECONDS", "60"),
            )?,
            work_timeout: seconds("WORK_TIMEOUT_SECONDS", &with_default("WORK_TIMEOUT_SECONDS", "30"))?,
            run_once_and_die: parse_bool("RUN_ONCE_AND_DIE", &run_once_and_die_raw)?,
        })
    }

    /// Logs the resolved configuration, one key per line, in sorted order.
    /// Secrets (`lta_rest_token`) are redacted.
    pub fn log_resolved(&self, extra: &[(&str, String)]) {
        let mut lines: Vec<(String, String)> = vec![
            ("COMPONENT_NAME".into(), self.component_name.clone()),
            ("HEARTBEAT_PATCH_RETRIES".into(), self.heartbeat_patch_retries.to_string()),
            (
                "HEARTBEAT_PATCH_TIMEOUT_SECONDS".into(),
                self.heartbeat_patch_timeout.as_secs_f64().to_string(),
            ),
            (
                "HEARTBEAT_SLEEP_DURATION_SECONDS".into(),
                self.heartbeat_sleep_duration.as_secs_f64().to_string(),
            ),
            ("LTA_REST_TOKEN".into(), "<redacted>".into()),
            ("LTA_REST_URL".into(), self.lta_rest_url.to_string()),
            ("RUN_ONCE_AND_DIE".into(), self.run_once_and_die.to_string()),
            ("WORK_RETRIES".into(), self.work_retries.to_string()),
            (
                "WORK_SLEEP_DURATION_SECONDS".into(),
                self.work_sleep_duration.as_secs_f64().to_string(),
            ),
            ("WORK_TIMEOUT_SECONDS".into(), self.work_timeout.as_secs_f64().to_string()),
        ];
        for (key, value) in extra {
            lines.push(((*key).to_string(), value.clone()));
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in lines {
            tracing::info!(config_key = %key, config_value = %value, "resolved configuration");
        }
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Picker-specific configuration.
#[derive(Debug, Clone)]
pub struct PickerConfig {
    pub common: CommonConfig,
    pub source_site: String,
    pub file_catalog_rest_url: Url,
    pub file_catalog_rest_token: String,
    pub lta_site_config_path: String,
    pub max_file_count: u64,
}

impl PickerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PickerConfig {
            common: CommonConfig::from_env()?,
            source_site: required("SOURCE_SITE")?,
            file_catalog_rest_url: required_url("FILE_CATALOG_REST_URL")?,
            file_catalog_rest_token: required("FILE_CATALOG_REST_TOKEN")?,
            lta_site_config_path: with_default("LTA_SITE_CONFIG", "etc/site.json"),
            max_file_count: parse("MAX_FILE_COUNT", &with_default("MAX_FILE_COUNT", "25000"))?,
        })
    }
}

/// Locator-specific configuration.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub common: CommonConfig,
    pub source_site: String,
    pub dest_site: String,
    pub file_catalog_rest_url: Url,
    pub file_catalog_rest_token: String,
}

impl LocatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LocatorConfig {
            common: CommonConfig::from_env()?,
            source_site: required("SOURCE_SITE")?,
            dest_site: required("DEST_SITE")?,
            file_catalog_rest_url: required_url("FILE_CATALOG_REST_URL")?,
            file_catalog_rest_token: required("FILE_CATALOG_REST_TOKEN")?,
        })
    }
}

/// Rucio Stager-specific configuration.
#[derive(Debug, Clone)]
pub struct StagerConfig {
    pub common: CommonConfig,
    pub dest_site: String,
    pub bundler_outbox_path: String,
    pub rucio_inbox_path: String,
    pub dest_quota: u64,
}

impl StagerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(StagerConfig {
            common: CommonConfig::from_env()?,
            dest_site: required("DEST_SITE")?,
            bundler_outbox_path: required("BUNDLER_OUTBOX_PATH")?,
            rucio_inbox_path: required("RUCIO_INBOX_PATH")?,
            dest_quota: parse("DEST_QUOTA", &required("DEST_QUOTA")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests in
    // this module so they don't race each other's set/remove calls.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set_common_env() {
        std::env::set_var("COMPONENT_NAME", "test-worker");
        std::env::set_var("LTA_REST_URL", "http://lta-db.example/");
        std::env::set_var("LTA_REST_TOKEN", "test-token");
    }

    fn clear_common_env() {
        for key in [
            "COMPONENT_NAME",
            "LTA_REST_URL",
            "LTA_REST_TOKEN",
            "HEARTBEAT_PATCH_RETRIES",
            "HEARTBEAT_PATCH_TIMEOUT_SECONDS",
            "HEARTBEAT_SLEEP_DURATION_SECONDS",
            "WORK_RETRIES",
            "WORK_SLEEP_DURATION_SECONDS",
            "WORK_TIMEOUT_SECONDS",
            "RUN_ONCE_AND_DIE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn common_config_applies_defaults_and_rejects_missing_required() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_common_env();

        let missing = CommonConfig::from_env();
        assert!(matches!(missing, Err(ConfigError::Missing(name)) if name == "COMPONENT_NAME"));

        set_common_env();
        let config = CommonConfig::from_env().expect("should load with required vars set");
        assert_eq!(config.component_name, "test-worker");
        assert_eq!(config.work_retries, 3);
        assert!(!config.run_once_and_die);

        std::env::set_var("RUN_ONCE_AND_DIE", "true");
        let config = CommonConfig::from_env().unwrap();
        assert!(config.run_once_and_die);

        clear_common_env();
    }

    #[test]
    fn invalid_numeric_value_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_common_env();
        set_common_env();
        std::env::set_var("WORK_RETRIES", "not-a-number");

        let result = CommonConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid { name, .. }) if name == "WORK_RETRIES"));

        clear_common_env();
    }
}
