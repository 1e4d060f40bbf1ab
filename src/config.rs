// Configuration loading. Unprefixed environment variables such as `PORT`
// override an optional TOML file, which overrides the defaults below

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Config file read from the working directory when present.
pub const CONFIG_FILE_NAME: &str = "flight-dashboard.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_VAR: &str = "FLIGHT_DASHBOARD_CONFIG";

const ENV_KEYS: &[&str] = &[
    "debug",
    "host",
    "port",
    "cors_origins",
    "openai_api_key",
    "ai_base_url",
    "ai_model",
    "ai_timeout_secs",
    "ai_failure_threshold",
    "ai_reset_timeout_secs",
    "sample_size",
    "sample_seed",
    "static_dir",
];

const MAX_SAMPLE_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Verbose logging. Accepts `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`.
    #[serde(deserialize_with = "deserialize_flag")]
    pub debug: bool,
    pub host: String,
    pub port: u16,
    /// Comma separated list of allowed origins, `*` for any.
    pub cors_origins: String,
    /// Key for the AI insight service. Insights fall back to local content
    /// when absent.
    pub openai_api_key: Option<String>,
    pub ai_base_url: String,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
    /// Consecutive AI failures before calls are skipped entirely.
    pub ai_failure_threshold: u32,
    pub ai_reset_timeout_secs: u64,
    /// Number of sample flights generated at startup.
    pub sample_size: usize,
    /// Fixed seed for reproducible sample data.
    pub sample_seed: Option<u64>,
    /// Dashboard assets served for non-API paths.
    pub static_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            other => Err(de::Error::custom(format!(
                "expected a boolean flag, found {other:?}"
            ))),
        },
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: "*".to_string(),
            openai_api_key: None,
            ai_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-3.5-turbo".to_string(),
            ai_timeout_secs: 10,
            ai_failure_threshold: 3,
            ai_reset_timeout_secs: 60,
            sample_size: 50,
            sample_seed: None,
            static_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the config file and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(&path)
    }

    pub fn load_from(config_file: &Path) -> Result<Self> {
        let config: Config = Self::figment(config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::raw().only(ENV_KEYS))
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config_validation("port must be greater than 0"));
        }

        if self.sample_size == 0 || self.sample_size > MAX_SAMPLE_SIZE {
            return Err(Error::config_validation(format!(
                "sample_size must be between 1 and {MAX_SAMPLE_SIZE}, got {}",
                self.sample_size
            )));
        }

        if self.ai_timeout_secs == 0 {
            return Err(Error::config_validation(
                "ai_timeout_secs must be greater than 0",
            ));
        }

        if self.ai_reset_timeout_secs == 0 {
            return Err(Error::config_validation(
                "ai_reset_timeout_secs must be greater than 0",
            ));
        }

        if self.host.trim().is_empty() {
            return Err(Error::config_validation("host must not be empty"));
        }

        Ok(())
    }

    /// `host:port`, resolved when the listener binds.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }

    /// Allowed CORS origins. `None` means any origin.
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn ai_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_reset_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8000);
        assert_eq!(config.api_key(), None);
        assert_eq!(config.cors_origin_list(), None);
    }

    #[test]
    fn test_load_from_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("DEBUG", "true");
            jail.set_env("HOST", "127.0.0.1");
            jail.set_env("PORT", "9090");
            jail.set_env("CORS_ORIGINS", "http://localhost:3000, https://dash.example.com");
            jail.set_env("OPENAI_API_KEY", "sk-test");
            jail.set_env("SAMPLE_SEED", "99");

            let config = Config::load_from(Path::new("missing.toml")).expect("config loads");
            assert!(config.debug);
            assert_eq!(config.bind_address(), "127.0.0.1:9090");
            assert_eq!(
                config.cors_origin_list(),
                Some(vec![
                    "http://localhost:3000".to_string(),
                    "https://dash.example.com".to_string()
                ])
            );
            assert_eq!(config.api_key(), Some("sk-test"));
            assert_eq!(config.sample_seed, Some(99));
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "dash.toml",
                r#"
                port = 7000
                sample_size = 120
                ai_model = "gpt-4o-mini"
                "#,
            )?;
            jail.set_env("PORT", "7100");

            let config = Config::load_from(Path::new("dash.toml")).expect("config loads");
            assert_eq!(config.port, 7100);
            assert_eq!(config.sample_size, 120);
            assert_eq!(config.ai_model, "gpt-4o-mini");
            Ok(())
        });
    }

    #[test]
    fn test_debug_flag_spellings() {
        let cases = [
            ("1", true),
            ("True", true),
            ("TRUE", true),
            ("yes", true),
            ("on", true),
            ("0", false),
            ("False", false),
            ("no", false),
        ];

        for (value, expected) in cases {
            Jail::expect_with(|jail| {
                jail.set_env("DEBUG", value);
                let config = Config::load_from(Path::new("missing.toml")).expect("config loads");
                assert_eq!(config.debug, expected, "DEBUG={value}");
                Ok(())
            });
        }
    }

    #[test]
    fn test_debug_flag_rejects_nonsense() {
        Jail::expect_with(|jail| {
            jail.set_env("DEBUG", "sometimes");
            let err = Config::load_from(Path::new("missing.toml")).unwrap_err();
            assert!(matches!(err, Error::ConfigLoad(_)), "{err}");
            Ok(())
        });
    }

    #[test]
    fn test_debug_flag_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("dash.toml", "debug = true")?;
            let config = Config::load_from(Path::new("dash.toml")).expect("config loads");
            assert!(config.debug);
            Ok(())
        });
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let config = Config {
            openai_api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Config {
                port: 0,
                ..Default::default()
            },
            Config {
                sample_size: 0,
                ..Default::default()
            },
            Config {
                sample_size: MAX_SAMPLE_SIZE + 1,
                ..Default::default()
            },
            Config {
                ai_timeout_secs: 0,
                ..Default::default()
            },
            Config {
                ai_reset_timeout_secs: 0,
                ..Default::default()
            },
            Config {
                host: "  ".to_string(),
                ..Default::default()
            },
        ];

        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::ConfigValidation { .. }), "{err}");
        }
    }
}
