//! Process configuration, read from the environment and `.env`

use di::inject;
use di::injectable;
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "tinyllama:latest";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the Ollama daemon, without a trailing slash.
    pub ollama_host: String,
    /// Model preselected in the chat UI when it is installed.
    pub default_model: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub connect_timeout: Duration,
    /// Applies to each read of the upstream body, not to the whole stream.
    pub read_timeout: Duration,
    pub model_refresh_interval: Duration,
    pub cors_allowed_origins: Vec<String>,
    pub static_dir: String,
}

#[injectable]
impl GatewayConfig {
    #[inject]
    pub fn create() -> GatewayConfig {
        dotenvy::dotenv().ok();
        GatewayConfig::from_env()
    }
}

impl GatewayConfig {
    pub fn from_env() -> GatewayConfig {
        GatewayConfig::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GatewayConfig {
        let ollama_host = lookup("OLLAMA_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_owned())
            .trim()
            .trim_end_matches('/')
            .to_owned();

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        GatewayConfig {
            ollama_host,
            default_model: lookup("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 5000),
            debug: lookup("DEBUG").is_some_and(|v| v == "True"),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "OLLAMA_CONNECT_TIMEOUT_SECS",
                10,
            )),
            read_timeout: Duration::from_secs(parse_or(&lookup, "OLLAMA_READ_TIMEOUT_SECS", 120)),
            model_refresh_interval: Duration::from_secs(parse_or(
                &lookup,
                "MODEL_REFRESH_SECS",
                60,
            )),
            cors_allowed_origins,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "static".to_owned()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not valid, using {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.ollama_host, "http://127.0.0.1:11434");
        assert_eq!(config.default_model, "tinyllama:latest");
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert!(!config.debug);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(120));
        assert_eq!(config.model_refresh_interval, Duration::from_secs(60));
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(config.static_dir, "static");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OLLAMA_HOST", "http://gpu-box:11434/"),
            ("PORT", "8081"),
            ("DEBUG", "True"),
            ("MODEL_REFRESH_SECS", "5"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, http://localhost:5173,"),
        ]);

        assert_eq!(config.ollama_host, "http://gpu-box:11434");
        assert_eq!(config.port, 8081);
        assert!(config.debug);
        assert_eq!(config.model_refresh_interval, Duration::from_secs(5));
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_debug_requires_exact_true() {
        assert!(!config_from(&[("DEBUG", "true")]).debug);
        assert!(!config_from(&[("DEBUG", "False")]).debug);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "eighty"), ("OLLAMA_READ_TIMEOUT_SECS", "-1")]);

        assert_eq!(config.port, 5000);
        assert_eq!(config.read_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_blank_host_uses_default() {
        let config = config_from(&[("OLLAMA_HOST", "  ")]);
        assert_eq!(config.ollama_host, "http://127.0.0.1:11434");
    }
}
