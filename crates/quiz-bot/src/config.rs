//! Environment-derived configuration
//!
//! Every required setting is checked up front and all problems are reported
//! together, before any store or transport is initialized.

use crate::error::{QuizError, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_ENCODING: &str = "KOI8-R";

/// Runtime configuration for both CLI commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the quiz question files.
    pub quiz_questions_directory: PathBuf,

    /// Encoding label of the quiz files (the corpus is KOI8-R).
    pub default_encoding: String,

    /// Maximum number of files processed per `populate_db` run.
    pub fileparsing_limit: usize,

    /// Telegram bot token from BotFather.
    pub telegram_bot_token: String,

    /// VK group access token.
    pub vk_group_token: String,

    /// Store connection settings.
    pub redis: RedisSettings,
}

/// Store connection: either a full URL or a host/port pair.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl RedisSettings {
    fn is_configured(&self) -> bool {
        self.url.is_some() || (self.host.is_some() && self.port.is_some())
    }

    /// Connection URL for the store client; `REDIS_URL` wins over host/port.
    pub fn connection_url(&self) -> String {
        match (&self.url, &self.host, self.port) {
            (Some(url), _, _) => url.clone(),
            (None, Some(host), Some(port)) => format!("redis://{host}:{port}"),
            // Unreachable after validation, but harmless as a default.
            _ => "redis://localhost:6379".to_string(),
        }
    }
}

fn missing(key: &str) -> String {
    format!("Environment variable {key} has not been configured properly.")
}

impl Config {
    /// Read and validate configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an injectable lookup (test seam).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut errors = Vec::new();

        let quiz_questions_directory = lookup("QUIZ_QUESTIONS_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                errors.push(missing("QUIZ_QUESTIONS_DIRECTORY"));
                PathBuf::new()
            });

        let default_encoding =
            lookup("QUIZ_QUESTIONS_ENCODING").unwrap_or_else(|| DEFAULT_ENCODING.to_string());
        if encoding_rs::Encoding::for_label(default_encoding.as_bytes()).is_none() {
            errors.push(format!(
                "Environment variable QUIZ_QUESTIONS_ENCODING holds an unknown encoding label: \
                 {default_encoding}."
            ));
        }

        let fileparsing_limit = lookup("QUIZ_QUESTIONS_FILEPARSING_LIMIT")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or_else(|| {
                errors.push(missing("QUIZ_QUESTIONS_FILEPARSING_LIMIT"));
                0
            });

        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_else(|| {
            errors.push(missing("TELEGRAM_BOT_TOKEN"));
            String::new()
        });

        let vk_group_token = lookup("VK_GROUP_TOKEN").unwrap_or_else(|| {
            errors.push(missing("VK_GROUP_TOKEN"));
            String::new()
        });

        let redis = RedisSettings {
            url: lookup("REDIS_URL"),
            host: lookup("REDIS_HOST"),
            port: lookup("REDIS_PORT").and_then(|value| value.parse().ok()),
        };
        if !redis.is_configured() {
            errors.push(missing("REDIS_URL (or REDIS_HOST and REDIS_PORT)"));
        }

        if !errors.is_empty() {
            return Err(QuizError::Config(errors.join("\n")));
        }

        Ok(Self {
            quiz_questions_directory,
            default_encoding,
            fileparsing_limit,
            telegram_bot_token,
            vk_group_token,
            redis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_environment() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("QUIZ_QUESTIONS_DIRECTORY", "/var/quiz"),
            ("QUIZ_QUESTIONS_FILEPARSING_LIMIT", "10"),
            ("TELEGRAM_BOT_TOKEN", "tg-token"),
            ("VK_GROUP_TOKEN", "vk-token"),
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "6379"),
        ])
    }

    fn load(vars: &HashMap<&str, &str>) -> Result<Config> {
        Config::from_lookup(|key| vars.get(key).map(ToString::to_string))
    }

    #[test]
    fn test_full_environment_loads() {
        let config = load(&full_environment()).unwrap();
        assert_eq!(config.fileparsing_limit, 10);
        assert_eq!(config.default_encoding, "KOI8-R");
        assert_eq!(config.redis.connection_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_redis_url_wins_over_host_port() {
        let mut vars = full_environment();
        vars.insert("REDIS_URL", "redis://quiz.example:6380/1");
        let config = load(&vars).unwrap();
        assert_eq!(config.redis.connection_url(), "redis://quiz.example:6380/1");
    }

    #[test]
    fn test_all_missing_settings_are_listed_together() {
        let err = load(&HashMap::new()).unwrap_err();
        let message = err.to_string();

        for key in [
            "QUIZ_QUESTIONS_DIRECTORY",
            "QUIZ_QUESTIONS_FILEPARSING_LIMIT",
            "TELEGRAM_BOT_TOKEN",
            "VK_GROUP_TOKEN",
            "REDIS_URL",
        ] {
            assert!(message.contains(key), "missing {key} in: {message}");
        }
    }

    #[test]
    fn test_zero_parsing_limit_rejected() {
        let mut vars = full_environment();
        vars.insert("QUIZ_QUESTIONS_FILEPARSING_LIMIT", "0");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("QUIZ_QUESTIONS_FILEPARSING_LIMIT"));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let mut vars = full_environment();
        vars.insert("QUIZ_QUESTIONS_ENCODING", "NOT-AN-ENCODING");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("unknown encoding label"));
    }

    #[test]
    fn test_host_without_port_is_not_enough() {
        let mut vars = full_environment();
        vars.remove("REDIS_PORT");
        assert!(load(&vars).is_err());
    }
}
