//! Configuration management for Sofin
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use thiserror::Error;

use crate::clock::BusinessClock;
use crate::loan::DEFAULT_SCHEDULE_MONTHS;
use crate::reminder::ReminderConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Offset of the business' wall clock from UTC, in minutes
    pub utc_offset_minutes: i32,

    /// Collection reminder preference
    pub reminder: ReminderConfig,

    /// Length of the schedule generated for a new loan
    pub schedule_months: u32,
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be true or false, got '{}'",
            name, value
        ))),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        // Mexico City by default
        let utc_offset_minutes = env::var("UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "-360".to_string())
            .parse::<i32>()
            .ok()
            .filter(|m| BusinessClock::from_offset_minutes(*m).is_some())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "UTC_OFFSET_MINUTES must be a whole number of minutes within +-24h"
                        .to_string(),
                )
            })?;

        let reminder_enabled = match env::var("REMINDER_ENABLED") {
            Ok(value) => parse_bool("REMINDER_ENABLED", &value)?,
            Err(_) => false,
        };
        let reminder_time = env::var("REMINDER_TIME").unwrap_or_else(|_| "09:00".to_string());
        let reminder = ReminderConfig::parse(&reminder_time, reminder_enabled).map_err(|_| {
            ConfigError::InvalidValue(format!(
                "REMINDER_TIME must be HH:MM, got '{}'",
                reminder_time
            ))
        })?;

        let schedule_months = env::var("SCHEDULE_MONTHS")
            .unwrap_or_else(|_| DEFAULT_SCHEDULE_MONTHS.to_string())
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=120).contains(m))
            .ok_or_else(|| {
                ConfigError::InvalidValue("SCHEDULE_MONTHS must be between 1 and 120".to_string())
            })?;

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            cors_allowed_origins,
            log_level,
            utc_offset_minutes,
            reminder,
            schedule_months,
        })
    }

    /// Clock used to decide which date "today" is
    pub fn clock(&self) -> BusinessClock {
        BusinessClock::from_offset_minutes(self.utc_offset_minutes)
            .unwrap_or_else(BusinessClock::utc)
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}
