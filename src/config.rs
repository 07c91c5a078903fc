// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the crate. Configuration is loaded from the environment by
//! [`ClientConfig::from_env`]; [`ClientConfig::default`] yields the
//! production endpoints.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GSA_LOOKUP_URL` | GrandSlam bootstrap lookup endpoint | `https://gsa.apple.com/grandslam/GsService2/lookup` |
//! | `DEVELOPER_SERVICES_URL` | Developer services base URL | `https://developerservices2.apple.com/services` |
//! | `HTTP_TIMEOUT_SECS` | Per-request HTTP timeout | `30` |
//! | `DATA_DIR` | Directory for persisted credential sets | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::telemetry::LogFormat;

/// Environment variable name for the GrandSlam lookup endpoint.
pub const GSA_LOOKUP_URL_ENV: &str = "GSA_LOOKUP_URL";

/// Environment variable name for the developer services base URL.
pub const DEVELOPER_SERVICES_URL_ENV: &str = "DEVELOPER_SERVICES_URL";

/// Environment variable name for the HTTP timeout, in seconds.
pub const HTTP_TIMEOUT_SECS_ENV: &str = "HTTP_TIMEOUT_SECS";

/// Environment variable name for the data directory.
///
/// Credential sets (private key + certificate per identity) are written
/// here by [`crate::storage::DirectoryStorage`].
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_GSA_LOOKUP_URL: &str = "https://gsa.apple.com/grandslam/GsService2/lookup";
pub const DEFAULT_DEVELOPER_SERVICES_URL: &str = "https://developerservices2.apple.com/services";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Typed client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub lookup_url: String,
    pub developer_services_url: String,
    pub http_timeout: Duration,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lookup_url: DEFAULT_GSA_LOOKUP_URL.to_string(),
            developer_services_url: DEFAULT_DEVELOPER_SERVICES_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup_url = parse_url(
            GSA_LOOKUP_URL_ENV,
            &env_or_default(GSA_LOOKUP_URL_ENV, DEFAULT_GSA_LOOKUP_URL),
        )?;
        let developer_services_url = parse_url(
            DEVELOPER_SERVICES_URL_ENV,
            &env_or_default(DEVELOPER_SERVICES_URL_ENV, DEFAULT_DEVELOPER_SERVICES_URL),
        )?;

        let http_timeout = match env_optional(HTTP_TIMEOUT_SECS_ENV) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: HTTP_TIMEOUT_SECS_ENV,
                    value: raw.clone(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: HTTP_TIMEOUT_SECS_ENV,
                        value: raw,
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let data_dir = PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR));

        let log_format = match env_optional(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidValue {
                name: LOG_FORMAT_ENV,
                value: raw,
            })?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            lookup_url,
            developer_services_url,
            http_timeout,
            data_dir,
            log_format,
        })
    }
}

/// Validate `raw` as an absolute URL, normalizing away a trailing slash.
fn parse_url(name: &'static str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

pub(crate) fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}
