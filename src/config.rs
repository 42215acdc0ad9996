// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`Settings`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root of the authoritative store | `/data` |
//! | `DATASITES_DIR` | Shared datasite tree (snapshots, tokens, markers) | `$DATA_DIR/datasites` |
//! | `PROJECTS_DIR` | Router project artifacts | `$DATA_DIR/projects` |
//! | `OWNER_EMAIL` | Identity owning this server's routers | Required |
//! | `CONTROL_TOKEN_SECRET` | Capability token secret | Generated and persisted |
//! | `CONTROL_TOKEN_TTL_DAYS` | Maximum capability token age | `90` |
//! | `AUTH_JWT_SECRET` | HS256 secret for caller session JWTs | Unset (development mode) |
//! | `LEDGER_URL` | Remote ledger base URL | Unset (in-process ledger) |
//! | `LEDGER_API_KEY` | Bearer key for the remote ledger | Optional |
//! | `PROVIDER_URL` | Custom chat/search upstream | Unset (built-in provider) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

use crate::capability::DEFAULT_TOKEN_TTL_DAYS;
use crate::identity;
use crate::storage::StoragePaths;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the authoritative data directory.
///
/// Router records, audit logs and the persisted token secret live here.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DATASITES_DIR_ENV: &str = "DATASITES_DIR";
pub const PROJECTS_DIR_ENV: &str = "PROJECTS_DIR";
pub const OWNER_EMAIL_ENV: &str = "OWNER_EMAIL";
pub const CONTROL_TOKEN_SECRET_ENV: &str = "CONTROL_TOKEN_SECRET";
pub const CONTROL_TOKEN_TTL_DAYS_ENV: &str = "CONTROL_TOKEN_TTL_DAYS";

/// Upper bound on the capability token age, in days.
pub const MAX_TOKEN_TTL_DAYS: i64 = 36_500;

/// HS256 secret for caller session tokens. When unset the server runs in
/// development mode and only checks token structure.
pub const AUTH_JWT_SECRET_ENV: &str = "AUTH_JWT_SECRET";
pub const LEDGER_URL_ENV: &str = "LEDGER_URL";
pub const LEDGER_API_KEY_ENV: &str = "LEDGER_API_KEY";
pub const PROVIDER_URL_ENV: &str = "PROVIDER_URL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub datasites_dir: Option<PathBuf>,
    pub projects_dir: Option<PathBuf>,
    /// Normalized owner identity.
    pub owner_email: String,
    pub control_token_secret: Option<String>,
    pub control_token_ttl_days: i64,
    pub auth_jwt_secret: Option<String>,
    pub ledger_url: Option<String>,
    pub ledger_api_key: Option<String>,
    pub provider_url: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let owner_email = get(OWNER_EMAIL_ENV)
            .map(|v| identity::normalize(&v))
            .ok_or(ConfigError::Missing(OWNER_EMAIL_ENV))?;
        if !identity::is_valid(&owner_email) {
            return Err(ConfigError::Invalid {
                name: OWNER_EMAIL_ENV,
                reason: format!("'{owner_email}' is not an email identity"),
            });
        }

        let port = match get(PORT_ENV) {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let control_token_ttl_days = match get(CONTROL_TOKEN_TTL_DAYS_ENV) {
            Some(v) => {
                let days = v.parse::<i64>().map_err(|e| ConfigError::Invalid {
                    name: CONTROL_TOKEN_TTL_DAYS_ENV,
                    reason: e.to_string(),
                })?;
                if !(1..=MAX_TOKEN_TTL_DAYS).contains(&days) {
                    return Err(ConfigError::Invalid {
                        name: CONTROL_TOKEN_TTL_DAYS_ENV,
                        reason: format!("must be between 1 and {MAX_TOKEN_TTL_DAYS}"),
                    });
                }
                days
            }
            None => DEFAULT_TOKEN_TTL_DAYS,
        };

        for (name, value) in [(LEDGER_URL_ENV, get(LEDGER_URL_ENV)), (PROVIDER_URL_ENV, get(PROVIDER_URL_ENV))] {
            if let Some(value) = value {
                url::Url::parse(&value).map_err(|e| ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                })?;
            }
        }

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            datasites_dir: get(DATASITES_DIR_ENV).map(PathBuf::from),
            projects_dir: get(PROJECTS_DIR_ENV).map(PathBuf::from),
            owner_email,
            control_token_secret: get(CONTROL_TOKEN_SECRET_ENV),
            control_token_ttl_days,
            auth_jwt_secret: get(AUTH_JWT_SECRET_ENV),
            ledger_url: get(LEDGER_URL_ENV),
            ledger_api_key: get(LEDGER_API_KEY_ENV),
            provider_url: get(PROVIDER_URL_ENV),
        })
    }

    /// Storage layout derived from the configured directories.
    pub fn storage_paths(&self) -> StoragePaths {
        let mut paths = StoragePaths::new(&self.data_dir);
        if let Some(dir) = &self.datasites_dir {
            paths = paths.with_datasites(dir);
        }
        if let Some(dir) = &self.projects_dir {
            paths = paths.with_projects(dir);
        }
        paths
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for tests: owner `alice@x`, everything else default.
    #[cfg(test)]
    pub fn for_tests(data_dir: &std::path::Path) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: data_dir.to_path_buf(),
            datasites_dir: None,
            projects_dir: None,
            owner_email: "alice@x".to_string(),
            control_token_secret: Some("test-control-token-secret-0123456789".to_string()),
            control_token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            auth_jwt_secret: None,
            ledger_url: None,
            ledger_api_key: None,
            provider_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn owner_email_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing(OWNER_EMAIL_ENV))));
    }

    #[test]
    fn defaults_apply() {
        let settings = load(&[(OWNER_EMAIL_ENV, " Alice@X ")]).unwrap();
        assert_eq!(settings.owner_email, "alice@x");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(settings.control_token_ttl_days, DEFAULT_TOKEN_TTL_DAYS);
        assert!(settings.ledger_url.is_none());
        assert!(settings.auth_jwt_secret.is_none());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let settings = load(&[(OWNER_EMAIL_ENV, "alice@x"), (LEDGER_URL_ENV, "")]).unwrap();
        assert!(settings.ledger_url.is_none());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(load(&[(OWNER_EMAIL_ENV, "alice@x"), (PORT_ENV, "http")]).is_err());
        assert!(load(&[(OWNER_EMAIL_ENV, "alice@x"), (CONTROL_TOKEN_TTL_DAYS_ENV, "0")]).is_err());
        assert!(load(&[(OWNER_EMAIL_ENV, "alice@x"), (CONTROL_TOKEN_TTL_DAYS_ENV, "36501")]).is_err());
        assert!(load(&[
            (OWNER_EMAIL_ENV, "alice@x"),
            (CONTROL_TOKEN_TTL_DAYS_ENV, "9223372036854775807")
        ])
        .is_err());
        let settings = load(&[(OWNER_EMAIL_ENV, "alice@x"), (CONTROL_TOKEN_TTL_DAYS_ENV, "36500")]).unwrap();
        assert_eq!(settings.control_token_ttl_days, MAX_TOKEN_TTL_DAYS);
        assert!(load(&[(OWNER_EMAIL_ENV, "alice@x"), (LEDGER_URL_ENV, "not a url")]).is_err());
        assert!(load(&[(OWNER_EMAIL_ENV, "alice")]).is_err());
    }

    #[test]
    fn datasites_dir_overrides_default() {
        let settings = load(&[
            (OWNER_EMAIL_ENV, "alice@x"),
            (DATA_DIR_ENV, "/srv/data"),
            (DATASITES_DIR_ENV, "/srv/shared"),
        ])
        .unwrap();
        let paths = settings.storage_paths();
        assert_eq!(paths.root(), std::path::Path::new("/srv/data"));
        assert_eq!(paths.datasites_root(), std::path::Path::new("/srv/shared"));
    }
}
