//! ## Connection profiles
//!
//! Database credentials are kept out of the job configuration, in an `io_config.yaml`
//! file holding one section per profile:
//!
//! ```yaml
//! dev:
//!   POSTGRES_DBNAME: ny_taxi
//!   POSTGRES_SCHEMA: mage
//!   POSTGRES_USER: "{{ env_var('POSTGRES_USER') }}"
//!   POSTGRES_PASSWORD: "{{ env_var('POSTGRES_PASSWORD') }}"
//!   POSTGRES_HOST: postgres
//!   POSTGRES_PORT: 5432
//! ```
//!
//! `{{ env_var('NAME') }}` placeholders are replaced with the value of the environment
//! variable before the file is parsed.

use crate::exceptions::{EtlError, EtlResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Replaces every `{{ env_var('NAME') }}` placeholder using `lookup`.
pub fn render_env_vars<F>(text: &str, lookup: F) -> EtlResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let placeholder = Regex::new(
        r#"\{\{\s*env_var\(\s*['"]([A-Za-z_][A-Za-z0-9_]*)['"]\s*\)\s*\}\}"#,
    )
    .map_err(|e| EtlError::Config(e.to_string()))?;

    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;
    for caps in placeholder.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = lookup(name.as_str()).ok_or_else(|| {
            EtlError::Config(format!(
                "Environment variable '{}' is not set",
                name.as_str()
            ))
        })?;
        rendered.push_str(&text[last..whole.start()]);
        rendered.push_str(&value);
        last = whole.end();
    }
    rendered.push_str(&text[last..]);
    Ok(rendered)
}

/// Numbers may be written bare or quoted (placeholders always render as text).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

impl NumberOrText {
    fn to_u64(&self, key: &str) -> EtlResult<u64> {
        match self {
            NumberOrText::Number(n) => Ok(*n),
            NumberOrText::Text(s) => s.trim().parse().map_err(|_| {
                EtlError::Config(format!("{} must be a number, found '{}'", key, s))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPostgresProfile {
    #[serde(rename = "POSTGRES_DBNAME")]
    dbname: String,
    #[serde(rename = "POSTGRES_USER")]
    user: String,
    #[serde(rename = "POSTGRES_PASSWORD", default)]
    password: Option<String>,
    #[serde(rename = "POSTGRES_HOST")]
    host: String,
    #[serde(rename = "POSTGRES_PORT", default)]
    port: Option<NumberOrText>,
    #[serde(rename = "POSTGRES_CONNECT_TIMEOUT", default)]
    connect_timeout: Option<NumberOrText>,
}

/// PostgreSQL connection parameters of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresProfile {
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub connect_timeout: Option<Duration>,
}

impl TryFrom<RawPostgresProfile> for PostgresProfile {
    type Error = EtlError;

    fn try_from(raw: RawPostgresProfile) -> EtlResult<Self> {
        let port = match raw.port {
            Some(port) => {
                let port = port.to_u64("POSTGRES_PORT")?;
                u16::try_from(port).map_err(|_| {
                    EtlError::Config(format!("POSTGRES_PORT {} is out of range", port))
                })?
            }
            None => DEFAULT_POSTGRES_PORT,
        };
        let connect_timeout = raw
            .connect_timeout
            .map(|t| t.to_u64("POSTGRES_CONNECT_TIMEOUT"))
            .transpose()?
            .map(Duration::from_secs);
        Ok(Self {
            dbname: raw.dbname,
            user: raw.user,
            password: raw.password,
            host: raw.host,
            port,
            connect_timeout,
        })
    }
}

impl PostgresProfile {
    /// Parses `profile` out of the text of an `io_config.yaml` file.
    pub fn from_yaml<F>(text: &str, profile: &str, lookup: F) -> EtlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rendered = render_env_vars(text, lookup)?;
        let mut profiles: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&rendered)?;
        let section = profiles.remove(profile).ok_or_else(|| {
            EtlError::Config(format!("Profile '{}' not found in io_config", profile))
        })?;
        let raw: RawPostgresProfile = serde_yaml::from_value(section)?;
        raw.try_into()
    }

    /// Reads `profile` from an `io_config.yaml` file, resolving placeholders from the
    /// process environment.
    pub fn load(path: &Path, profile: &str) -> EtlResult<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Using profile '{}' from {}", profile, path.display());
        Self::from_yaml(&text, profile, |name| std::env::var(name).ok())
    }

    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user);
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IO_CONFIG: &str = r#"
version: 0.1.1
default:
  POSTGRES_CONNECT_TIMEOUT: 10
  POSTGRES_DBNAME: postgres
  POSTGRES_SCHEMA: public
  POSTGRES_USER: username
  POSTGRES_PASSWORD: password
  POSTGRES_HOST: hostname
  POSTGRES_PORT: 5432
dev:
  POSTGRES_DBNAME: "{{ env_var('POSTGRES_DBNAME') }}"
  POSTGRES_SCHEMA: "{{ env_var('POSTGRES_SCHEMA') }}"
  POSTGRES_USER: "{{ env_var('POSTGRES_USER') }}"
  POSTGRES_PASSWORD: "{{ env_var('POSTGRES_PASSWORD') }}"
  POSTGRES_HOST: "{{ env_var('POSTGRES_HOST') }}"
  POSTGRES_PORT: "{{ env_var('POSTGRES_PORT') }}"
"#;

    fn dev_env(name: &str) -> Option<String> {
        match name {
            "POSTGRES_DBNAME" => Some("ny_taxi".into()),
            "POSTGRES_SCHEMA" => Some("mage".into()),
            "POSTGRES_USER" => Some("root".into()),
            "POSTGRES_PASSWORD" => Some("root".into()),
            "POSTGRES_HOST" => Some("postgres".into()),
            "POSTGRES_PORT" => Some("5433".into()),
            _ => None,
        }
    }

    #[test]
    fn test_render_env_vars() {
        let rendered =
            render_env_vars("user: {{ env_var('POSTGRES_USER') }}, x: {{env_var(\"X\")}}", |n| {
                Some(format!("<{}>", n))
            })
            .unwrap();
        assert_eq!(rendered, "user: <POSTGRES_USER>, x: <X>");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let text = "dev:\n  POSTGRES_HOST: localhost\n";
        assert_eq!(render_env_vars(text, |_| None).unwrap(), text);
    }

    #[test]
    fn test_unset_env_var_is_config_error() {
        let result = render_env_vars("{{ env_var('MISSING') }}", |_| None);
        match result {
            Err(EtlError::Config(msg)) => assert!(msg.contains("MISSING")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_profile() {
        let profile = PostgresProfile::from_yaml(IO_CONFIG, "default", |_| None).unwrap();
        assert_eq!(profile.dbname, "postgres");
        assert_eq!(profile.user, "username");
        assert_eq!(profile.password.as_deref(), Some("password"));
        assert_eq!(profile.host, "hostname");
        assert_eq!(profile.port, 5432);
        assert_eq!(profile.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_dev_profile_from_env() {
        let profile = PostgresProfile::from_yaml(IO_CONFIG, "dev", dev_env).unwrap();
        assert_eq!(profile.dbname, "ny_taxi");
        assert_eq!(profile.host, "postgres");
        assert_eq!(profile.port, 5433);
        assert_eq!(profile.connect_timeout, None);
    }

    #[test]
    fn test_unknown_profile() {
        let result = PostgresProfile::from_yaml(IO_CONFIG, "prod", |_| None);
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_invalid_port() {
        let text = "dev:\n  POSTGRES_DBNAME: d\n  POSTGRES_USER: u\n  POSTGRES_HOST: h\n  POSTGRES_PORT: '70000'\n";
        let result = PostgresProfile::from_yaml(text, "dev", |_| None);
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_port_defaults() {
        let text = "dev:\n  POSTGRES_DBNAME: d\n  POSTGRES_USER: u\n  POSTGRES_HOST: h\n";
        let profile = PostgresProfile::from_yaml(text, "dev", |_| None).unwrap();
        assert_eq!(profile.port, DEFAULT_POSTGRES_PORT);
        assert_eq!(profile.password, None);
    }

    #[test]
    fn test_pg_config() {
        let profile = PostgresProfile::from_yaml(IO_CONFIG, "default", |_| None).unwrap();
        let config = profile.pg_config();
        assert_eq!(config.get_dbname(), Some("postgres"));
        assert_eq!(config.get_user(), Some("username"));
        assert_eq!(config.get_ports(), &[5432]);
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(10)));
    }
}
