//! Provider configuration.
//!
//! Values come from an optional YAML file, overridden by `LIFEOMIC_*`
//! environment variables (`LIFEOMIC_TOKEN`, `LIFEOMIC_HOST`,
//! `LIFEOMIC_ACCOUNT`, `LIFEOMIC_USER`, `LIFEOMIC_DEBUG`, ...). Headers from
//! the `PHC_HEADERS` JSON object are merged over everything else.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use secrecy::SecretString;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

pub const ENV_PREFIX: &str = "LIFEOMIC_";
/// Environment variable holding extra headers as a JSON object.
pub const HEADERS_ENV: &str = "PHC_HEADERS";
pub const DEFAULT_HOST: &str = "api.us.lifeomic.com";
pub const DEFAULT_API_VERSION: &str = "v1";

/// Connection settings for the platform API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API host, or a full `scheme://host[:port]` origin.
    #[serde(deserialize_with = "deserialize_text")]
    pub host: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub api_version: String,
    /// Account sent as `LifeOmic-Account` on account-scoped requests.
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub account: Option<String>,
    /// Bearer token.
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,
    /// User sent as `LifeOmic-User`, for service tokens acting on behalf of a user.
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub user: Option<String>,
    /// Log request and response bodies at debug level.
    pub debug: bool,
    pub max_retries: u32,
    pub max_retry_wait_ms: u64,
    /// Extra headers added to every request. Either a map or a JSON object
    /// string, so `LIFEOMIC_HEADERS='{"x-a":"1"}'` works.
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            account: None,
            token: None,
            user: None,
            debug: false,
            max_retries: 3,
            max_retry_wait_ms: 1000,
            headers: BTreeMap::new(),
        }
    }
}

/// A scalar read back as text.
///
/// Environment values are typed by figment, so `LIFEOMIC_ACCOUNT=12345`
/// arrives as a number.
struct Text(String);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor;

        impl Visitor<'_> for TextVisitor {
            type Value = Text;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Text, E> {
                Ok(Text(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Text, E> {
                Ok(Text(v))
            }

            fn visit_char<E: de::Error>(self, v: char) -> Result<Text, E> {
                Ok(Text(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Text, E> {
                Ok(Text(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Text, E> {
                Ok(Text(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Text, E> {
                Ok(Text(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Text, E> {
                Ok(Text(v.to_string()))
            }
        }

        deserializer.deserialize_any(TextVisitor)
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Text::deserialize(deserializer).map(|t| t.0)
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Text>::deserialize(deserializer)?.map(|t| t.0))
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = deserialize_optional_text(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHeaders {
    Map(BTreeMap<String, Text>),
    Json(String),
}

fn deserialize_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawHeaders::deserialize(deserializer)? {
        RawHeaders::Map(map) => Ok(map.into_iter().map(|(k, v)| (k, v.0)).collect()),
        RawHeaders::Json(text) => parse_headers(&text).map_err(de::Error::custom),
    }
}

/// Parse a JSON object of header names to values; blank input is no headers.
fn parse_headers(text: &str) -> Result<BTreeMap<String, String>, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let map: BTreeMap<String, Text> = serde_json::from_str(text)?;
    Ok(map.into_iter().map(|(k, v)| (k, v.0)).collect())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", path.display())]
    MissingFile { path: PathBuf },

    #[error("invalid provider configuration: {0}")]
    Invalid(#[source] Box<figment::Error>),

    #[error("unable to get headers from {HEADERS_ENV}: {0}")]
    EnvHeaders(#[source] serde_json::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Invalid(Box::new(e))
    }
}

impl ProviderConfig {
    /// Load configuration from `path` (if any) and the environment.
    ///
    /// # Errors
    ///
    /// - `MissingFile` if `path` is given but does not exist
    /// - `Invalid` if a value has the wrong type
    /// - `EnvHeaders` if `PHC_HEADERS` is not a JSON object of scalars
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;

        let env_headers = std::env::var(HEADERS_ENV).unwrap_or_default();
        config
            .headers
            .extend(parse_headers(&env_headers).map_err(ConfigError::EnvHeaders)?);
        Ok(config)
    }

    /// Base URL every API path is appended to, e.g. `https://api.us.lifeomic.com/v1`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let version = self.api_version.trim_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/{version}")
        } else {
            format!("https://{host}/{version}")
        }
    }

    #[must_use]
    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_millis(self.max_retry_wait_ms)
    }

    /// Account header value, `None` when unset or blank.
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref().filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    const VARS: [&str; 7] = [
        "LIFEOMIC_HOST",
        "LIFEOMIC_TOKEN",
        "LIFEOMIC_ACCOUNT",
        "LIFEOMIC_USER",
        "LIFEOMIC_DEBUG",
        "LIFEOMIC_HEADERS",
        "PHC_HEADERS",
    ];

    #[test]
    fn defaults_without_file_or_environment() {
        temp_env::with_vars_unset(VARS, || {
            let config = ProviderConfig::load(None).unwrap();
            assert_eq!(config.base_url(), "https://api.us.lifeomic.com/v1");
            assert!(config.token.is_none());
            assert_eq!(config.account(), None);
            assert_eq!(config.max_retries, 3);
            assert_eq!(config.max_retry_wait(), Duration::from_secs(1));
            assert!(!config.debug);
        });
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "host: api.file.example\naccount: from-file\nmax_retries: 5\nheaders:\n  x-trace: enabled"
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("LIFEOMIC_HOST", None),
                ("LIFEOMIC_TOKEN", Some("s3cret")),
                ("LIFEOMIC_ACCOUNT", Some("from-env")),
                ("LIFEOMIC_USER", None),
                ("LIFEOMIC_DEBUG", Some("true")),
                ("LIFEOMIC_HEADERS", None),
                ("PHC_HEADERS", None),
            ],
            || {
                let config = ProviderConfig::load(Some(file.path())).unwrap();
                assert_eq!(config.base_url(), "https://api.file.example/v1");
                assert_eq!(config.account(), Some("from-env"));
                assert_eq!(
                    config.token.as_ref().map(ExposeSecret::expose_secret),
                    Some("s3cret")
                );
                assert_eq!(config.max_retries, 5);
                assert_eq!(config.headers.get("x-trace").map(String::as_str), Some("enabled"));
                assert!(config.debug);
            },
        );
    }

    #[test]
    fn numeric_environment_values_load_as_text() {
        temp_env::with_vars(
            [
                ("LIFEOMIC_HOST", None),
                ("LIFEOMIC_TOKEN", Some("42")),
                ("LIFEOMIC_ACCOUNT", Some("12345")),
                ("LIFEOMIC_USER", Some("1001")),
                ("LIFEOMIC_DEBUG", None),
                ("LIFEOMIC_HEADERS", None),
                ("PHC_HEADERS", None),
            ],
            || {
                let config = ProviderConfig::load(None).unwrap();
                assert_eq!(config.account(), Some("12345"));
                assert_eq!(config.user.as_deref(), Some("1001"));
                assert_eq!(
                    config.token.as_ref().map(ExposeSecret::expose_secret),
                    Some("42")
                );
            },
        );
    }

    #[test]
    fn env_headers_merge_over_configured_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "headers:\n  x-trace: file\n  x-team: core").unwrap();

        temp_env::with_vars(
            [
                ("LIFEOMIC_HOST", None),
                ("LIFEOMIC_TOKEN", None),
                ("LIFEOMIC_ACCOUNT", None),
                ("LIFEOMIC_USER", None),
                ("LIFEOMIC_DEBUG", None),
                ("LIFEOMIC_HEADERS", None),
                (
                    "PHC_HEADERS",
                    Some(r#"{"x-trace": "env", "LifeOmic-Policy": "{\"rules\":{}}"}"#),
                ),
            ],
            || {
                let config = ProviderConfig::load(Some(file.path())).unwrap();
                let headers: Vec<_> = config
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                assert_eq!(
                    headers,
                    [
                        ("LifeOmic-Policy", r#"{"rules":{}}"#),
                        ("x-team", "core"),
                        ("x-trace", "env"),
                    ]
                );
            },
        );
    }

    #[test]
    fn headers_variable_accepts_json_object() {
        temp_env::with_vars(
            [
                ("LIFEOMIC_HOST", None),
                ("LIFEOMIC_TOKEN", None),
                ("LIFEOMIC_ACCOUNT", None),
                ("LIFEOMIC_USER", None),
                ("LIFEOMIC_DEBUG", None),
                ("LIFEOMIC_HEADERS", Some(r#"{"x-a":"1"}"#)),
                ("PHC_HEADERS", None),
            ],
            || {
                let config = ProviderConfig::load(None).unwrap();
                assert_eq!(config.headers.get("x-a").map(String::as_str), Some("1"));
            },
        );
    }

    #[test]
    fn malformed_env_headers_are_rejected() {
        let vars = VARS.map(|name| (name, (name == HEADERS_ENV).then_some("[1, 2]")));
        temp_env::with_vars(vars, || {
            let err = ProviderConfig::load(None).unwrap_err();
            assert!(matches!(err, ConfigError::EnvHeaders(_)));
            assert!(err.to_string().starts_with("unable to get headers from PHC_HEADERS"));
        });
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let config = ProviderConfig {
            token: Some(SecretString::from("s3cret".to_owned())),
            ..ProviderConfig::default()
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProviderConfig::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn host_may_carry_its_own_scheme() {
        let config = ProviderConfig {
            host: "http://127.0.0.1:8080/".to_owned(),
            ..ProviderConfig::default()
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/v1");
    }
}
