//! Daemon configuration.
//!
//! Configuration is TOML with serde defaults for everything that has a safe
//! default. The token signing secret and the registry base URL have none:
//! [`DaemonConfig::validate`] is fail-closed, and the daemon refuses to bind
//! its listener until every check passes. A missing or short signing secret
//! is a fatal configuration error, never a runtime one.
//!
//! The signing secret may come from the `MEDREP_TOKEN_SECRET` environment
//! variable (preferred, keeps the secret out of files) or from
//! `[auth] token_secret`; the environment wins when both are set.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::token::MIN_SECRET_LEN;
use crate::validate::{ValidationError, validate_email, validate_password};

/// Environment variable overriding `[auth] token_secret`.
pub const TOKEN_SECRET_ENV: &str = "MEDREP_TOKEN_SECRET";

/// Errors loading or validating daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// No signing secret in the environment or the file.
    #[error("token signing secret is missing; set {TOKEN_SECRET_ENV} or [auth] token_secret")]
    MissingTokenSecret,

    /// Signing secret below the minimum length.
    #[error("token signing secret must be at least {min} bytes, got {got}")]
    TokenSecretTooShort {
        /// Required minimum in bytes.
        min: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// No registry base URL configured.
    #[error("[registry] base_url is missing")]
    MissingRegistryUrl,

    /// Registry base URL is not an http(s) URL.
    #[error("[registry] base_url must start with http:// or https://, got {url:?}")]
    InvalidRegistryUrl {
        /// Value found in the configuration.
        url: String,
    },

    /// Listen address failed to parse.
    #[error("[http] listen address {addr:?} is invalid: {source}")]
    InvalidListenAddr {
        /// Value found in the configuration.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Bootstrap account section failed validation.
    #[error("[bootstrap] account is invalid: {0}")]
    InvalidBootstrap(#[from] ValidationError),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listener settings.
    pub http: HttpConfig,
    /// SQLite storage settings.
    pub storage: StorageConfig,
    /// Session credential settings.
    pub auth: AuthConfig,
    /// National registry collaborator settings.
    pub registry: RegistryConfig,
    /// Optional account created at startup when absent.
    pub bootstrap: Option<BootstrapConfig>,
}

/// `[http]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the listener binds, `host:port`.
    pub listen: String,
    /// Adds the `Secure` attribute to session cookies. Off by default so
    /// plain-HTTP development setups keep working.
    pub secure_cookies: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            secure_cookies: false,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// `[auth]` section.
///
/// The `Debug` impl redacts the secret.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing secret. Prefer `MEDREP_TOKEN_SECRET` over this field.
    pub token_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the national registry, e.g. `https://registry.example`.
    /// The daemon appends `/submit`.
    pub base_url: Option<String>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds. Expiry maps to a registry error.
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_secs: default_registry_connect_timeout(),
            request_timeout_secs: default_registry_request_timeout(),
        }
    }
}

/// `[bootstrap]` section.
///
/// The `Debug` impl redacts the password.
#[derive(Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Email of the account to ensure at startup.
    pub email: String,
    /// Plaintext password, hashed at startup. Intended for development and
    /// first-run provisioning.
    pub password: String,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("medrep.db")
}

const fn default_registry_connect_timeout() -> u64 {
    5
}

const fn default_registry_request_timeout() -> u64 {
    10
}

impl DaemonConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the content is not valid TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves the signing secret, environment first, then the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTokenSecret`] when neither source has a
    /// non-empty value and [`ConfigError::TokenSecretTooShort`] when the
    /// value is under [`MIN_SECRET_LEN`] bytes.
    pub fn resolve_token_secret(&self) -> Result<SecretString, ConfigError> {
        let from_env = std::env::var(TOKEN_SECRET_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        self.token_secret_from(from_env)
    }

    fn token_secret_from(&self, env_value: Option<String>) -> Result<SecretString, ConfigError> {
        let secret = match env_value {
            Some(value) => value,
            None => self
                .auth
                .token_secret
                .clone()
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingTokenSecret)?,
        };
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::TokenSecretTooShort {
                min: MIN_SECRET_LEN,
                got: secret.len(),
            });
        }
        Ok(SecretString::from(secret))
    }

    /// Parses the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidListenAddr`] when the value does not
    /// parse as `host:port`.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http
            .listen
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                addr: self.http.listen.clone(),
                source,
            })
    }

    /// Returns the configured registry base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegistryUrl`] when absent and
    /// [`ConfigError::InvalidRegistryUrl`] when it is not an http(s) URL.
    pub fn registry_base_url(&self) -> Result<&str, ConfigError> {
        let url = self
            .registry
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingRegistryUrl)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidRegistryUrl {
                url: url.to_string(),
            });
        }
        Ok(url)
    }

    /// Runs every startup prerequisite check, first failure wins.
    ///
    /// The daemon must call this before binding its listener: serving
    /// traffic without a signing secret or a registry URL is never
    /// acceptable.
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`ConfigError`] for a missing/short signing
    /// secret, an unparseable listen address, a missing/invalid registry
    /// URL, or an invalid bootstrap account.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_token_secret()?;
        self.listen_addr()?;
        self.registry_base_url()?;
        if let Some(bootstrap) = &self.bootstrap {
            validate_email(&bootstrap.email)?;
            validate_password(&bootstrap.password)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const FILE_SECRET: &str = "file-secret-0123456789abcdef0123456789";
    const ENV_SECRET: &str = "env-secret-0123456789abcdef01234567890";

    fn full_config() -> DaemonConfig {
        DaemonConfig::from_toml(
            r#"
            [http]
            listen = "0.0.0.0:9090"
            secure_cookies = true

            [storage]
            db_path = "/var/lib/medrep/medrep.db"

            [auth]
            token_secret = "file-secret-0123456789abcdef0123456789"

            [registry]
            base_url = "https://registry.example/api"
            connect_timeout_secs = 2
            request_timeout_secs = 4

            [bootstrap]
            email = "clinician@example.com"
            password = "password123"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config.http.listen, "127.0.0.1:8080");
        assert!(!config.http.secure_cookies);
        assert_eq!(config.storage.db_path, PathBuf::from("medrep.db"));
        assert_eq!(config.registry.connect_timeout_secs, 5);
        assert_eq!(config.registry.request_timeout_secs, 10);
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn full_toml_parses() {
        let config = full_config();
        assert_eq!(config.http.listen, "0.0.0.0:9090");
        assert!(config.http.secure_cookies);
        assert_eq!(config.registry.connect_timeout_secs, 2);
        let bootstrap = config.bootstrap.as_ref().unwrap();
        assert_eq!(bootstrap.email, "clinician@example.com");
    }

    #[test]
    fn env_secret_wins_over_file_secret() {
        let config = full_config();
        let secret = config
            .token_secret_from(Some(ENV_SECRET.to_string()))
            .unwrap();
        assert_eq!(secret.expose_secret(), ENV_SECRET);

        let secret = config.token_secret_from(None).unwrap();
        assert_eq!(secret.expose_secret(), FILE_SECRET);
    }

    #[test]
    fn missing_secret_is_fatal() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert!(matches!(
            config.token_secret_from(None),
            Err(ConfigError::MissingTokenSecret)
        ));

        let blank = DaemonConfig::from_toml("[auth]\ntoken_secret = \"   \"").unwrap();
        assert!(matches!(
            blank.token_secret_from(None),
            Err(ConfigError::MissingTokenSecret)
        ));
    }

    #[test]
    fn short_secret_is_fatal() {
        let config = DaemonConfig::from_toml("[auth]\ntoken_secret = \"too-short\"").unwrap();
        assert!(matches!(
            config.token_secret_from(None),
            Err(ConfigError::TokenSecretTooShort { min: 32, got: 9 })
        ));
    }

    #[test]
    fn registry_url_is_required_and_checked() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert!(matches!(
            config.registry_base_url(),
            Err(ConfigError::MissingRegistryUrl)
        ));

        let bad = DaemonConfig::from_toml("[registry]\nbase_url = \"ftp://registry\"").unwrap();
        assert!(matches!(
            bad.registry_base_url(),
            Err(ConfigError::InvalidRegistryUrl { .. })
        ));

        let good = full_config();
        assert_eq!(
            good.registry_base_url().unwrap(),
            "https://registry.example/api"
        );
    }

    #[test]
    fn listen_addr_parses_or_fails_closed() {
        assert_eq!(
            full_config().listen_addr().unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
        let bad = DaemonConfig::from_toml("[http]\nlisten = \"not-an-addr\"").unwrap();
        assert!(matches!(
            bad.listen_addr(),
            Err(ConfigError::InvalidListenAddr { .. })
        ));
    }

    #[test]
    fn bootstrap_section_is_validated() {
        let bad_email = DaemonConfig::from_toml(
            "[auth]\ntoken_secret = \"file-secret-0123456789abcdef0123456789\"\n\
             [registry]\nbase_url = \"http://registry\"\n\
             [bootstrap]\nemail = \"not-an-email\"\npassword = \"password123\"",
        )
        .unwrap();
        assert!(matches!(
            bad_email.validate(),
            Err(ConfigError::InvalidBootstrap(ValidationError::EmailFormat))
        ));

        let bad_password = DaemonConfig::from_toml(
            "[auth]\ntoken_secret = \"file-secret-0123456789abcdef0123456789\"\n\
             [registry]\nbase_url = \"http://registry\"\n\
             [bootstrap]\nemail = \"a@b.example\"\npassword = \"short\"",
        )
        .unwrap();
        assert!(matches!(
            bad_password.validate(),
            Err(ConfigError::InvalidBootstrap(ValidationError::TooShort { .. }))
        ));
    }

    #[test]
    fn auth_debug_redacts_secret() {
        let config = full_config();
        let rendered = format!("{:?}", config.auth);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("file-secret"));
    }

    #[test]
    fn bootstrap_debug_redacts_password() {
        let config = full_config();
        let rendered = format!("{:?}", config.bootstrap.unwrap());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("password123"));
    }
}
