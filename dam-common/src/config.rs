//! Configuration loading and resolution
//!
//! Two layers, mirroring how the binaries start up:
//! 1. **TOML bootstrap** (`TomlConfig`): what is written on disk
//! 2. **Resolved runtime config** (`DamConfig`): TOML merged with
//!    environment variables and command-line overrides
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--base-url`, `--identity`, `--secret`)
//! 2. Environment variables (`DAM_BASE_URL`, `DAM_IDENTITY`, `DAM_SECRET`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_BASE_URL: &str = "DAM_BASE_URL";
pub const ENV_IDENTITY: &str = "DAM_IDENTITY";
pub const ENV_SECRET: &str = "DAM_SECRET";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Remote DAM connection settings
    #[serde(default)]
    pub dam: DamSection,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[dam]` table of the TOML file
#[derive(Clone, Serialize, Deserialize)]
pub struct DamSection {
    /// Base URL of the DAM REST API (e.g. `https://dam.example.com/api`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Login identity
    #[serde(default)]
    pub identity: Option<String>,

    /// Login secret
    #[serde(default)]
    pub secret: Option<String>,

    /// Total timeout per remote call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Outbound request budget
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Tag that receives bare keywords (names without an explicit tag)
    #[serde(default = "default_keywords_tag")]
    pub keywords_tag: String,

    /// Response header carrying the session credential after login
    #[serde(default = "default_credential_response_header")]
    pub credential_response_header: String,

    /// Request header used to present the session credential
    #[serde(default = "default_credential_request_header")]
    pub credential_request_header: String,

    /// Assignment endpoint contract
    #[serde(default)]
    pub assignment: AssignmentEndpointConfig,
}

impl Default for DamSection {
    fn default() -> Self {
        Self {
            base_url: None,
            identity: None,
            secret: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            keywords_tag: default_keywords_tag(),
            credential_response_header: default_credential_response_header(),
            credential_request_header: default_credential_request_header(),
            assignment: AssignmentEndpointConfig::default(),
        }
    }
}

// Hand-written so the secret never reaches a log line.
impl fmt::Debug for DamSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DamSection")
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("requests_per_second", &self.requests_per_second)
            .field("keywords_tag", &self.keywords_tag)
            .field("credential_response_header", &self.credential_response_header)
            .field("credential_request_header", &self.credential_request_header)
            .field("assignment", &self.assignment)
            .finish()
    }
}

/// Shape of the "assign tags to media item" call
///
/// The assignment endpoint differs between DAM deployments, so the method and
/// path template are configuration rather than code. `{id}` in `path` is
/// replaced by the media identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEndpointConfig {
    #[serde(default = "default_assignment_method")]
    pub method: String,

    #[serde(default = "default_assignment_path")]
    pub path: String,
}

impl Default for AssignmentEndpointConfig {
    fn default() -> Self {
        Self {
            method: default_assignment_method(),
            path: default_assignment_path(),
        }
    }
}

impl AssignmentEndpointConfig {
    /// Path with the media identifier substituted
    pub fn path_for(&self, media_id: &str) -> String {
        self.path.replace("{id}", media_id)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_keywords_tag() -> String {
    "Keywords".to_string()
}

fn default_credential_response_header() -> String {
    "set-cookie".to_string()
}

fn default_credential_request_header() -> String {
    "cookie".to_string()
}

fn default_assignment_method() -> String {
    "PUT".to_string()
}

fn default_assignment_path() -> String {
    "/media/{id}/tags".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Login credentials for the DAM
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Settings/config store consumed by the tagging core
pub trait ConfigStore: Send + Sync {
    /// Base URL of the DAM REST API, without trailing slash
    fn base_url(&self) -> String;

    /// Login credentials, `None` when not configured
    fn credentials(&self) -> Option<Credentials>;
}

/// Header names used to carry the session credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHeaders {
    /// Read from the login response
    pub response: String,
    /// Sent on every authenticated request
    pub request: String,
}

impl Default for CredentialHeaders {
    fn default() -> Self {
        Self {
            response: default_credential_response_header(),
            request: default_credential_request_header(),
        }
    }
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub identity: Option<String>,
    pub secret: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct DamConfig {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub requests_per_second: u32,
    pub keywords_tag: String,
    pub credential_headers: CredentialHeaders,
    pub assignment: AssignmentEndpointConfig,
}

impl DamConfig {
    /// Configuration with built-in defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let section = DamSection::default();
        Self {
            base_url: normalize_base_url(&base_url.into()),
            credentials: None,
            request_timeout: Duration::from_secs(section.request_timeout_secs),
            connect_timeout: Duration::from_secs(section.connect_timeout_secs),
            requests_per_second: section.requests_per_second,
            keywords_tag: section.keywords_tag,
            credential_headers: CredentialHeaders::default(),
            assignment: section.assignment,
        }
    }

    pub fn with_credentials(mut self, identity: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(identity, secret));
        self
    }

    pub fn with_assignment(mut self, assignment: AssignmentEndpointConfig) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_requests_per_second(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Merge TOML, environment and command-line sources
    pub fn resolve(toml_config: &TomlConfig, overrides: &ConfigOverrides) -> Result<Self> {
        let section = &toml_config.dam;

        let base_url = pick_setting(
            "base_url",
            overrides.base_url.clone(),
            ENV_BASE_URL,
            section.base_url.clone(),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "DAM base URL not configured. Set one of:\n\
                 1. Command line: --base-url https://dam.example.com/api\n\
                 2. Environment: {}=https://dam.example.com/api\n\
                 3. TOML config: [dam] base_url = \"https://dam.example.com/api\"",
                ENV_BASE_URL
            ))
        })?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "DAM base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        if section.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be greater than zero".to_string(),
            ));
        }

        let identity = pick_setting(
            "identity",
            overrides.identity.clone(),
            ENV_IDENTITY,
            section.identity.clone(),
        );
        let secret = pick_setting(
            "secret",
            overrides.secret.clone(),
            ENV_SECRET,
            section.secret.clone(),
        );

        let credentials = match (identity, secret) {
            (Some(identity), Some(secret)) => Some(Credentials { identity, secret }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Only one of DAM identity/secret is configured; login will be refused");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            credentials,
            request_timeout: Duration::from_secs(section.request_timeout_secs),
            connect_timeout: Duration::from_secs(section.connect_timeout_secs),
            requests_per_second: section.requests_per_second,
            keywords_tag: section.keywords_tag.clone(),
            credential_headers: CredentialHeaders {
                response: section.credential_response_header.to_ascii_lowercase(),
                request: section.credential_request_header.to_ascii_lowercase(),
            },
            assignment: section.assignment.clone(),
        })
    }
}

impl ConfigStore for DamConfig {
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}

/// Validate a setting value (non-empty, non-whitespace)
pub fn is_valid_setting(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Pick a setting by priority: command line → environment → TOML
///
/// Warns (naming sources only, never values) when more than one source is set.
fn pick_setting(
    name: &str,
    cli: Option<String>,
    env_var: &str,
    toml_value: Option<String>,
) -> Option<String> {
    let env_value = std::env::var(env_var).ok();

    let candidates = [
        ("command line", cli),
        ("environment", env_value),
        ("TOML", toml_value),
    ];

    let present: Vec<&str> = candidates
        .iter()
        .filter(|(_, v)| v.as_deref().map(is_valid_setting).unwrap_or(false))
        .map(|(source, _)| *source)
        .collect();

    if present.len() > 1 {
        warn!(
            "DAM {} found in multiple sources: {}. Using {} (highest priority).",
            name,
            present.join(", "),
            present[0]
        );
    }

    for (source, value) in candidates {
        if let Some(value) = value {
            if is_valid_setting(&value) {
                info!("DAM {} loaded from {}", name, source);
                return Some(value.trim().to_string());
            }
        }
    }

    None
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Default configuration file path for the platform
///
/// `~/.config/dam-tagger/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("dam-tagger").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load TOML configuration, returning defaults if the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;

    if config.dam.secret.is_some() && check_toml_permissions_loose(path).unwrap_or(false) {
        warn!(
            "Config file {} holds the DAM secret but is readable by others; consider chmod 600",
            path.display()
        );
    }

    Ok(config)
}

/// Write TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    // Owner-only before the rename: the file may carry the DAM secret
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// True if group or others can read or write the file (always false off Unix)
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path)?.permissions().mode();
        Ok(mode & 0o077 != 0)
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(false)
    }
}

/// Standard User-Agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("dam-tagger/{}", env!("CARGO_PKG_VERSION"))
}
