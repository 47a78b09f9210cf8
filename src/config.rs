//! Endpoint configuration and the admin session.
//!
//! The endpoint is durable: [`ConfigStore`] keeps it in a JSON file so it
//! survives between runs. The admin credential is not; it lives only in an
//! [`AdminSession`] and is gone when the session is dropped or logged out.

use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `$GYM_CONFIG`, else `$HOME/.config/gym/directory.json`, else a file in
/// the working directory.
pub static DEFAULT_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = env::var_os("GYM_CONFIG") {
        return PathBuf::from(path);
    }

    match env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".config").join("gym").join("directory.json"),
        None => PathBuf::from("gym-directory.json"),
    }
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid endpoint URL '{0}': {1}")]
    InvalidEndpoint(String, String),

    #[error("Failed to access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Config file is not valid JSON")]
    Json(#[from] serde_json::Error),
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Where the directory lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    endpoint: Option<Url>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DirectoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint<S>(mut self, raw: S) -> Result<Self, ConfigError>
    where
        S: AsRef<str>,
    {
        self.set_endpoint(raw)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds.max(1);
        self
    }

    pub fn set_endpoint<S>(&mut self, raw: S) -> Result<(), ConfigError>
    where
        S: AsRef<str>,
    {
        self.endpoint = Some(parse_endpoint(raw)?);
        Ok(())
    }

    pub fn clear_endpoint(&mut self) {
        self.endpoint = None;
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// At least one second, even if the config file says otherwise.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Accepts absolute `http`/`https` URLs only.
pub fn parse_endpoint<S>(raw: S) -> Result<Url, ConfigError>
where
    S: AsRef<str>,
{
    let raw = raw.as_ref().trim();
    let invalid = |reason: String| ConfigError::InvalidEndpoint(raw.to_string(), reason);

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Loads and saves a [`DirectoryConfig`] as JSON.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH.clone())
    }
}

impl ConfigStore {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an unconfigured directory, not an error.
    pub fn load(&self) -> Result<DirectoryConfig, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DirectoryConfig::default()),
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, config: &DirectoryConfig) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, contents).map_err(io_err)?;

        tracing::info!(path = %self.path.display(), "saved directory config");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

/// Holds the shared admin password once it has been verified.
///
/// Only the directory client can log a session in, and only after the
/// directory accepted the password.
#[derive(Clone, Default)]
pub struct AdminSession {
    credential: Option<String>,
}

impl AdminSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match self.credential {
            Some(_) => SessionState::LoggedIn,
            None => SessionState::LoggedOut,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::LoggedIn
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub(crate) fn login(&mut self, password: String) {
        self.credential = Some(password);
    }

    pub fn logout(&mut self) {
        self.credential = None;
    }
}

impl fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSession").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_must_be_http() {
        assert!(parse_endpoint("https://script.example.com/macros/s/abc/exec").is_ok());
        assert!(matches!(
            parse_endpoint("ftp://example.com/exec"),
            Err(ConfigError::InvalidEndpoint(..))
        ));
        assert!(matches!(parse_endpoint("not a url"), Err(ConfigError::InvalidEndpoint(..))));
    }

    #[test]
    fn test_missing_file_is_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.json"));

        let config = store.load().unwrap();
        assert_eq!(None, config.endpoint());
        assert_eq!(Duration::from_secs(30), config.timeout());
    }

    #[test]
    fn test_endpoint_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("directory.json"));

        let config = DirectoryConfig::new().with_endpoint("https://example.com/exec").unwrap();
        store.save(&config).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!("https://example.com/exec", reloaded.endpoint().unwrap().as_str());
    }

    #[test]
    fn test_zero_timeout_in_file_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.json");
        fs::write(&path, r#"{"endpoint":"http://127.0.0.1:8080/exec","timeout_secs":0}"#).unwrap();

        let config = ConfigStore::new(path.clone()).load().unwrap();
        assert_eq!(Duration::from_secs(1), config.timeout());
        assert_eq!(Duration::from_secs(1), DirectoryConfig::new().with_timeout(0).timeout());
    }

    #[test]
    fn test_session_state_machine() {
        let mut session = AdminSession::new();
        assert_eq!(SessionState::LoggedOut, session.state());

        session.login("secret".to_string());
        assert_eq!(SessionState::LoggedIn, session.state());
        assert_eq!(Some("secret"), session.credential());
        assert!(!format!("{session:?}").contains("secret"));

        session.logout();
        assert_eq!(SessionState::LoggedOut, session.state());
        assert_eq!(None, session.credential());
    }
}
