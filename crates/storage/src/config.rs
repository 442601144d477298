//! Connection configuration.
//!
//! A `ConfigSource` is consulted every time a connection is (re)established,
//! so edits to a configuration file take effect on the next reconnect.

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Parameters for opening a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host name of the data source.
    pub server: String,
    /// Port number.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// User name to authenticate as.
    pub user: String,
    /// Password for `user`.
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl ConnectionConfig {
    /// Creates a configuration with an empty password.
    pub fn new(
        server: impl Into<String>,
        port: u16,
        name: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            name: name.into(),
            user: user.into(),
            password: String::new(),
        }
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Renders the connection address. The password is never included.
    pub fn url(&self) -> String {
        format!(
            "quarry://{}@{}:{}/{}",
            self.user, self.server, self.port, self.name
        )
    }
}

/// Supplies connection configuration on demand.
pub trait ConfigSource {
    fn load(&self) -> Result<ConnectionConfig>;
}

/// A fixed configuration.
#[derive(Clone, Debug)]
pub struct StaticConfig(pub ConnectionConfig);

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<ConnectionConfig> {
        Ok(self.0.clone())
    }
}

/// Configuration read from a JSON file on every load.
#[derive(Clone, Debug)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConfigSource for JsonFileConfig {
    fn load(&self) -> Result<ConnectionConfig> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let config: ConnectionConfig = serde_json::from_str(&text).map_err(|e| {
            Error::config(format!("invalid configuration in {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), url = %config.url(), "loaded connection configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_url() {
        let config = ConnectionConfig::new("db.local", 3306, "clinic", "admin").with_password("pw");
        assert_eq!(config.url(), "quarry://admin@db.local:3306/clinic");
    }

    #[test]
    fn test_static_config() {
        let config = ConnectionConfig::new("localhost", 1, "test", "sa");
        assert_eq!(StaticConfig(config.clone()).load().unwrap(), config);
    }

    #[test]
    fn test_json_file_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server":"localhost","port":3306,"name":"clinic","user":"admin","password":"secret"}}"#
        )
        .unwrap();

        let source = JsonFileConfig::new(file.path());
        let config = source.load().unwrap();
        assert_eq!(config.name, "clinic");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_json_file_config_reread_on_load() {
        let file = NamedTempFile::new().unwrap();
        let source = JsonFileConfig::new(file.path());
        fs::write(file.path(), r#"{"server":"a","port":1,"name":"one","user":"u"}"#).unwrap();
        assert_eq!(source.load().unwrap().name, "one");
        fs::write(file.path(), r#"{"server":"a","port":1,"name":"two","user":"u"}"#).unwrap();
        assert_eq!(source.load().unwrap().name, "two");
    }

    #[test]
    fn test_json_file_config_errors() {
        let missing = JsonFileConfig::new("/nonexistent/quarry.json");
        assert!(matches!(missing.load(), Err(Error::Config { .. })));

        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(
            JsonFileConfig::new(file.path()).load(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_password_not_serialized() {
        let config = ConnectionConfig::new("h", 1, "n", "u").with_password("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
