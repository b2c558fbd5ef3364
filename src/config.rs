use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MssqlMiddlewareError;

pub const DEFAULT_PORT: u16 = 1433;

/// Connection configuration in the driver's JSON shape:
///
/// ```json
/// {
///   "server": "db.example.com",
///   "authentication": { "type": "default", "options": { "userName": "u", "password": "p" } },
///   "options": { "database": "app", "instanceName": "SQLEXPRESS" }
/// }
/// ```
///
/// The legacy top-level `userName`/`password` pair is still accepted; see
/// [`ConnectionConfig::normalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub options: ConnectionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "kebab-case")]
pub enum Authentication {
    /// SQL Server login.
    Default {
        #[serde(rename = "userName")]
        user_name: String,
        password: String,
    },
    /// Pre-acquired Azure AD access token.
    AzureActiveDirectoryAccessToken { token: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
    #[serde(default)]
    pub trust_server_certificate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Options this crate does not interpret, kept as given.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn builder(server: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(server)
    }

    /// Fold the legacy `userName`/`password` pair into a `default`
    /// authentication block.
    ///
    /// Only applies when `authentication` is absent and both legacy fields are
    /// non-empty; any other configuration is returned unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.authentication.is_some() {
            return self;
        }
        match (self.user_name.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                let authentication = Authentication::Default {
                    user_name: user.to_string(),
                    password: pass.to_string(),
                };
                Self {
                    authentication: Some(authentication),
                    user_name: None,
                    password: None,
                    ..self
                }
            }
            _ => self,
        }
    }

    /// Parse and normalize a JSON document.
    ///
    /// # Errors
    /// Returns `MssqlMiddlewareError::Json` if the document does not match the config shape.
    pub fn from_json_str(json: &str) -> Result<Self, MssqlMiddlewareError> {
        let config: ConnectionConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// # Errors
    /// Returns `MssqlMiddlewareError::Json` if the value does not match the config shape.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, MssqlMiddlewareError> {
        let config: ConnectionConfig = serde_json::from_value(value)?;
        Ok(config.normalized())
    }

    /// # Errors
    /// Returns `MssqlMiddlewareError::Io` if the file cannot be read, or `Json` if it does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MssqlMiddlewareError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.options.port.unwrap_or(DEFAULT_PORT)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.options.connect_timeout.map(Duration::from_millis)
    }

    /// `server[\instance][/database]`, for log lines. Never includes credentials.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.server.clone();
        if let Some(instance) = &self.options.instance_name {
            out.push('\\');
            out.push_str(instance);
        }
        if let Some(database) = &self.options.database {
            out.push('/');
            out.push_str(database);
        }
        out
    }
}

/// Fluent builder for connection configs.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            config: ConnectionConfig {
                server: server.into(),
                authentication: None,
                user_name: None,
                password: None,
                options: ConnectionOptions::default(),
            },
        }
    }

    #[must_use]
    pub fn credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.authentication = Some(Authentication::Default {
            user_name: user_name.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.authentication = Some(Authentication::AzureActiveDirectoryAccessToken {
            token: token.into(),
        });
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.options.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.config.options.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.config.options.port = port;
        self
    }

    #[must_use]
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.config.options.encrypt = Some(encrypt);
        self
    }

    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.config.options.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.config.options.app_name = Some(app_name.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.options.connect_timeout =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        self.config.normalized()
    }
}
