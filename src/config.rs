use std::fmt;

use clap::Args;
use serde::Deserialize;

use crate::error::ConnectorError;

/// Settings the connection URL is built from.
///
/// Optional strings treat `Some("")` the same as `None`. Nothing is checked
/// here; call [`ConnectionConfig::validate`] before building a URL when the
/// values come from user input.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: Option<String>,
    pub instance: Option<String>,
    pub enable_ssl: bool,
    pub trust_server_certificate: bool,
    pub certificate_location: Option<String>,
    /// Dial timeout in seconds, passed through verbatim.
    pub timeout: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            hostname: String::new(),
            port: None,
            instance: None,
            enable_ssl: false,
            trust_server_certificate: false,
            certificate_location: None,
            timeout: "30".to_string(),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("instance", &self.instance)
            .field("enable_ssl", &self.enable_ssl)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("certificate_location", &self.certificate_location)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    #[must_use]
    pub fn with_ssl(mut self, enable_ssl: bool) -> Self {
        self.enable_ssl = enable_ssl;
        self
    }

    #[must_use]
    pub fn with_trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn with_certificate_location(mut self, location: impl Into<String>) -> Self {
        self.certificate_location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    #[must_use]
    pub fn port(&self) -> Option<&str> {
        non_empty(self.port.as_deref())
    }

    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        non_empty(self.instance.as_deref())
    }

    #[must_use]
    pub fn certificate_location(&self) -> Option<&str> {
        non_empty(self.certificate_location.as_deref())
    }

    /// Check the settings for combinations the server cannot accept.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigError` naming the first problem found.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ConnectorError::ConfigError(
                "must specify a username and password".into(),
            ));
        }
        if self.hostname.is_empty() {
            return Err(ConnectorError::ConfigError(
                "must specify a hostname".into(),
            ));
        }
        if self.port().is_some() && self.instance().is_some() {
            return Err(ConnectorError::ConfigError(
                "specify either port or instance but not both".into(),
            ));
        }
        if let Some(port) = self.port() {
            port.parse::<u16>().map_err(|e| {
                ConnectorError::ConfigError(format!("invalid port `{port}`: {e}"))
            })?;
        }
        self.timeout.parse::<u64>().map_err(|e| {
            ConnectorError::ConfigError(format!("invalid timeout `{}`: {e}", self.timeout))
        })?;
        if self.enable_ssl && !self.trust_server_certificate && self.certificate_location().is_none()
        {
            return Err(ConnectorError::ConfigError(
                "must specify a certificate location when using SSL without trusting the server certificate".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Command-line flags for a [`ConnectionConfig`], each with an environment fallback.
///
/// Flatten into a collector's own `clap::Parser`.
#[derive(Clone, Args)]
pub struct ConnectionArgs {
    #[arg(long, env = "MSSQL_USERNAME", default_value = "", help = "username for the SQL Server connection")]
    pub username: String,

    #[arg(long, env = "MSSQL_PASSWORD", default_value = "", hide_env_values = true, help = "password for the SQL Server connection")]
    pub password: String,

    #[arg(long, env = "MSSQL_HOSTNAME", default_value = "127.0.0.1", help = "SQL Server host")]
    pub hostname: String,

    #[arg(long, env = "MSSQL_PORT", help = "SQL Server port, not used together with --instance")]
    pub port: Option<String>,

    #[arg(long, env = "MSSQL_INSTANCE", help = "named SQL Server instance, not used together with --port")]
    pub instance: Option<String>,

    #[arg(long, env = "MSSQL_ENABLE_SSL", help = "encrypt the connection")]
    pub enable_ssl: bool,

    #[arg(long, env = "MSSQL_TRUST_SERVER_CERTIFICATE", help = "skip server certificate validation when SSL is enabled")]
    pub trust_server_certificate: bool,

    #[arg(long, env = "MSSQL_CERTIFICATE_LOCATION", help = "CA certificate used to validate the server when SSL is enabled")]
    pub certificate_location: Option<String>,

    #[arg(long, env = "MSSQL_TIMEOUT", default_value = "30", help = "dial timeout in seconds")]
    pub timeout: String,
}

impl From<ConnectionArgs> for ConnectionConfig {
    fn from(args: ConnectionArgs) -> Self {
        Self {
            username: args.username,
            password: args.password,
            hostname: args.hostname,
            port: args.port,
            instance: args.instance,
            enable_ssl: args.enable_ssl,
            trust_server_certificate: args.trust_server_certificate,
            certificate_location: args.certificate_location,
            timeout: args.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConnectionConfig {
        ConnectionConfig::new("user", "pass", "localhost").with_port("1433")
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(ConnectionConfig::default().timeout, "30");
    }

    #[test]
    fn empty_optionals_read_as_absent() {
        let cfg = ConnectionConfig::new("u", "p", "h")
            .with_port("")
            .with_instance("")
            .with_certificate_location("");
        assert_eq!(cfg.port(), None);
        assert_eq!(cfg.instance(), None);
        assert_eq!(cfg.certificate_location(), None);
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", ConnectionConfig::new("user", "hunter2", "h"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn validate_accepts_port_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let cfg = ConnectionConfig::new("", "pass", "localhost");
        assert!(matches!(cfg.validate(), Err(ConnectorError::ConfigError(_))));
    }

    #[test]
    fn validate_rejects_port_and_instance() {
        let cfg = valid().with_instance("SQLExpress");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("either port or instance"));
    }

    #[test]
    fn validate_rejects_bad_numbers() {
        assert!(valid().with_port("14x3").validate().is_err());
        assert!(valid().with_timeout("-1").validate().is_err());
        assert!(valid().with_timeout("soon").validate().is_err());
    }

    #[test]
    fn validate_ssl_needs_trust_or_certificate() {
        let untrusted = valid().with_ssl(true);
        assert!(untrusted.validate().is_err());
        assert!(untrusted.clone().with_trust_server_certificate(true).validate().is_ok());
        assert!(untrusted.with_certificate_location("file.ca").validate().is_ok());
    }
}
