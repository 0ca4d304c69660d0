//! `sqlserver://` connection strings.
//!
//! [`build_connection_url`] renders a [`ConnectionConfig`] into the form the
//! driver expects:
//!
//! ```text
//! sqlserver://<user>:<pass>@<host>[:<port>|/<instance>]?[TrustServerCertificate=<bool>&][certificate=<loc>&]dial+timeout=<secs>[&encrypt=true]
//! ```
//!
//! Query keys are always sorted by byte order. [`parse_connection_url`] reads
//! the same form back when a connection is opened.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::config::ConnectionConfig;
use crate::error::ConnectorError;

pub const SCHEME: &str = "sqlserver";

const TRUST_SERVER_CERTIFICATE: &str = "TrustServerCertificate";
const CERTIFICATE: &str = "certificate";
const DIAL_TIMEOUT: &str = "dial timeout";
const ENCRYPT: &str = "encrypt";

// Unreserved characters stay literal in every component.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const USERINFO: &AsciiSet = &QUERY
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

const PATH: &AsciiSet = &USERINFO.remove(b':').remove(b'@');

/// Build the driver connection string for `config`.
///
/// Never fails: empty or malformed fields are carried into the string as-is
/// and left for the driver to reject.
#[must_use]
pub fn build_connection_url(config: &ConnectionConfig) -> String {
    render(config, &config.password)
}

/// Same as [`build_connection_url`] with the password masked, for logging.
#[must_use]
pub fn redacted_connection_url(config: &ConnectionConfig) -> String {
    render(config, "xxxxx")
}

fn render(config: &ConnectionConfig, password: &str) -> String {
    let mut url = format!(
        "{SCHEME}://{}:{}@{}",
        utf8_percent_encode(&config.username, USERINFO),
        utf8_percent_encode(password, USERINFO),
        config.hostname,
    );

    // Port wins over instance when both are given.
    if let Some(port) = config.port() {
        url.push(':');
        url.push_str(port);
    } else if let Some(instance) = config.instance() {
        url.push('/');
        url.extend(utf8_percent_encode(instance, PATH));
    }

    let query = encode_query(&query_params(config));
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    url
}

fn query_params(config: &ConnectionConfig) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();
    params.insert(DIAL_TIMEOUT, config.timeout.clone());

    if config.enable_ssl {
        params.insert(ENCRYPT, "true".to_string());
        match config.certificate_location() {
            None => {
                params.insert(
                    TRUST_SERVER_CERTIFICATE,
                    config.trust_server_certificate.to_string(),
                );
            }
            Some(location) => {
                params.insert(CERTIFICATE, location.to_string());
                // An explicit distrust travels with the CA path.
                if !config.trust_server_certificate {
                    params.insert(TRUST_SERVER_CERTIFICATE, "false".to_string());
                }
            }
        }
    }
    params
}

fn encode_query(params: &BTreeMap<&'static str, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", query_escape(key), query_escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn query_escape(raw: &str) -> String {
    raw.split(' ')
        .map(|part| utf8_percent_encode(part, QUERY).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// A `sqlserver://` connection string broken back into its parts.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub certificate: Option<String>,
    /// `None` when the string sets no dial timeout or sets it to zero.
    pub dial_timeout: Option<Duration>,
}

impl std::fmt::Debug for ConnectionUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionUrl")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("instance", &self.instance)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("certificate", &self.certificate)
            .field("dial_timeout", &self.dial_timeout)
            .finish_non_exhaustive()
    }
}

/// Parse a connection string produced by [`build_connection_url`].
///
/// Query keys are matched case-insensitively and unknown keys are ignored.
///
/// # Errors
///
/// Returns `ConnectorError::ConnectionError` if the scheme is not
/// `sqlserver`, the credentials or host are missing, or the port or dial
/// timeout is not a number.
pub fn parse_connection_url(connection_string: &str) -> Result<ConnectionUrl, ConnectorError> {
    let rest = connection_string
        .strip_prefix(SCHEME)
        .and_then(|s| s.strip_prefix("://"))
        .ok_or_else(|| {
            ConnectorError::connection(format!("connection string must start with {SCHEME}://"))
        })?;

    let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
    let (userinfo, host_part) = location
        .rsplit_once('@')
        .ok_or_else(|| ConnectorError::connection("connection string has no credentials"))?;
    let (username, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));

    let (authority, path) = host_part.split_once('/').unwrap_or((host_part, ""));
    let (host, port) = match authority
        .rsplit_once(':')
        .filter(|(_, port)| !port.ends_with(']'))
    {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                ConnectorError::connection_with(format!("invalid port `{port}`"), e)
            })?;
            (host, Some(port))
        }
        None => (authority, None),
    };
    if host.is_empty() {
        return Err(ConnectorError::connection("connection string has no host"));
    }

    let instance = decode(path.trim_end_matches('/'))?;
    let mut url = ConnectionUrl {
        username: decode(username)?.into_owned(),
        password: decode(password)?.into_owned(),
        host: host.to_string(),
        port,
        instance: (!instance.is_empty()).then(|| instance.into_owned()),
        encrypt: false,
        trust_server_certificate: false,
        certificate: None,
        dial_timeout: None,
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_query(key)?;
        let value = decode_query(value)?;
        if key.eq_ignore_ascii_case(ENCRYPT) {
            url.encrypt = value.eq_ignore_ascii_case("true");
        } else if key.eq_ignore_ascii_case(TRUST_SERVER_CERTIFICATE) {
            url.trust_server_certificate = value.eq_ignore_ascii_case("true");
        } else if key.eq_ignore_ascii_case(CERTIFICATE) {
            url.certificate = (!value.is_empty()).then_some(value);
        } else if key.eq_ignore_ascii_case(DIAL_TIMEOUT) {
            let secs = value.parse::<u64>().map_err(|e| {
                ConnectorError::connection_with(format!("invalid dial timeout `{value}`"), e)
            })?;
            url.dial_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }

    Ok(url)
}

fn decode(raw: &str) -> Result<Cow<'_, str>, ConnectorError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| ConnectorError::connection_with("connection string is not valid UTF-8", e))
}

fn decode_query(raw: &str) -> Result<String, ConnectorError> {
    let spaced = raw.replace('+', " ");
    Ok(decode(&spaced)?.into_owned())
}
