use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::query::build_result_set;
use crate::connection::DbHandle;
use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::types::RowValues;
use crate::url::{ConnectionUrl, parse_connection_url};

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// One live tiberius client.
pub struct TiberiusHandle {
    client: MssqlClient,
}

impl std::fmt::Debug for TiberiusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiberiusHandle")
            .field("client", &"<MssqlClient>")
            .finish()
    }
}

impl TiberiusHandle {
    /// Parse `connection_string` and log in to the server it names.
    ///
    /// TCP connect and login together are bounded by the string's dial timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConnectionError` if the string cannot be
    /// parsed, the server cannot be reached in time, or login fails.
    pub async fn connect(connection_string: &str) -> Result<Self, ConnectorError> {
        let url = parse_connection_url(connection_string)?;
        debug!(
            host = %url.host,
            port = ?url.port,
            instance = ?url.instance,
            encrypt = url.encrypt,
            "opening SQL Server connection"
        );

        let named = url.instance.is_some();
        let config = build_tiberius_config(&url);
        let client = match url.dial_timeout {
            Some(limit) => tokio::time::timeout(limit, connect_client(config, named))
                .await
                .map_err(|e| {
                    ConnectorError::connection_with(
                        format!("dial timeout of {}s elapsed", limit.as_secs()),
                        e,
                    )
                })??,
            None => connect_client(config, named).await?,
        };

        Ok(Self { client })
    }
}

/// Translate a parsed connection string into a tiberius `Config`.
#[must_use]
pub fn build_tiberius_config(url: &ConnectionUrl) -> Config {
    let mut config = Config::new();
    config.host(&url.host);
    if let Some(port) = url.port {
        config.port(port);
    }
    if let Some(instance) = &url.instance {
        config.instance_name(instance);
    }
    config.authentication(AuthMethod::sql_server(&url.username, &url.password));

    let (level, trust) = transport_security(url);
    config.encryption(level);
    match trust {
        CertificateTrust::CaFile(path) => config.trust_cert_ca(path),
        CertificateTrust::All => config.trust_cert(),
        CertificateTrust::Verify => {}
    }
    config
}

/// How the server certificate is checked during the TLS handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CertificateTrust<'a> {
    /// Verify against this CA file only.
    CaFile(&'a str),
    /// Accept any certificate.
    All,
    /// Verify against the system roots.
    Verify,
}

/// Pick the encryption level and certificate trust for `url`.
///
/// Without `encrypt` only the login packet is encrypted, which is not an
/// identity check, so the certificate is accepted unless a CA file is given.
/// tiberius treats the CA file and trust-all as mutually exclusive; the CA
/// file wins.
pub(crate) fn transport_security(url: &ConnectionUrl) -> (EncryptionLevel, CertificateTrust<'_>) {
    let trust = match url.certificate.as_deref() {
        Some(path) => CertificateTrust::CaFile(path),
        None if url.trust_server_certificate || !url.encrypt => CertificateTrust::All,
        None => CertificateTrust::Verify,
    };
    let level = if url.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    };
    (level, trust)
}

async fn connect_client(config: Config, named: bool) -> Result<MssqlClient, ConnectorError> {
    let tcp = if named {
        // Named instances are resolved through the SQL Browser service.
        TcpStream::connect_named(&config)
            .await
            .map_err(|e| ConnectorError::connection_with("SQL Browser lookup failed", e))?
    } else {
        TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| ConnectorError::connection_with("TCP connection error", e))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| ConnectorError::connection_with("TCP connection error", e))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| ConnectorError::connection_with("SQL Server connection error", e))
}

#[async_trait]
impl DbHandle for TiberiusHandle {
    async fn query(
        &mut self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, ConnectorError> {
        build_result_set(&mut self.client, statement, params).await
    }

    async fn close(self) -> Result<(), ConnectorError> {
        self.client.close().await.map_err(ConnectorError::close)
    }
}
