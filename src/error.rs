use thiserror::Error;

/// Boxed driver error kept as the `source` of a connector error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Query error: {message}")]
    QueryError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Close error: {0}")]
    CloseError(#[source] BoxError),

    #[error("Conversion error: column `{column}` expected {expected}, found {found}")]
    ConversionError {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ConnectorError {
    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn connection_with(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn query_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::QueryError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn close(source: impl Into<BoxError>) -> Self {
        Self::CloseError(source.into())
    }
}
