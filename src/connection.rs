//! The connection wrapper handed to collectors.
//!
//! A [`SqlConnection`] owns exactly one driver handle. Queries take
//! `&mut self` and [`SqlConnection::close`] consumes the connection, so a
//! caller cannot run statements concurrently on one instance or close it
//! twice. Independent instances can be used from different tasks.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ConnectorError;
use crate::mapping::{FromRow, map_rows};
use crate::mssql::TiberiusHandle;
use crate::results::ResultSet;
use crate::types::RowValues;

/// The two driver capabilities a connection needs besides opening.
#[async_trait]
pub trait DbHandle: Send {
    /// Execute a read statement and materialise its rows.
    async fn query(
        &mut self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, ConnectorError>;

    /// Release the handle.
    async fn close(self) -> Result<(), ConnectorError>;
}

/// One open database handle.
#[derive(Debug)]
pub struct SqlConnection<H: DbHandle = TiberiusHandle> {
    handle: H,
}

impl SqlConnection<TiberiusHandle> {
    /// Open a connection from a `sqlserver://` connection string.
    ///
    /// The server is contacted immediately.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConnectionError` if the string is rejected or
    /// the server cannot be reached and logged in to.
    pub async fn open(connection_string: &str) -> Result<Self, ConnectorError> {
        let handle = TiberiusHandle::connect(connection_string).await?;
        Ok(Self { handle })
    }
}

impl<H: DbHandle> SqlConnection<H> {
    /// Wrap an already open handle.
    pub fn from_handle(handle: H) -> Self {
        Self { handle }
    }

    /// Run a read statement and return the raw rows.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::QueryError` if the statement fails.
    pub async fn select(
        &mut self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, ConnectorError> {
        let result_set = self.handle.query(statement, params).await?;
        debug!(statement, rows = result_set.len(), "query complete");
        Ok(result_set)
    }

    /// Run a read statement and scan each row into `destination`.
    ///
    /// On success `destination` holds exactly the returned rows in result
    /// order. On failure it is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::QueryError` if the statement fails, a result
    /// column has no field in `T`, or a value does not fit its field.
    pub async fn query<T: FromRow>(
        &mut self,
        destination: &mut Vec<T>,
        statement: &str,
        params: &[RowValues],
    ) -> Result<(), ConnectorError> {
        let result_set = self.select(statement, params).await?;
        let rows = map_rows::<T>(&result_set)?;
        destination.clear();
        destination.extend(rows);
        Ok(())
    }

    /// Release the handle.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::CloseError` if the driver reports a failure.
    pub async fn close(self) -> Result<(), ConnectorError> {
        self.handle.close().await.inspect_err(|e| {
            warn!(error = %e, "closing SQL Server connection failed");
        })
    }
}
