//! SQL Server connector for metrics collectors.
//!
//! Build a connection string from a [`ConnectionConfig`], open a
//! [`SqlConnection`], scan read queries into your own structs, and close it.
//!
//! ```rust,no_run
//! use mssql_connector::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct DatabaseCount {
//!     databases: i32,
//! }
//!
//! mssql_connector::from_row!(DatabaseCount { databases => "databases" });
//!
//! # async fn run() -> Result<(), ConnectorError> {
//! let config = ConnectionConfig::new("sa", "secret", "localhost").with_port("1433");
//! config.validate()?;
//!
//! let mut conn = SqlConnection::open(&build_connection_url(&config)).await?;
//! let mut counts: Vec<DatabaseCount> = Vec::new();
//! let result = conn
//!     .query(&mut counts, "SELECT COUNT(*) AS databases FROM sys.databases", &[])
//!     .await;
//! conn.close().await?;
//! result?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod mapping;
pub mod mssql;
pub mod prelude;
pub mod results;
pub mod types;
pub mod url;

pub use config::{ConnectionArgs, ConnectionConfig};
pub use connection::{DbHandle, SqlConnection};
pub use error::ConnectorError;
pub use results::{CustomDbRow, ResultSet};
pub use types::RowValues;
pub use url::{build_connection_url, parse_connection_url, redacted_connection_url};
