//! Convenient imports for common functionality.

pub use crate::config::{ConnectionArgs, ConnectionConfig};
pub use crate::connection::{DbHandle, SqlConnection};
pub use crate::error::ConnectorError;
pub use crate::mapping::{Column, FromRow, FromValue};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::RowValues;
pub use crate::url::{build_connection_url, redacted_connection_url};
