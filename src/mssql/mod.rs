// MSSQL module - the SQL Server side of the connector
//
// - client: tiberius config from a parsed connection string, connect and close
// - query: parameter binding and result extraction

pub mod client;
pub mod query;

pub use client::{MssqlClient, TiberiusHandle, build_tiberius_config};
pub use query::{bind_query_params, build_result_set};
