use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql, Query};

use super::client::MssqlClient;
use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Run a read statement and collect the rows of its first result.
///
/// Later result sets in the same batch are discarded.
///
/// # Errors
///
/// Returns `ConnectorError::QueryError` wrapping the tiberius error if the
/// statement fails or a row cannot be read, or naming the column whose SQL
/// Server type has no `RowValues` counterpart.
pub async fn build_result_set(
    client: &mut MssqlClient,
    query: &str,
    params: &[RowValues],
) -> Result<ResultSet, ConnectorError> {
    let query_builder = bind_query_params(query, params);

    let mut stream = query_builder
        .query(client)
        .await
        .map_err(|e| ConnectorError::query_with("SQL Server query error", e))?;

    let columns = stream
        .columns()
        .await
        .map_err(|e| ConnectorError::query_with("SQL Server column fetch error", e))?
        .ok_or_else(|| ConnectorError::query("No columns returned from query"))?;

    let column_names: Vec<String> = columns.iter().map(|col| col.name().to_string()).collect();

    let rows = stream
        .into_first_result()
        .await
        .map_err(|e| ConnectorError::query_with("SQL Server row fetch error", e))?;

    collect_rows(column_names, rows)
}

/// Convert driver rows into a `ResultSet` sharing `column_names`.
pub(crate) fn collect_rows<R>(
    column_names: Vec<String>,
    rows: impl IntoIterator<Item = R>,
) -> Result<ResultSet, ConnectorError>
where
    R: IntoIterator<Item = ColumnData<'static>>,
{
    let col_count = column_names.len();
    let names = Arc::new(column_names);
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::clone(&names));

    for row in rows {
        let mut row_values = Vec::with_capacity(col_count);
        for (idx, data) in row.into_iter().enumerate() {
            let name = names.get(idx).ok_or_else(|| {
                ConnectorError::query(format!(
                    "row has more values than the {col_count} result columns"
                ))
            })?;
            row_values.push(extract_value(name, &data)?.unwrap_or(RowValues::Null));
        }
        if row_values.len() != col_count {
            return Err(ConnectorError::query(format!(
                "row has {} values but the result has {col_count} columns",
                row_values.len()
            )));
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Convert one cell, `Ok(None)` only for NULL.
#[allow(clippy::cast_precision_loss)]
fn extract_value(
    column: &str,
    data: &ColumnData<'static>,
) -> Result<Option<RowValues>, ConnectorError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        // DECIMAL/NUMERIC, common in DMV counters
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| RowValues::Float(n.value() as f64 / 10_f64.powi(i32::from(n.scale())))),
        ColumnData::String(v) => v.as_ref().map(|s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| RowValues::Blob(b.to_vec())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .map_err(|e| convert_error(column, e))?
                .map(RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(|e| convert_error(column, e))?
            .map(|d| RowValues::Timestamp(d.and_time(NaiveTime::MIN))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .map_err(|e| convert_error(column, e))?
            .map(|t| RowValues::Text(t.format("%H:%M:%S%.f").to_string())),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .map_err(|e| convert_error(column, e))?
            .map(|dt| RowValues::Timestamp(dt.naive_utc())),
        ColumnData::Xml(None) => None,
        ColumnData::Xml(Some(_)) => {
            return Err(ConnectorError::query(format!(
                "column `{column}` has type xml, which cannot be read; CAST it to nvarchar"
            )));
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(ConnectorError::query(format!(
                "column `{column}` has an unsupported SQL Server type"
            )));
        }
    };
    Ok(value)
}

fn convert_error(column: &str, e: tiberius::error::Error) -> ConnectorError {
    ConnectorError::query_with(format!("failed to read column `{column}`"), e)
}

/// Bind parameters to the statement as `@P1`, `@P2`, ...
pub fn bind_query_params<'a>(query: &'a str, params: &[RowValues]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}
