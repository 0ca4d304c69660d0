//! Mapping result rows onto caller structs.
//!
//! A destination type lists its columns once in a static [`Column`] table.
//! Each query resolves that table against the result's column names a single
//! time and then fills one value per row.
//!
//! ```rust
//! use mssql_connector::from_row;
//!
//! #[derive(Debug, Default)]
//! struct WaitStat {
//!     wait_type: String,
//!     wait_time_ms: i64,
//! }
//!
//! from_row!(WaitStat {
//!     wait_type => "wait_type",
//!     wait_time_ms => "wait_time_ms",
//! });
//! ```

use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Writes one column's value into a destination field.
pub type Setter<T> = fn(&mut T, &RowValues) -> Result<(), ConnectorError>;

/// One entry of a destination type's column table.
pub struct Column<T: 'static> {
    pub name: &'static str,
    pub set: Setter<T>,
}

/// A struct that query rows can be scanned into.
pub trait FromRow: Default + Sized + 'static {
    fn schema() -> &'static [Column<Self>];
}

/// Conversion from a single result value into a field type.
pub trait FromValue: Sized {
    /// Type name used in conversion errors.
    const EXPECTED: &'static str;

    fn from_value(value: &RowValues) -> Option<Self>;
}

/// Convert `value` and store it in `slot`.
///
/// # Errors
///
/// Returns `ConnectorError::ConversionError` if the value does not fit the field type.
pub fn assign<V: FromValue>(
    slot: &mut V,
    column: &str,
    value: &RowValues,
) -> Result<(), ConnectorError> {
    *slot = V::from_value(value).ok_or_else(|| ConnectorError::ConversionError {
        column: column.to_string(),
        expected: V::EXPECTED,
        found: value.type_name(),
    })?;
    Ok(())
}

/// Scan every row of `result_set` into a new `T`, keeping result order.
///
/// Column names match schema names ignoring ASCII case. Schema entries the
/// result does not return keep their default value.
///
/// # Errors
///
/// Returns `ConnectorError::QueryError` if a result column has no schema
/// entry, or wraps the `ConversionError` of the first value that does not
/// fit its field.
pub fn map_rows<T: FromRow>(result_set: &ResultSet) -> Result<Vec<T>, ConnectorError> {
    let Some(column_names) = result_set.get_column_names() else {
        return Ok(Vec::new());
    };
    let plan = resolve::<T>(column_names)?;

    let mut mapped = Vec::with_capacity(result_set.len());
    for row in &result_set.results {
        let mut item = T::default();
        for (column, value) in plan.iter().zip(&row.rows) {
            (column.set)(&mut item, value)
                .map_err(|e| ConnectorError::query_with("failed to scan row", e))?;
        }
        mapped.push(item);
    }
    Ok(mapped)
}

fn resolve<T: FromRow>(column_names: &[String]) -> Result<Vec<&'static Column<T>>, ConnectorError> {
    let schema = T::schema();
    column_names
        .iter()
        .map(|name| {
            schema
                .iter()
                .find(|column| column.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    ConnectorError::query(format!(
                        "missing destination name `{name}` in {}",
                        std::any::type_name::<T>()
                    ))
                })
        })
        .collect()
}

/// Implement [`FromRow`] for a struct by pairing fields with column names.
///
/// Every field type must implement [`FromValue`]; wrap nullable columns in `Option`.
#[macro_export]
macro_rules! from_row {
    ($ty:ty { $($field:ident => $col:literal),+ $(,)? }) => {
        impl $crate::mapping::FromRow for $ty {
            fn schema() -> &'static [$crate::mapping::Column<Self>] {
                const SCHEMA: &[$crate::mapping::Column<$ty>] = &[
                    $(
                        $crate::mapping::Column {
                            name: $col,
                            set: |item: &mut $ty, value: &$crate::types::RowValues| {
                                $crate::mapping::assign(&mut item.$field, $col, value)
                            },
                        },
                    )+
                ];
                SCHEMA
            }
        }
    };
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "i64";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_int().copied()
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "i32";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_int().and_then(|v| i32::try_from(*v).ok())
    }
}

impl FromValue for i16 {
    const EXPECTED: &'static str = "i16";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_int().and_then(|v| i16::try_from(*v).ok())
    }
}

impl FromValue for u8 {
    const EXPECTED: &'static str = "u8";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_int().and_then(|v| u8::try_from(*v).ok())
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for f32 {
    const EXPECTED: &'static str = "f32";

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_float().map(|v| v as f32)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_bool().copied()
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "String";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl FromValue for chrono::NaiveDateTime {
    const EXPECTED: &'static str = "NaiveDateTime";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_timestamp()
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "Vec<u8>";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_blob().map(<[u8]>::to_vec)
    }
}

impl<V: FromValue> FromValue for Option<V> {
    const EXPECTED: &'static str = V::EXPECTED;

    fn from_value(value: &RowValues) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            V::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Pair {
        one: i32,
        two: i64,
        label: Option<String>,
    }

    from_row!(Pair {
        one => "one",
        two => "two",
        label => "label",
    });

    fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut rs = ResultSet::with_capacity(rows.len());
        rs.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
        for row in rows {
            rs.add_row_values(row);
        }
        rs
    }

    #[test]
    fn maps_columns_by_name_in_result_order() {
        let rs = result_set(
            &["TWO", "One"],
            vec![
                vec![RowValues::Int(2), RowValues::Int(1)],
                vec![RowValues::Int(4), RowValues::Int(3)],
            ],
        );
        let rows: Vec<Pair> = map_rows(&rs).unwrap();
        assert_eq!(
            rows,
            vec![
                Pair { one: 1, two: 2, label: None },
                Pair { one: 3, two: 4, label: None },
            ]
        );
    }

    #[test]
    fn nullable_field_takes_null_and_text() {
        let rs = result_set(
            &["label"],
            vec![vec![RowValues::Null], vec![RowValues::Text("x".into())]],
        );
        let rows: Vec<Pair> = map_rows(&rs).unwrap();
        assert_eq!(rows[0].label, None);
        assert_eq!(rows[1].label.as_deref(), Some("x"));
    }

    #[test]
    fn unknown_column_is_a_query_error() {
        let rs = result_set(&["one", "three"], vec![]);
        let err = map_rows::<Pair>(&rs).unwrap_err();
        assert!(matches!(err, ConnectorError::QueryError { .. }));
        assert!(err.to_string().contains("missing destination name `three`"));
    }

    #[test]
    fn type_mismatch_wraps_conversion_error() {
        let rs = result_set(&["one"], vec![vec![RowValues::Text("1".into())]]);
        let err = map_rows::<Pair>(&rs).unwrap_err();
        assert!(matches!(err, ConnectorError::QueryError { .. }));
        let cause = err.source().unwrap().to_string();
        assert_eq!(cause, "Conversion error: column `one` expected i32, found Text");
    }

    #[test]
    fn null_into_required_field_fails() {
        let rs = result_set(&["two"], vec![vec![RowValues::Null]]);
        assert!(map_rows::<Pair>(&rs).is_err());
    }

    #[test]
    fn out_of_range_integer_fails() {
        assert_eq!(i32::from_value(&RowValues::Int(i64::MAX)), None);
        assert_eq!(u8::from_value(&RowValues::Int(255)), Some(255));
        assert_eq!(u8::from_value(&RowValues::Int(-1)), None);
    }

    #[test]
    fn result_without_columns_maps_to_nothing() {
        let rows: Vec<Pair> = map_rows(&ResultSet::default()).unwrap();
        assert!(rows.is_empty());
    }
}
