//! Built-in scalar conversions.
//!
//! Reads are lenient about the wire representation: drivers such as `SQLite`
//! return every integer as `Int64` and every temporal value as text, so each
//! conversion accepts the representations a driver may reasonably produce.

use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tabula_sql::{DataType, Row};
use uuid::Uuid;

use crate::mapping::Mapping;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trait for types that can be extracted from database rows.
///
/// Custom mappings can delegate to these implementations:
///
/// ```ignore
/// impl Mapping<UserId> for UserIdMapping {
///     fn to_sql(&self, value: &UserId) -> DataType {
///         DataType::Str(value.0.clone())
///     }
///
///     fn from_row(&self, row: &Row, column: &str) -> anyhow::Result<UserId> {
///         Ok(UserId(String::fetch(row, column)?))
///     }
/// }
/// ```
pub trait FetchValue: Sized {
    /// Fetch a value from a row by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be converted to the target type.
    fn fetch(row: &Row, col: &str) -> Result<Self>;
}

/// Trait for types that convert into a statement argument.
pub trait ToDataType {
    /// Convert to the wire representation.
    fn to_data_type(&self) -> DataType;
}

/// The [`Mapping`] used for every built-in scalar type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

impl<T> Mapping<T> for Scalar
where
    T: FetchValue + ToDataType + Send + Sync + 'static,
{
    fn to_sql(&self, value: &T) -> DataType {
        value.to_data_type()
    }

    fn from_row(&self, row: &Row, column: &str) -> Result<T> {
        T::fetch(row, column)
    }
}

/// Write-only mapping for string literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrLiteral;

impl Mapping<&'static str> for StrLiteral {
    fn to_sql(&self, value: &&'static str) -> DataType {
        DataType::Str((*value).to_string())
    }

    fn from_row(&self, _row: &Row, column: &str) -> Result<&'static str> {
        bail!("column '{column}' cannot be read into a borrowed str; use String")
    }
}

// Outbound conversion
impl ToDataType for bool {
    fn to_data_type(&self) -> DataType {
        DataType::Boolean(*self)
    }
}

impl ToDataType for i32 {
    fn to_data_type(&self) -> DataType {
        DataType::Int32(*self)
    }
}

impl ToDataType for i64 {
    fn to_data_type(&self) -> DataType {
        DataType::Int64(*self)
    }
}

impl ToDataType for f32 {
    fn to_data_type(&self) -> DataType {
        DataType::Float(*self)
    }
}

impl ToDataType for f64 {
    fn to_data_type(&self) -> DataType {
        DataType::Double(*self)
    }
}

impl ToDataType for String {
    fn to_data_type(&self) -> DataType {
        DataType::Str(self.clone())
    }
}

impl ToDataType for Vec<u8> {
    fn to_data_type(&self) -> DataType {
        DataType::Binary(self.clone())
    }
}

impl ToDataType for Decimal {
    fn to_data_type(&self) -> DataType {
        DataType::Str(self.to_string())
    }
}

impl ToDataType for Uuid {
    fn to_data_type(&self) -> DataType {
        DataType::Str(self.hyphenated().to_string())
    }
}

impl ToDataType for NaiveDate {
    fn to_data_type(&self) -> DataType {
        DataType::Date(self.format(DATE_FORMAT).to_string())
    }
}

impl ToDataType for NaiveDateTime {
    fn to_data_type(&self) -> DataType {
        DataType::Timestamp(self.format(TIMESTAMP_FORMAT).to_string())
    }
}

impl ToDataType for DateTime<Utc> {
    fn to_data_type(&self) -> DataType {
        DataType::Timestamp(self.to_rfc3339())
    }
}

impl ToDataType for serde_json::Value {
    fn to_data_type(&self) -> DataType {
        DataType::Str(self.to_string())
    }
}

// Inbound conversion
impl FetchValue for bool {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_bool(row_field(row, col)?)
    }
}

impl FetchValue for i32 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_i32(row_field(row, col)?)
    }
}

impl FetchValue for i64 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_i64(row_field(row, col)?)
    }
}

impl FetchValue for f32 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_f32(row_field(row, col)?)
    }
}

impl FetchValue for f64 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_f64(row_field(row, col)?)
    }
}

impl FetchValue for String {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_string(row_field(row, col)?)
    }
}

impl FetchValue for Vec<u8> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_binary(row_field(row, col)?)
    }
}

impl FetchValue for Decimal {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_decimal(row_field(row, col)?)
    }
}

impl FetchValue for Uuid {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_uuid(row_field(row, col)?)
    }
}

impl FetchValue for NaiveDate {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_date(row_field(row, col)?)
    }
}

impl FetchValue for NaiveDateTime {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_timestamp(row_field(row, col)?).map(|dt| dt.naive_utc())
    }
}

impl FetchValue for DateTime<Utc> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_timestamp(row_field(row, col)?)
    }
}

impl FetchValue for serde_json::Value {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        as_json(row_field(row, col)?)
    }
}

impl<T: FetchValue> FetchValue for Option<T> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        if row_field(row, col)?.is_null() { Ok(None) } else { T::fetch(row, col).map(Some) }
    }
}

pub(crate) fn row_field<'a>(row: &'a Row, name: &str) -> Result<&'a DataType> {
    row.get(name).ok_or_else(|| anyhow!("missing column '{name}'"))
}

fn as_bool(value: &DataType) -> Result<bool> {
    match value {
        DataType::Boolean(v) => Ok(*v),
        DataType::Int32(v) => Ok(*v != 0),
        DataType::Int64(v) => Ok(*v != 0),
        _ => bail!("expected boolean data type"),
    }
}

fn as_i32(value: &DataType) -> Result<i32> {
    match value {
        DataType::Int32(v) => Ok(*v),
        DataType::Int64(v) => {
            i32::try_from(*v).map_err(|_e| anyhow!("integer {v} does not fit in int32"))
        }
        _ => bail!("expected int32 data type"),
    }
}

fn as_i64(value: &DataType) -> Result<i64> {
    match value {
        DataType::Int64(v) => Ok(*v),
        DataType::Int32(v) => Ok(i64::from(*v)),
        _ => bail!("expected int64 data type"),
    }
}

// NUMERIC columns hand back whole-valued reals as integers.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn as_f32(value: &DataType) -> Result<f32> {
    match value {
        DataType::Float(v) => Ok(*v),
        DataType::Double(v) => Ok(*v as f32),
        DataType::Int32(v) => Ok(*v as f32),
        DataType::Int64(v) => Ok(*v as f32),
        _ => bail!("expected float data type"),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &DataType) -> Result<f64> {
    match value {
        DataType::Double(v) => Ok(*v),
        DataType::Float(v) => Ok(f64::from(*v)),
        DataType::Int32(v) => Ok(f64::from(*v)),
        DataType::Int64(v) => Ok(*v as f64),
        _ => bail!("expected double data type"),
    }
}

fn as_string(value: &DataType) -> Result<String> {
    match value {
        DataType::Str(raw) => Ok(raw.clone()),
        _ => bail!("expected string data type"),
    }
}

fn as_binary(value: &DataType) -> Result<Vec<u8>> {
    match value {
        DataType::Binary(bytes) => Ok(bytes.clone()),
        _ => bail!("expected binary data type"),
    }
}

fn as_decimal(value: &DataType) -> Result<Decimal> {
    match value {
        DataType::Str(raw) => {
            Decimal::from_str(raw).map_err(|e| anyhow!("unsupported decimal: {raw}; {e}"))
        }
        DataType::Int32(v) => Ok(Decimal::from(*v)),
        DataType::Int64(v) => Ok(Decimal::from(*v)),
        // shortest round-trip text, so 19.99 stays 19.99
        DataType::Double(v) => {
            Decimal::from_str(&v.to_string()).map_err(|e| anyhow!("unsupported decimal: {v}; {e}"))
        }
        DataType::Float(v) => {
            Decimal::from_str(&v.to_string()).map_err(|e| anyhow!("unsupported decimal: {v}; {e}"))
        }
        _ => bail!("expected decimal compatible data type"),
    }
}

fn as_uuid(value: &DataType) -> Result<Uuid> {
    match value {
        DataType::Str(raw) => Uuid::parse_str(raw).map_err(|e| anyhow!("unsupported uuid: {raw}; {e}")),
        DataType::Binary(bytes) => Ok(Uuid::from_slice(bytes)?),
        _ => bail!("expected uuid compatible data type"),
    }
}

fn as_timestamp(value: &DataType) -> Result<DateTime<Utc>> {
    match value {
        DataType::Timestamp(raw) | DataType::Str(raw) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Ok(parsed.with_timezone(&Utc));
            }

            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
                return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
            }

            bail!(
                "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format"
            )
        }
        _ => bail!("expected timestamp data type"),
    }
}

fn as_date(value: &DataType) -> Result<NaiveDate> {
    match value {
        DataType::Date(raw) | DataType::Str(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_e| anyhow!("unsupported date: {raw}; expected \"%Y-%m-%d\" format")),
        _ => bail!("expected date data type"),
    }
}

fn as_json(value: &DataType) -> Result<serde_json::Value> {
    match value {
        DataType::Str(raw) => Ok(serde_json::from_str(raw)?),
        DataType::Binary(bytes) => Ok(serde_json::from_slice(bytes)?),
        _ => bail!("expected json compatible data type"),
    }
}
