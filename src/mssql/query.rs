use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::{ColumnData, FromSql, QueryItem};

use super::MssqlClient;
use super::params::{Bindings, ROWCOUNT_COLUMN, bind_query_params, render_batch};
use crate::error::{MssqlConnectorError, Result};
use crate::results::{ColumnDescriptor, RawResult, Row};
use crate::types::RowValues;

/// One recordset as it comes off the wire.
#[derive(Debug)]
struct Recordset {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<RowValues>>,
}

/// Execute `sql` with `bindings` on `client` and collect the first recordset
/// plus the affected-row count.
pub(crate) async fn run_query(
    client: &mut MssqlClient,
    sql: &str,
    bindings: &Bindings,
) -> Result<RawResult> {
    let batch = render_batch(bindings);
    let query_builder = bind_query_params(&batch, sql, bindings);

    let mut stream = query_builder.query(client).await.map_err(|e| {
        MssqlConnectorError::ExecutionError(format!("SQL Server query error: {e}"))
    })?;

    let mut recordsets: Vec<Recordset> = Vec::new();
    while let Some(item) = stream.try_next().await.map_err(|e| {
        MssqlConnectorError::ExecutionError(format!("SQL Server row fetch error: {e}"))
    })? {
        match item {
            QueryItem::Metadata(meta) => {
                let columns = meta
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        ColumnDescriptor::new(i, col.name(), format!("{:?}", col.column_type()))
                    })
                    .collect();
                recordsets.push(Recordset {
                    columns,
                    rows: Vec::new(),
                });
            }
            QueryItem::Row(row) => {
                let current = recordsets.last_mut().ok_or_else(|| {
                    MssqlConnectorError::ExecutionError(
                        "Row received before column metadata".to_string(),
                    )
                })?;
                let values = row
                    .into_iter()
                    .map(column_data_to_value)
                    .collect::<Result<Vec<_>>>()?;
                current.rows.push(values);
            }
        }
    }

    collect_result(recordsets)
}

impl Recordset {
    fn is_rowcount(&self) -> bool {
        matches!(self.columns.as_slice(), [col] if col.name == ROWCOUNT_COLUMN)
    }
}

/// Split the row-count recordset off the batch output and keep the first
/// recordset the caller's statement produced.
fn collect_result(mut recordsets: Vec<Recordset>) -> Result<RawResult> {
    let position = recordsets
        .iter()
        .rposition(Recordset::is_rowcount)
        .ok_or_else(|| {
            MssqlConnectorError::ExecutionError("Row count recordset missing from batch".to_string())
        })?;
    let rowcount = recordsets.remove(position);
    let rows_affected = rowcount
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(RowValues::as_int)
        .and_then(|n| u64::try_from(*n).ok())
        .unwrap_or(0);

    let first = recordsets.into_iter().next();
    Ok(match first {
        Some(set) => {
            let names = Arc::new(set.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>());
            let index = Row::build_index(&names);
            let rows = set
                .rows
                .into_iter()
                .map(|values| Row::with_index(names.clone(), index.clone(), values))
                .collect();
            RawResult {
                columns: Some(set.columns),
                recordset: Some(rows),
                rows_affected: vec![rows_affected],
            }
        }
        None => RawResult {
            columns: None,
            recordset: None,
            rows_affected: vec![rows_affected],
        },
    })
}

fn date_time(data: &ColumnData<'static>) -> Result<RowValues> {
    let value = NaiveDateTime::from_sql(data)?;
    Ok(value.map_or(RowValues::Null, RowValues::Timestamp))
}

/// Convert one wire value into a `RowValues`.
fn column_data_to_value(data: ColumnData<'static>) -> Result<RowValues> {
    let value = match data {
        ColumnData::U8(v) => v.map(|n| RowValues::Int(i64::from(n))),
        ColumnData::I16(v) => v.map(|n| RowValues::Int(i64::from(n))),
        ColumnData::I32(v) => v.map(|n| RowValues::Int(i64::from(n))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|n| RowValues::Float(f64::from(n))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::String(v) => v.map(|s| RowValues::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.map(|b| RowValues::Blob(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| {
            #[allow(clippy::cast_precision_loss)]
            let unscaled = n.value() as f64;
            RowValues::Float(unscaled / 10f64.powi(i32::from(n.scale())))
        }),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            return date_time(&data);
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(RowValues::Timestamp),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map(|t| {
            RowValues::Text(t.format("%H:%M:%S%.f").to_string())
        }),
        // normalized to UTC, the offset is dropped
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)?
            .map(|dt| RowValues::Timestamp(dt.naive_utc())),
        ColumnData::Xml(v) => v.map(|x| RowValues::Text(x.into_owned().into_string())),
    };
    Ok(value.unwrap_or(RowValues::Null))
}
