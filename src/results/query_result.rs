use serde::Serialize;

use super::row::Row;

/// Describes one column of a recordset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub index: usize,
    pub name: String,
    /// Driver-reported column type, e.g. `Int4` or `NVarchar`.
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(index: usize, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// What a driver hands back for one executed statement batch.
#[derive(Debug, Clone, Default)]
pub struct RawResult {
    /// Column metadata of the first recordset, if the batch produced one.
    pub columns: Option<Vec<ColumnDescriptor>>,
    /// Rows of the first recordset, if the batch produced one.
    pub recordset: Option<Vec<Row>>,
    /// Affected-row counts, one per statement result.
    pub rows_affected: Vec<u64>,
}

/// Canonical result of `query`.
///
/// `fields` is empty and `rows` is `None` when the statement produced no
/// recordset. `row_count` is the first affected-row count reported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub fields: Vec<ColumnDescriptor>,
    pub rows: Option<Vec<Row>>,
    #[serde(rename = "rowCount")]
    pub row_count: u64,
}

impl From<RawResult> for QueryResult {
    fn from(raw: RawResult) -> Self {
        QueryResult {
            fields: raw.columns.unwrap_or_default(),
            rows: raw.recordset,
            row_count: raw.rows_affected.first().copied().unwrap_or(0),
        }
    }
}

impl QueryResult {
    /// Rows of the recordset, empty when there was none.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn has_recordset(&self) -> bool {
        self.rows.is_some()
    }
}
