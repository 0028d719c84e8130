use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use tiberius::Query;

use crate::error::{MssqlConnectorError, Result};
use crate::types::{QueryParam, RowValues};

static PARAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name pattern is valid")
});

/// Named bindings of one request scope.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    params: Vec<QueryParam>,
}

impl Bindings {
    /// # Errors
    /// Returns `ParameterError` if the name is not a plain identifier or was
    /// already bound.
    pub fn push(&mut self, param: QueryParam) -> Result<()> {
        let name = param.name();
        if !PARAM_NAME.is_match(name) {
            return Err(MssqlConnectorError::ParameterError(format!(
                "Invalid parameter name '{name}'"
            )));
        }
        if self
            .params
            .iter()
            .any(|p| p.name().eq_ignore_ascii_case(name))
        {
            return Err(MssqlConnectorError::ParameterError(format!(
                "The parameter name {name} has already been declared. Parameter names must be unique"
            )));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Column name of the row-count recordset appended to every batch.
pub(crate) const ROWCOUNT_COLUMN: &str = "__rowcount";

/// Statement appended to every batch so the affected-row count comes back as
/// its own recordset.
pub(crate) const ROWCOUNT_SELECT: &str = "SELECT CAST(@@ROWCOUNT AS BIGINT) AS [__rowcount];";

/// Render the batch sent to the server.
///
/// The caller's SQL is never edited: it travels as `@P1` to `sp_executesql`
/// and runs as a batch of its own, so statements that must open a batch
/// (`CREATE PROCEDURE`, `CREATE VIEW`, ...) and early `RETURN`s behave as
/// written. The parameter definitions go in `@P2` and each named parameter is
/// mapped to the following positional slots.
pub(crate) fn render_batch(bindings: &Bindings) -> String {
    let mut batch = String::from("EXEC sp_executesql @P1");
    if !bindings.is_empty() {
        batch.push_str(", @P2");
        for (i, param) in bindings.params.iter().enumerate() {
            // writing to a String cannot fail
            let _ = write!(batch, ", @{} = @P{}", param.name(), i + 3);
        }
    }
    batch.push_str(";\n");
    batch.push_str(ROWCOUNT_SELECT);
    batch
}

/// The `sp_executesql` parameter definition list, e.g. `@id BIGINT, @name NVARCHAR(50)`.
pub(crate) fn param_definitions(bindings: &Bindings) -> String {
    bindings
        .params
        .iter()
        .map(|p| format!("@{} {}", p.name(), p.sql_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bind the statement, its parameter definitions and the values to the
/// rendered batch.
pub(crate) fn bind_query_params<'a>(batch: &'a str, sql: &str, bindings: &Bindings) -> Query<'a> {
    let mut query_builder = Query::new(batch);
    query_builder.bind(sql.to_string());
    if !bindings.is_empty() {
        query_builder.bind(param_definitions(bindings));
    }
    for param in &bindings.params {
        match param.value() {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }
    query_builder
}
