mod query_result;
mod row;

pub use query_result::{ColumnDescriptor, QueryResult, RawResult};
pub use row::Row;
