//! Row extraction helpers shared by the catalog loader modules.

use tiberius::Row;

use crate::error::{Result, SchemaScriptError};

/// Extension trait for extracting typed values from TDS result rows with
/// consistent error context.
///
/// `get_field` treats NULL as malformed metadata; use `get_field_opt` for
/// genuinely nullable catalog columns.
pub(crate) trait RowExt {
    fn get_field<'a, T>(&'a self, column: &str, source_view: &str) -> Result<T>
    where
        T: tiberius::FromSql<'a>;

    fn get_field_opt<'a, T>(&'a self, column: &str, source_view: &str) -> Result<Option<T>>
    where
        T: tiberius::FromSql<'a>;
}

impl RowExt for Row {
    fn get_field<'a, T>(&'a self, column: &str, source_view: &str) -> Result<T>
    where
        T: tiberius::FromSql<'a>,
    {
        self.get_field_opt(column, source_view)?.ok_or_else(|| {
            SchemaScriptError::malformed_metadata(
                source_view,
                format!("column '{column}' was unexpectedly NULL"),
            )
        })
    }

    fn get_field_opt<'a, T>(&'a self, column: &str, source_view: &str) -> Result<Option<T>>
    where
        T: tiberius::FromSql<'a>,
    {
        self.try_get(column).map_err(|e| {
            SchemaScriptError::malformed_metadata(
                source_view,
                format!("failed to decode column '{column}': {e}"),
            )
        })
    }
}
