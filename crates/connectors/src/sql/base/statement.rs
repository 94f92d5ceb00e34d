//! Statement generation for the three row-level writes the uploader issues.
//!
//! Every statement takes a single JSON parameter (`$1`). The server expands it
//! with `json_populate_record(set)` against the target table's row type, so
//! column types are resolved remotely and the client never needs table metadata.

use crate::sql::base::error::DbError;

pub const ID_COLUMN: &str = "id";

pub struct StatementGenerator;

impl StatementGenerator {
    /// Quotes an identifier, doubling embedded quotes.
    pub fn quote_identifier(ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', r#""""#))
    }

    /// `INSERT ... SELECT ... FROM json_populate_recordset ... ON CONFLICT (id) DO UPDATE`.
    ///
    /// `columns` is the union of columns across the rows being written; the id
    /// column is always emitted first.
    pub fn bulk_upsert(table: &str, columns: &[String]) -> Result<String, DbError> {
        check_table(table)?;
        let columns = with_id_first(columns);
        let table = Self::quote_identifier(table);
        let column_list = quoted_list(&columns);

        let updates = columns
            .iter()
            .filter(|c| c.as_str() != ID_COLUMN)
            .map(|c| {
                let c = Self::quote_identifier(c);
                format!("{c} = EXCLUDED.{c}")
            })
            .collect::<Vec<_>>();

        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        Ok(format!(
            "INSERT INTO {table} ({column_list}) \
             SELECT {column_list} FROM json_populate_recordset(NULL::{table}, $1::json) \
             ON CONFLICT ({id}) {conflict}",
            id = Self::quote_identifier(ID_COLUMN),
        ))
    }

    /// `DELETE ... WHERE id IN (...)`, ids taken from a JSON array of `{"id": ..}` objects.
    pub fn bulk_delete(table: &str) -> Result<String, DbError> {
        check_table(table)?;
        let table = Self::quote_identifier(table);
        let id = Self::quote_identifier(ID_COLUMN);
        Ok(format!(
            "DELETE FROM {table} WHERE {id} IN \
             (SELECT r.{id} FROM json_populate_recordset(NULL::{table}, $1::json) AS r)"
        ))
    }

    /// `UPDATE ... SET col = r.col ... FROM json_populate_record(...) AS r WHERE id matches`.
    ///
    /// The JSON payload must carry the id alongside the changed columns.
    /// `columns` must not be empty.
    pub fn update_by_id(table: &str, columns: &[String]) -> Result<String, DbError> {
        check_table(table)?;
        let assignments = columns
            .iter()
            .filter(|c| c.as_str() != ID_COLUMN)
            .map(|c| {
                let c = Self::quote_identifier(c);
                format!("{c} = r.{c}")
            })
            .collect::<Vec<_>>();

        if assignments.is_empty() {
            return Err(DbError::QueryBuildError(format!(
                "Update on '{table}' has no columns to set"
            )));
        }

        let table = Self::quote_identifier(table);
        let id = Self::quote_identifier(ID_COLUMN);
        Ok(format!(
            "UPDATE {table} AS t SET {} \
             FROM json_populate_record(NULL::{table}, $1::json) AS r \
             WHERE t.{id} = r.{id}",
            assignments.join(", ")
        ))
    }
}

fn check_table(table: &str) -> Result<(), DbError> {
    if table.trim().is_empty() {
        return Err(DbError::QueryBuildError("Empty table name".to_string()));
    }
    Ok(())
}

fn with_id_first(columns: &[String]) -> Vec<String> {
    let mut ordered = Vec::with_capacity(columns.len() + 1);
    ordered.push(ID_COLUMN.to_string());
    ordered.extend(columns.iter().filter(|c| c.as_str() != ID_COLUMN).cloned());
    ordered
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| StatementGenerator::quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}
