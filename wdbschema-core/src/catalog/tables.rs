//! Table metadata collection from the system catalog views.
//!
//! Each loader issues one metadata query per table against `sys.columns`,
//! `sys.indexes`, `sys.foreign_keys`, and `sys.check_constraints`, scoped by
//! `object_id`. Result ordering follows the catalog's own identifiers
//! (`column_id`, `index_id`, constraint `object_id`) so repeated runs emit
//! identical scripts.

use crate::connection::SqlServerConnection;
use crate::error::Result;
use crate::models::{
    ColumnDef, ConstraintDef, DefaultSpec, IdentitySpec, IndexColumn, IndexDef, ObjectRef,
    ReferentialAction, SqlType, TableDef,
};

use super::helpers::RowExt;

/// A table row from `sys.tables`, before its definition is loaded.
#[derive(Debug, Clone)]
pub(crate) struct TableEntry {
    pub object_id: i32,
    pub schema: String,
    pub name: String,
}

/// Enumerates tables in catalog order (`object_id` ascending).
pub(crate) async fn list_tables(
    conn: &mut SqlServerConnection,
    allow_system_objects: bool,
) -> Result<Vec<TableEntry>> {
    let filter = if allow_system_objects {
        ""
    } else {
        "WHERE t.is_ms_shipped = 0"
    };
    let sql = format!(
        "SELECT t.object_id, s.name AS schema_name, t.name AS table_name \
         FROM sys.tables t \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         {filter} \
         ORDER BY t.object_id"
    );

    let rows = conn.simple_query(&sql).await?;
    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        tables.push(TableEntry {
            object_id: row.get_field("object_id", "sys.tables")?,
            schema: row.get_field::<&str>("schema_name", "sys.tables")?.to_string(),
            name: row.get_field::<&str>("table_name", "sys.tables")?.to_string(),
        });
    }

    tracing::debug!(count = tables.len(), "enumerated tables");
    Ok(tables)
}

/// Loads the full definition of one table.
pub(crate) async fn load_table(
    conn: &mut SqlServerConnection,
    entry: &TableEntry,
) -> Result<TableDef> {
    let reference = ObjectRef::new(
        crate::models::ObjectKind::Table,
        entry.schema.clone(),
        entry.name.clone(),
    );

    let columns = load_columns(conn, entry.object_id).await?;
    let (mut constraints, indexes) = load_indexes_and_key_constraints(conn, entry.object_id).await?;
    constraints.extend(load_foreign_keys(conn, entry.object_id).await?);
    constraints.extend(load_check_constraints(conn, entry.object_id).await?);

    let table = TableDef {
        reference,
        columns,
        constraints,
        indexes,
    };
    table.validate()?;

    tracing::debug!(
        table = %table.reference,
        columns = table.columns.len(),
        constraints = table.constraints.len(),
        indexes = table.indexes.len(),
        "loaded table definition"
    );
    Ok(table)
}

async fn load_columns(conn: &mut SqlServerConnection, object_id: i32) -> Result<Vec<ColumnDef>> {
    let sql = "SELECT c.name, ty.name AS type_name, c.max_length, c.precision, c.scale, \
               c.collation_name, c.is_nullable, c.is_identity, \
               cc.definition AS computed_definition, \
               dc.name AS default_name, dc.definition AS default_definition, \
               CAST(ic.seed_value AS bigint) AS identity_seed, \
               CAST(ic.increment_value AS bigint) AS identity_increment \
               FROM sys.columns c \
               JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
               LEFT JOIN sys.computed_columns cc \
                 ON cc.object_id = c.object_id AND cc.column_id = c.column_id \
               LEFT JOIN sys.default_constraints dc \
                 ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id \
               LEFT JOIN sys.identity_columns ic \
                 ON ic.object_id = c.object_id AND ic.column_id = c.column_id \
               WHERE c.object_id = @P1 \
               ORDER BY c.column_id";

    let rows = conn.query(sql, &[&object_id]).await?;
    let mut columns = Vec::with_capacity(rows.len());

    for row in &rows {
        let identity = if row.get_field::<bool>("is_identity", "sys.columns")? {
            Some(IdentitySpec {
                seed: row.get_field_opt("identity_seed", "sys.columns")?.unwrap_or(1),
                increment: row
                    .get_field_opt("identity_increment", "sys.columns")?
                    .unwrap_or(1),
            })
        } else {
            None
        };

        let default = match (
            row.get_field_opt::<&str>("default_name", "sys.columns")?,
            row.get_field_opt::<&str>("default_definition", "sys.columns")?,
        ) {
            (Some(name), Some(expression)) => Some(DefaultSpec {
                constraint_name: name.to_string(),
                expression: expression.to_string(),
            }),
            _ => None,
        };

        columns.push(ColumnDef {
            name: row.get_field::<&str>("name", "sys.columns")?.to_string(),
            sql_type: SqlType {
                name: row.get_field::<&str>("type_name", "sys.columns")?.to_string(),
                max_length: row.get_field("max_length", "sys.columns")?,
                precision: row.get_field("precision", "sys.columns")?,
                scale: row.get_field("scale", "sys.columns")?,
                collation: row
                    .get_field_opt::<&str>("collation_name", "sys.columns")?
                    .map(str::to_string),
            },
            nullable: row.get_field("is_nullable", "sys.columns")?,
            identity,
            computed: row
                .get_field_opt::<&str>("computed_definition", "sys.columns")?
                .map(str::to_string),
            default,
        });
    }

    Ok(columns)
}

/// Loads indexes for a table, splitting constraint-backed entries (primary
/// key, unique constraint) out of `sys.indexes` into `ConstraintDef`s and
/// keeping the rest as plain `IndexDef`s.
async fn load_indexes_and_key_constraints(
    conn: &mut SqlServerConnection,
    object_id: i32,
) -> Result<(Vec<ConstraintDef>, Vec<IndexDef>)> {
    let index_sql = "SELECT i.index_id, i.name, i.is_unique, i.is_primary_key, \
                     i.is_unique_constraint, \
                     CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS is_clustered \
                     FROM sys.indexes i \
                     WHERE i.object_id = @P1 AND i.index_id > 0 AND i.is_hypothetical = 0 \
                     ORDER BY i.index_id";

    let column_sql = "SELECT ic.index_id, col.name, ic.is_descending_key, ic.is_included_column \
                      FROM sys.index_columns ic \
                      JOIN sys.columns col \
                        ON col.object_id = ic.object_id AND col.column_id = ic.column_id \
                      WHERE ic.object_id = @P1 \
                      ORDER BY ic.index_id, ic.is_included_column, ic.key_ordinal";

    let index_rows = conn.query(index_sql, &[&object_id]).await?;
    let column_rows = conn.query(column_sql, &[&object_id]).await?;

    // (index_id, column, descending, included) tuples in key order
    let mut index_columns: Vec<(i32, String, bool, bool)> = Vec::with_capacity(column_rows.len());
    for row in &column_rows {
        index_columns.push((
            row.get_field("index_id", "sys.index_columns")?,
            row.get_field::<&str>("name", "sys.index_columns")?.to_string(),
            row.get_field("is_descending_key", "sys.index_columns")?,
            row.get_field("is_included_column", "sys.index_columns")?,
        ));
    }

    let mut constraints = Vec::new();
    let mut indexes = Vec::new();

    for row in &index_rows {
        let index_id: i32 = row.get_field("index_id", "sys.indexes")?;
        let name = row.get_field::<&str>("name", "sys.indexes")?.to_string();
        let unique: bool = row.get_field("is_unique", "sys.indexes")?;
        let is_primary_key: bool = row.get_field("is_primary_key", "sys.indexes")?;
        let is_unique_constraint: bool = row.get_field("is_unique_constraint", "sys.indexes")?;
        let clustered = row.get_field::<i32>("is_clustered", "sys.indexes")? == 1;

        let mut keys = Vec::new();
        let mut included = Vec::new();
        for (id, column, descending, is_included) in &index_columns {
            if *id != index_id {
                continue;
            }
            if *is_included {
                included.push(column.clone());
            } else {
                keys.push(IndexColumn {
                    name: column.clone(),
                    descending: *descending,
                });
            }
        }

        if is_primary_key {
            constraints.push(ConstraintDef::PrimaryKey {
                name,
                columns: keys,
                clustered,
            });
        } else if is_unique_constraint {
            constraints.push(ConstraintDef::Unique {
                name,
                columns: keys,
            });
        } else {
            indexes.push(IndexDef {
                name,
                columns: keys,
                included,
                unique,
                clustered,
            });
        }
    }

    Ok((constraints, indexes))
}

async fn load_foreign_keys(
    conn: &mut SqlServerConnection,
    object_id: i32,
) -> Result<Vec<ConstraintDef>> {
    let sql = "SELECT fk.name, rs.name AS referenced_schema, rt.name AS referenced_table, \
               pc.name AS parent_column, rc.name AS referenced_column, \
               fk.delete_referential_action, fk.update_referential_action \
               FROM sys.foreign_keys fk \
               JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
               JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id \
               JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
               JOIN sys.columns pc \
                 ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
               JOIN sys.columns rc \
                 ON rc.object_id = fkc.referenced_object_id \
                AND rc.column_id = fkc.referenced_column_id \
               WHERE fk.parent_object_id = @P1 \
               ORDER BY fk.object_id, fkc.constraint_column_id";

    let rows = conn.query(sql, &[&object_id]).await?;
    let mut foreign_keys: Vec<ConstraintDef> = Vec::new();

    // Rows arrive grouped by constraint; fold consecutive rows of the same
    // name into one multi-column foreign key.
    for row in &rows {
        let name = row.get_field::<&str>("name", "sys.foreign_keys")?.to_string();
        let parent_column = row
            .get_field::<&str>("parent_column", "sys.foreign_keys")?
            .to_string();
        let referenced_column = row
            .get_field::<&str>("referenced_column", "sys.foreign_keys")?
            .to_string();

        if let Some(ConstraintDef::ForeignKey {
            name: last_name,
            columns,
            referenced_columns,
            ..
        }) = foreign_keys.last_mut()
        {
            if *last_name == name {
                columns.push(parent_column);
                referenced_columns.push(referenced_column);
                continue;
            }
        }

        foreign_keys.push(ConstraintDef::ForeignKey {
            name,
            columns: vec![parent_column],
            referenced_schema: row
                .get_field::<&str>("referenced_schema", "sys.foreign_keys")?
                .to_string(),
            referenced_table: row
                .get_field::<&str>("referenced_table", "sys.foreign_keys")?
                .to_string(),
            referenced_columns: vec![referenced_column],
            on_delete: map_referential_action(
                row.get_field::<u8>("delete_referential_action", "sys.foreign_keys")?,
            ),
            on_update: map_referential_action(
                row.get_field::<u8>("update_referential_action", "sys.foreign_keys")?,
            ),
        });
    }

    Ok(foreign_keys)
}

async fn load_check_constraints(
    conn: &mut SqlServerConnection,
    object_id: i32,
) -> Result<Vec<ConstraintDef>> {
    let sql = "SELECT cc.name, cc.definition \
               FROM sys.check_constraints cc \
               WHERE cc.parent_object_id = @P1 \
               ORDER BY cc.object_id";

    let rows = conn.query(sql, &[&object_id]).await?;
    let mut checks = Vec::with_capacity(rows.len());
    for row in &rows {
        checks.push(ConstraintDef::Check {
            name: row
                .get_field::<&str>("name", "sys.check_constraints")?
                .to_string(),
            expression: row
                .get_field::<&str>("definition", "sys.check_constraints")?
                .to_string(),
        });
    }
    Ok(checks)
}

/// Maps `sys.foreign_keys` referential action codes to the model enum.
fn map_referential_action(code: u8) -> ReferentialAction {
    match code {
        1 => ReferentialAction::Cascade,
        2 => ReferentialAction::SetNull,
        3 => ReferentialAction::SetDefault,
        _ => ReferentialAction::NoAction,
    }
}
