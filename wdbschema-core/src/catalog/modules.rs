//! View and routine collection from `sys.sql_modules`, plus the reference
//! edges recorded in `sys.sql_expression_dependencies`.

use std::collections::HashMap;

use crate::connection::SqlServerConnection;
use crate::error::{Result, SchemaScriptError};
use crate::models::{ModuleDef, ObjectKind, ObjectRef};

use super::helpers::RowExt;

/// A module with its catalog identity, used to wire dependency edges later.
#[derive(Debug, Clone)]
pub(crate) struct ModuleEntry {
    pub object_id: i32,
    pub module: ModuleDef,
}

/// Loads views and, when requested, stored procedures and functions, in
/// catalog order. The stored definition text is carried verbatim; a module
/// whose definition the catalog reports as NULL (encrypted) is malformed
/// metadata for scripting purposes and fails the run.
pub(crate) async fn list_modules(
    conn: &mut SqlServerConnection,
    include_routines: bool,
    allow_system_objects: bool,
) -> Result<Vec<ModuleEntry>> {
    let type_filter = if include_routines {
        "('V', 'P', 'FN', 'IF', 'TF')"
    } else {
        "('V')"
    };
    let shipped_filter = if allow_system_objects {
        ""
    } else {
        "AND o.is_ms_shipped = 0"
    };
    let sql = format!(
        "SELECT o.object_id, s.name AS schema_name, o.name AS object_name, \
         RTRIM(o.type) AS object_type, m.definition \
         FROM sys.objects o \
         JOIN sys.schemas s ON s.schema_id = o.schema_id \
         LEFT JOIN sys.sql_modules m ON m.object_id = o.object_id \
         WHERE o.type IN {type_filter} {shipped_filter} \
         ORDER BY o.object_id"
    );

    let rows = conn.simple_query(&sql).await?;
    let mut modules = Vec::with_capacity(rows.len());

    for row in &rows {
        let schema = row.get_field::<&str>("schema_name", "sys.objects")?.to_string();
        let name = row.get_field::<&str>("object_name", "sys.objects")?.to_string();
        let kind = match row.get_field::<&str>("object_type", "sys.objects")? {
            "V" => ObjectKind::View,
            "P" => ObjectKind::Procedure,
            "FN" | "IF" | "TF" => ObjectKind::Function,
            other => {
                return Err(SchemaScriptError::malformed_metadata(
                    "sys.objects",
                    format!("unexpected module type '{other}' for [{schema}].[{name}]"),
                ))
            }
        };
        let reference = ObjectRef::new(kind, schema, name);

        let definition = row
            .get_field_opt::<&str>("definition", "sys.sql_modules")?
            .ok_or_else(|| {
                SchemaScriptError::generation_failed(
                    &reference,
                    "module definition is unavailable (encrypted or inaccessible)",
                )
            })?
            .to_string();

        modules.push(ModuleEntry {
            object_id: row.get_field("object_id", "sys.objects")?,
            module: ModuleDef {
                reference,
                definition,
            },
        });
    }

    tracing::debug!(count = modules.len(), "enumerated views and routines");
    Ok(modules)
}

/// Loads reference edges from `sys.sql_expression_dependencies` for the
/// given set of loaded objects. Edges whose endpoints are not in the map
/// (dropped objects, cross-database references) are ignored; self-references
/// cannot constrain ordering and are dropped too.
pub(crate) async fn load_dependencies(
    conn: &mut SqlServerConnection,
    by_object_id: &HashMap<i32, ObjectRef>,
) -> Result<Vec<(ObjectRef, ObjectRef)>> {
    let sql = "SELECT DISTINCT d.referencing_id, d.referenced_id \
               FROM sys.sql_expression_dependencies d \
               WHERE d.referenced_id IS NOT NULL \
                 AND d.referenced_database_name IS NULL";

    let rows = conn.simple_query(sql).await?;
    let mut edges = Vec::new();

    for row in &rows {
        let referencing_id: i32 =
            row.get_field("referencing_id", "sys.sql_expression_dependencies")?;
        let referenced_id: i32 =
            row.get_field("referenced_id", "sys.sql_expression_dependencies")?;
        if referencing_id == referenced_id {
            continue;
        }
        if let (Some(from), Some(to)) = (
            by_object_id.get(&referencing_id),
            by_object_id.get(&referenced_id),
        ) {
            edges.push((from.clone(), to.clone()));
        }
    }

    tracing::debug!(count = edges.len(), "loaded expression dependency edges");
    Ok(edges)
}
