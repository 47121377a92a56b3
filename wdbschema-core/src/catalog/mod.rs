//! Object catalog loader: turns system catalog metadata into an
//! [`ObjectGraph`](crate::models::ObjectGraph).
//!
//! Loading is a single sequential pass: enumerate tables, apply the
//! selector, load each selected table's definition, then (for full-schema
//! selections) load views/routines and the expression dependency edges.
//! The resulting graph is read-only for the rest of the run.

mod helpers;
mod modules;
mod tables;

use std::collections::HashMap;

use crate::connection::SqlServerConnection;
use crate::error::{Result, SchemaScriptError};
use crate::models::{ConstraintDef, ObjectDef, ObjectGraph, ObjectKind, ObjectRef};

/// What to load from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectSelector {
    /// Every user table and view, plus procedures/functions when requested.
    AllObjects { include_routines: bool },
    /// One table by name, with an optional exact schema qualifier. Without a
    /// qualifier the first match in catalog enumeration order wins.
    Table {
        name: String,
        schema: Option<String>,
    },
}

impl std::fmt::Display for ObjectSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectSelector::AllObjects { include_routines } => {
                if *include_routines {
                    write!(f, "all objects including routines")
                } else {
                    write!(f, "all tables and views")
                }
            }
            ObjectSelector::Table {
                name,
                schema: Some(schema),
            } => write!(f, "table [{schema}].[{name}]"),
            ObjectSelector::Table { name, schema: None } => write!(f, "table '{name}'"),
        }
    }
}

/// Loads the selected objects and their dependency edges into a graph.
///
/// Fails with `ObjectNotFound` when a table selector matches nothing and
/// with `NoObjectsSelected` when the final selection is empty; an empty
/// graph is never returned as a success.
pub async fn load_objects(
    conn: &mut SqlServerConnection,
    selector: &ObjectSelector,
    allow_system_objects: bool,
) -> Result<ObjectGraph> {
    tracing::info!(%selector, "loading catalog objects");

    let all_tables = tables::list_tables(conn, allow_system_objects).await?;

    let selected_tables = match selector {
        ObjectSelector::AllObjects { .. } => all_tables,
        ObjectSelector::Table { name, schema } => {
            let matched = all_tables.into_iter().find(|t| {
                t.name == *name && schema.as_ref().is_none_or(|s| t.schema == *s)
            });
            match matched {
                Some(entry) => vec![entry],
                None => return Err(SchemaScriptError::object_not_found(selector.to_string())),
            }
        }
    };

    let mut graph = ObjectGraph::new();
    let mut by_object_id: HashMap<i32, ObjectRef> = HashMap::new();

    for entry in &selected_tables {
        let table = tables::load_table(conn, entry).await?;
        let reference = table.reference.clone();
        by_object_id.insert(entry.object_id, reference.clone());

        // Referential constraints order referenced tables first.
        for constraint in &table.constraints {
            if let ConstraintDef::ForeignKey {
                referenced_schema,
                referenced_table,
                ..
            } = constraint
            {
                graph.add_dependency(
                    reference.clone(),
                    ObjectRef::new(
                        ObjectKind::Table,
                        referenced_schema.clone(),
                        referenced_table.clone(),
                    ),
                );
            }
        }

        graph.insert(ObjectDef::Table(table));
    }

    if let ObjectSelector::AllObjects { include_routines } = selector {
        let modules =
            modules::list_modules(conn, *include_routines, allow_system_objects).await?;
        for entry in &modules {
            by_object_id.insert(entry.object_id, entry.module.reference.clone());
        }
        for entry in modules {
            graph.insert(ObjectDef::Module(entry.module));
        }

        for (from, to) in modules::load_dependencies(conn, &by_object_id).await? {
            graph.add_dependency(from, to);
        }
    }

    if graph.is_empty() {
        return Err(SchemaScriptError::no_objects_selected(format!(
            "selector '{selector}' produced an empty object set"
        )));
    }

    tracing::info!(objects = graph.len(), "catalog load complete");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_display_reads_naturally() {
        let all = ObjectSelector::AllObjects {
            include_routines: false,
        };
        assert_eq!(all.to_string(), "all tables and views");

        let with_routines = ObjectSelector::AllObjects {
            include_routines: true,
        };
        assert_eq!(with_routines.to_string(), "all objects including routines");

        let qualified = ObjectSelector::Table {
            name: "Orders".to_string(),
            schema: Some("sales".to_string()),
        };
        assert_eq!(qualified.to_string(), "table [sales].[Orders]");

        let bare = ObjectSelector::Table {
            name: "Orders".to_string(),
            schema: None,
        };
        assert_eq!(bare.to_string(), "table 'Orders'");
    }
}
