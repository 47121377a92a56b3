//! DDL generation: walks ordered objects and emits CREATE statements.
//!
//! The generator is a lazy iterator producing one statement block per
//! object, so memory stays bounded for large schemas. Column type strings
//! reproduce the catalog's length/precision/scale exactly; view and routine
//! bodies are the stored definition text, untouched.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaScriptError};
use crate::models::{
    ColumnDef, ConstraintDef, IndexColumn, IndexDef, ModuleDef, ObjectDef, ObjectGraph, ObjectRef,
    TableDef,
};

/// Options controlling what the generator emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOptions {
    pub include_indexes: bool,
    pub include_constraints: bool,
    pub include_extended_properties: bool,
    pub include_triggers: bool,
    /// Data scripting is outside this tool's scope and always off.
    pub script_data: bool,
    /// Portability mode: omit COLLATE clauses from column definitions.
    pub no_collation: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            include_indexes: true,
            include_constraints: true,
            include_extended_properties: false,
            include_triggers: false,
            script_data: false,
            no_collation: false,
        }
    }
}

/// Lazy statement-block producer over an ordered object sequence.
///
/// Single-pass and finite: each `next()` call scripts one object and the
/// iterator is exhausted when every ordered reference has been visited.
pub struct ScriptGenerator<'a> {
    graph: &'a ObjectGraph,
    ordered: &'a [ObjectRef],
    options: ScriptOptions,
    cursor: usize,
}

impl<'a> ScriptGenerator<'a> {
    pub fn new(graph: &'a ObjectGraph, ordered: &'a [ObjectRef], options: ScriptOptions) -> Self {
        Self {
            graph,
            ordered,
            options,
            cursor: 0,
        }
    }

    fn script_object(&self, reference: &ObjectRef) -> Result<String> {
        let definition = self.graph.definition(reference).ok_or_else(|| {
            SchemaScriptError::generation_failed(reference, "object missing from graph")
        })?;

        match definition {
            ObjectDef::Table(table) => script_table(table, &self.options),
            ObjectDef::Module(module) => script_module(module),
        }
    }
}

impl Iterator for ScriptGenerator<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let reference = self.ordered.get(self.cursor)?;
        self.cursor += 1;
        Some(self.script_object(reference))
    }
}

fn script_table(table: &TableDef, options: &ScriptOptions) -> Result<String> {
    table.validate()?;
    if table.columns.is_empty() {
        return Err(SchemaScriptError::generation_failed(
            &table.reference,
            "table has no columns",
        ));
    }

    let mut lines = Vec::with_capacity(table.columns.len() + table.constraints.len() + 2);
    lines.push(format!("CREATE TABLE {} (", table.reference));

    let mut body: Vec<String> = table
        .columns
        .iter()
        .map(|c| render_column(c, options))
        .collect();

    if options.include_constraints {
        for constraint in &table.constraints {
            body.push(render_constraint(&table.reference, constraint)?);
        }
    }

    let last = body.len().saturating_sub(1);
    for (i, entry) in body.into_iter().enumerate() {
        let terminator = if i == last { "" } else { "," };
        lines.push(format!("    {entry}{terminator}"));
    }
    lines.push(");".to_string());

    if options.include_indexes {
        for index in &table.indexes {
            lines.push(String::new());
            lines.push(render_index(&table.reference, index));
        }
    }

    tracing::debug!(table = %table.reference, "scripted table");
    Ok(lines.join("\n"))
}

fn render_column(column: &ColumnDef, options: &ScriptOptions) -> String {
    // Computed columns carry only their expression.
    if let Some(expression) = &column.computed {
        return format!("[{}] AS {}", column.name, expression);
    }

    let mut parts = vec![format!("[{}]", column.name), column.sql_type.render()];

    if !options.no_collation && column.sql_type.is_character_type() {
        if let Some(collation) = &column.sql_type.collation {
            parts.push(format!("COLLATE {collation}"));
        }
    }

    if let Some(identity) = &column.identity {
        parts.push(format!("IDENTITY({},{})", identity.seed, identity.increment));
    }

    parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

    if options.include_constraints {
        if let Some(default) = &column.default {
            parts.push(format!(
                "CONSTRAINT [{}] DEFAULT {}",
                default.constraint_name, default.expression
            ));
        }
    }

    parts.join(" ")
}

fn render_key_columns(columns: &[IndexColumn]) -> String {
    columns
        .iter()
        .map(|c| {
            if c.descending {
                format!("[{}] DESC", c.name)
            } else {
                format!("[{}]", c.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_constraint(table: &ObjectRef, constraint: &ConstraintDef) -> Result<String> {
    match constraint {
        ConstraintDef::PrimaryKey {
            name,
            columns,
            clustered,
        } => {
            if columns.is_empty() {
                return Err(SchemaScriptError::generation_failed(
                    table,
                    format!("primary key '{name}' has no columns"),
                ));
            }
            let kind = if *clustered {
                "CLUSTERED"
            } else {
                "NONCLUSTERED"
            };
            Ok(format!(
                "CONSTRAINT [{name}] PRIMARY KEY {kind} ({})",
                render_key_columns(columns)
            ))
        }
        ConstraintDef::Unique { name, columns } => {
            if columns.is_empty() {
                return Err(SchemaScriptError::generation_failed(
                    table,
                    format!("unique constraint '{name}' has no columns"),
                ));
            }
            Ok(format!(
                "CONSTRAINT [{name}] UNIQUE ({})",
                render_key_columns(columns)
            ))
        }
        ConstraintDef::ForeignKey {
            name,
            columns,
            referenced_schema,
            referenced_table,
            referenced_columns,
            on_delete,
            on_update,
        } => {
            if columns.len() != referenced_columns.len() || columns.is_empty() {
                return Err(SchemaScriptError::generation_failed(
                    table,
                    format!("foreign key '{name}' has mismatched column lists"),
                ));
            }
            let mut clause = format!(
                "CONSTRAINT [{name}] FOREIGN KEY ([{}]) REFERENCES [{referenced_schema}].[{referenced_table}] ([{}])",
                columns.join("], ["),
                referenced_columns.join("], [")
            );
            if *on_delete != crate::models::ReferentialAction::NoAction {
                clause.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
            }
            if *on_update != crate::models::ReferentialAction::NoAction {
                clause.push_str(&format!(" ON UPDATE {}", on_update.as_sql()));
            }
            Ok(clause)
        }
        ConstraintDef::Check { name, expression } => {
            Ok(format!("CONSTRAINT [{name}] CHECK {expression}"))
        }
    }
}

fn render_index(table: &ObjectRef, index: &IndexDef) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let kind = if index.clustered {
        "CLUSTERED "
    } else {
        ""
    };
    let mut statement = format!(
        "CREATE {unique}{kind}INDEX [{}] ON {table} ({});",
        index.name,
        render_key_columns(&index.columns)
    );
    if !index.included.is_empty() {
        // INCLUDE goes before the terminating semicolon
        statement.pop();
        statement = statement
            .strip_suffix(')')
            .map(str::to_string)
            .unwrap_or(statement);
        statement.push_str(&format!(") INCLUDE ([{}]);", index.included.join("], [")));
    }
    statement
}

fn script_module(module: &ModuleDef) -> Result<String> {
    let definition = module.definition.trim_end();
    if definition.trim().is_empty() {
        return Err(SchemaScriptError::generation_failed(
            &module.reference,
            "stored definition text is empty",
        ));
    }
    // Verbatim catalog text; the batch separator is appended downstream.
    Ok(definition.to_string())
}
