//! Data model for catalog objects and their dependency graph.
//!
//! These types carry exactly what the catalog reports — type names with raw
//! length/precision/scale, verbatim module definitions — so the generator
//! can reproduce them without loss. Everything is built once during catalog
//! loading and read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaScriptError};

/// Kinds of scriptable catalog objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    View,
    Procedure,
    Function,
}

impl ObjectKind {
    /// Rank used for deterministic ordering: tables script before views,
    /// views before routines.
    pub(crate) fn rank(self) -> u8 {
        match self {
            ObjectKind::Table => 0,
            ObjectKind::View => 1,
            ObjectKind::Procedure | ObjectKind::Function => 2,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::View => write!(f, "view"),
            ObjectKind::Procedure => write!(f, "procedure"),
            ObjectKind::Function => write!(f, "function"),
        }
    }
}

/// Identifies a catalog object by (kind, schema, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub schema: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}]", self.schema, self.name)
    }
}

/// A column data type exactly as stored in the catalog.
///
/// `max_length` is the raw `sys.columns.max_length` value: bytes for
/// single-byte types, bytes (twice the character count) for `nchar` and
/// `nvarchar`, and -1 for `(max)` types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub name: String,
    pub max_length: i16,
    pub precision: u8,
    pub scale: u8,
    pub collation: Option<String>,
}

impl SqlType {
    /// Renders the type as T-SQL, reproducing length/precision/scale exactly.
    pub fn render(&self) -> String {
        let lower = self.name.to_lowercase();
        match lower.as_str() {
            "decimal" | "numeric" => {
                format!("{}({},{})", self.name, self.precision, self.scale)
            }
            "float" => {
                // float(53) is the default and prints bare
                if self.precision == 53 {
                    self.name.clone()
                } else {
                    format!("{}({})", self.name, self.precision)
                }
            }
            "datetime2" | "datetimeoffset" | "time" => {
                format!("{}({})", self.name, self.scale)
            }
            "char" | "varchar" | "binary" | "varbinary" => {
                if self.max_length < 0 {
                    format!("{}(max)", self.name)
                } else {
                    format!("{}({})", self.name, self.max_length)
                }
            }
            "nchar" | "nvarchar" => {
                if self.max_length < 0 {
                    format!("{}(max)", self.name)
                } else {
                    format!("{}({})", self.name, self.max_length / 2)
                }
            }
            _ => self.name.clone(),
        }
    }

    /// True for types that carry a collation clause.
    pub fn is_character_type(&self) -> bool {
        matches!(
            self.name.to_lowercase().as_str(),
            "char" | "varchar" | "nchar" | "nvarchar" | "text" | "ntext"
        )
    }
}

/// IDENTITY seed and increment for an identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub seed: i64,
    pub increment: i64,
}

/// A column default constraint: name plus the stored expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSpec {
    pub constraint_name: String,
    pub expression: String,
}

/// A table or view column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub identity: Option<IdentitySpec>,
    /// Computed-column expression; such columns render as `AS (expr)`.
    pub computed: Option<String>,
    pub default: Option<DefaultSpec>,
}

/// A key or index column with its sort direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub included: Vec<String>,
    pub unique: bool,
    pub clustered: bool,
}

/// Referential actions for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintDef {
    PrimaryKey {
        name: String,
        columns: Vec<IndexColumn>,
        clustered: bool,
    },
    Unique {
        name: String,
        columns: Vec<IndexColumn>,
    },
    ForeignKey {
        name: String,
        columns: Vec<String>,
        referenced_schema: String,
        referenced_table: String,
        referenced_columns: Vec<String>,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
    Check {
        name: String,
        expression: String,
    },
}

impl ConstraintDef {
    /// Constraint name as stored in the catalog.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::PrimaryKey { name, .. }
            | ConstraintDef::Unique { name, .. }
            | ConstraintDef::ForeignKey { name, .. }
            | ConstraintDef::Check { name, .. } => name,
        }
    }
}

/// A table definition with columns, constraints, and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub reference: ObjectRef,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<ConstraintDef>,
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Validates the table invariants: column names unique within the table,
    /// at most one primary key.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaScriptError::generation_failed(
                    &self.reference,
                    format!("duplicate column name '{}'", column.name),
                ));
            }
        }

        let pk_count = self
            .constraints
            .iter()
            .filter(|c| matches!(c, ConstraintDef::PrimaryKey { .. }))
            .count();
        if pk_count > 1 {
            return Err(SchemaScriptError::generation_failed(
                &self.reference,
                format!("{pk_count} primary key constraints"),
            ));
        }

        Ok(())
    }
}

/// A view or routine: the verbatim defining text from `sys.sql_modules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDef {
    pub reference: ObjectRef,
    pub definition: String,
}

/// A loaded catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectDef {
    Table(TableDef),
    Module(ModuleDef),
}

impl ObjectDef {
    pub fn reference(&self) -> &ObjectRef {
        match self {
            ObjectDef::Table(t) => &t.reference,
            ObjectDef::Module(m) => &m.reference,
        }
    }
}

/// The in-memory object graph: definitions plus dependency edges, in catalog
/// enumeration order.
///
/// Insertion order is preserved and exposed through [`ObjectGraph::position`]
/// so downstream ordering is reproducible across runs. The graph is built
/// once by the catalog loader and treated as immutable afterwards.
#[derive(Debug, Default, Clone)]
pub struct ObjectGraph {
    order: Vec<ObjectRef>,
    definitions: HashMap<ObjectRef, ObjectDef>,
    dependencies: HashMap<ObjectRef, Vec<ObjectRef>>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object in catalog enumeration order. Re-inserting the same
    /// reference replaces the definition but keeps the original position.
    pub fn insert(&mut self, definition: ObjectDef) {
        let reference = definition.reference().clone();
        if !self.definitions.contains_key(&reference) {
            self.order.push(reference.clone());
        }
        self.definitions.insert(reference, definition);
    }

    /// Records a dependency edge: `from` requires `to` to exist first.
    /// Edges pointing outside the graph (e.g. to unselected objects) are
    /// kept; the resolver skips them.
    pub fn add_dependency(&mut self, from: ObjectRef, to: ObjectRef) {
        let deps = self.dependencies.entry(from).or_default();
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// References in catalog enumeration order.
    pub fn refs(&self) -> &[ObjectRef] {
        &self.order
    }

    pub fn definition(&self, reference: &ObjectRef) -> Option<&ObjectDef> {
        self.definitions.get(reference)
    }

    /// Direct dependencies of an object, empty if none were recorded.
    pub fn dependencies(&self, reference: &ObjectRef) -> &[ObjectRef] {
        self.dependencies
            .get(reference)
            .map_or(&[], Vec::as_slice)
    }

    /// Position in catalog enumeration order, used as the deterministic
    /// tie-breaker during dependency resolution.
    pub fn position(&self, reference: &ObjectRef) -> Option<usize> {
        self.order.iter().position(|r| r == reference)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
