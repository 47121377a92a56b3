//! End-to-end pipeline tests over in-memory object graphs.
//!
//! These exercise the resolver, generator, and emission filter together,
//! without a live server: the graph is built by hand the same way the
//! catalog loader would assemble it.

use wdbschema_core::models::{
    ColumnDef, ConstraintDef, IndexColumn, ModuleDef, ObjectDef, ObjectGraph, ObjectKind,
    ObjectRef, ReferentialAction, SqlType, TableDef,
};
use wdbschema_core::{resolver, EmissionFilter, ScriptGenerator, ScriptOptions};

fn int_column(name: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        sql_type: SqlType {
            name: "int".to_string(),
            max_length: 4,
            precision: 10,
            scale: 0,
            collation: None,
        },
        nullable: false,
        identity: None,
        computed: None,
        default: None,
    }
}

fn table(graph: &mut ObjectGraph, schema: &str, name: &str, key: &str) -> ObjectRef {
    let reference = ObjectRef::new(ObjectKind::Table, schema, name);
    graph.insert(ObjectDef::Table(TableDef {
        reference: reference.clone(),
        columns: vec![int_column(key)],
        constraints: vec![ConstraintDef::PrimaryKey {
            name: format!("PK_{name}"),
            columns: vec![IndexColumn {
                name: key.to_string(),
                descending: false,
            }],
            clustered: true,
        }],
        indexes: Vec::new(),
    }));
    reference
}

fn view(graph: &mut ObjectGraph, schema: &str, name: &str, body: &str) -> ObjectRef {
    let reference = ObjectRef::new(ObjectKind::View, schema, name);
    graph.insert(ObjectDef::Module(ModuleDef {
        reference: reference.clone(),
        definition: body.to_string(),
    }));
    reference
}

fn run_pipeline(graph: &ObjectGraph) -> String {
    let ordered = resolver::order(graph).unwrap();
    let generator = ScriptGenerator::new(graph, &ordered, ScriptOptions::default());
    let mut out = Vec::new();
    EmissionFilter::default()
        .write_script(&mut out, generator)
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn full_schema_script_orders_tables_before_dependent_views() {
    let mut graph = ObjectGraph::new();
    let customers = table(&mut graph, "dbo", "Customers", "CustomerId");
    let orders = table(&mut graph, "dbo", "Orders", "OrderId");
    graph.add_dependency(orders.clone(), customers.clone());
    let recent = view(
        &mut graph,
        "dbo",
        "vw_recent_orders",
        "CREATE VIEW [dbo].[vw_recent_orders] AS SELECT OrderId FROM dbo.Orders",
    );
    graph.add_dependency(recent, orders);

    let script = run_pipeline(&graph);

    assert_eq!(script.matches("CREATE TABLE").count(), 2);
    assert_eq!(script.matches("CREATE VIEW").count(), 1);
    assert!(!script.contains("CREATE PROCEDURE"));
    assert!(!script.contains("CREATE FUNCTION"));

    let customers_at = script.find("[dbo].[Customers]").unwrap();
    let orders_at = script.find("CREATE TABLE [dbo].[Orders]").unwrap();
    let view_at = script.find("CREATE VIEW").unwrap();
    assert!(customers_at < orders_at);
    assert!(orders_at < view_at);
}

#[test]
fn single_table_script_contains_exactly_one_create_statement() {
    let mut graph = ObjectGraph::new();
    let orders = table(&mut graph, "sales", "Orders", "OrderId");
    // FK target outside the selection must not surface in the output
    graph.add_dependency(
        orders,
        ObjectRef::new(ObjectKind::Table, "dbo", "Customers"),
    );

    let script = run_pipeline(&graph);

    assert_eq!(script.matches("CREATE TABLE").count(), 1);
    assert!(script.contains("CREATE TABLE [sales].[Orders]"));
    assert!(!script.contains("[dbo].[Customers] ("));
}

#[test]
fn every_emitted_block_is_terminated_by_the_batch_separator() {
    let mut graph = ObjectGraph::new();
    table(&mut graph, "dbo", "A", "Id");
    table(&mut graph, "dbo", "B", "Id");

    let script = run_pipeline(&graph);
    assert_eq!(script.matches("\nGO\n\n").count(), 2);
    assert!(script.ends_with("GO\n\n"));
}

#[test]
fn foreign_key_ordering_survives_generation() {
    let mut graph = ObjectGraph::new();
    let parent = ObjectRef::new(ObjectKind::Table, "dbo", "Parents");
    let child_ref = ObjectRef::new(ObjectKind::Table, "dbo", "Children");
    graph.insert(ObjectDef::Table(TableDef {
        reference: child_ref.clone(),
        columns: vec![int_column("ChildId"), int_column("ParentId")],
        constraints: vec![ConstraintDef::ForeignKey {
            name: "FK_Children_Parents".to_string(),
            columns: vec!["ParentId".to_string()],
            referenced_schema: "dbo".to_string(),
            referenced_table: "Parents".to_string(),
            referenced_columns: vec!["ParentId".to_string()],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }],
        indexes: Vec::new(),
    }));
    graph.insert(ObjectDef::Table(TableDef {
        reference: parent.clone(),
        columns: vec![int_column("ParentId")],
        constraints: Vec::new(),
        indexes: Vec::new(),
    }));
    graph.add_dependency(child_ref, parent);

    let script = run_pipeline(&graph);
    let parent_at = script.find("CREATE TABLE [dbo].[Parents]").unwrap();
    let child_at = script.find("CREATE TABLE [dbo].[Children]").unwrap();
    assert!(parent_at < child_at);
    assert!(script.contains(
        "CONSTRAINT [FK_Children_Parents] FOREIGN KEY ([ParentId]) \
         REFERENCES [dbo].[Parents] ([ParentId])"
    ));
}
