//! Schema introspection and DDL generation engine for SQL Server.
//!
//! The engine is a strictly left-to-right pipeline:
//!
//! 1. [`connection`] — opens one authenticated TDS session.
//! 2. [`catalog`] — queries system catalog views and assembles the
//!    in-memory [`models::ObjectGraph`].
//! 3. [`resolver`] — orders objects so DDL never forward-references.
//! 4. [`script`] — lazily emits one CREATE statement block per object.
//! 5. [`filter`] — strips session-setting boilerplate and appends batch
//!    separators on the way to the output stream.
//!
//! Everything is read-only against the server; no component loops back.
//! Errors are fatal and never retried.

pub mod catalog;
pub mod connection;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod resolver;
pub mod script;

pub use catalog::{load_objects, ObjectSelector};
pub use connection::{ConnectionConfig, Credentials, ServerAddr, SqlServerConnection};
pub use error::{Result, SchemaScriptError};
pub use filter::EmissionFilter;
pub use logging::init_logging;
pub use models::{ObjectGraph, ObjectKind, ObjectRef};
pub use script::{ScriptGenerator, ScriptOptions};
