//! Error types for the schema scripting pipeline.
//!
//! Every error is fatal: the pipeline aborts on the first failure, reports
//! it once, and the process exits non-zero. Nothing is retried. Connection
//! errors never expose the password used to authenticate.

use thiserror::Error;

use crate::models::ObjectRef;

/// Main error type for wdbschema operations.
#[derive(Debug, Error)]
pub enum SchemaScriptError {
    /// Server unreachable, authentication rejected, or database missing.
    #[error("Connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A selector (e.g. `--table`) matched no catalog object.
    #[error("Object not found: {selector}")]
    ObjectNotFound { selector: String },

    /// The selection resolved to an empty object set.
    #[error("No objects selected: {context}")]
    NoObjectsSelected { context: String },

    /// Objects reference each other cyclically; no valid DDL order exists.
    #[error("Dependency cycle detected among: {}", format_cycle(members))]
    DependencyCycle { members: Vec<ObjectRef> },

    /// Catalog metadata could not be turned into valid DDL.
    #[error("DDL generation failed for {object}: {context}")]
    Generation { object: String, context: String },

    /// Invalid configuration or command-line input.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Writing the script to the output stream failed.
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with `SchemaScriptError`.
pub type Result<T> = std::result::Result<T, SchemaScriptError>;

fn format_cycle(members: &[ObjectRef]) -> String {
    members
        .iter()
        .map(ObjectRef::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl SchemaScriptError {
    /// Creates a connection error wrapping a driver failure.
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates a connection error with no underlying source (e.g. timeout).
    pub fn connection_context(context: impl Into<String>) -> Self {
        Self::Connection {
            context: context.into(),
            source: None,
        }
    }

    /// Creates an object-not-found error for a selector description.
    pub fn object_not_found(selector: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            selector: selector.into(),
        }
    }

    /// Creates an empty-selection error.
    pub fn no_objects_selected(context: impl Into<String>) -> Self {
        Self::NoObjectsSelected {
            context: context.into(),
        }
    }

    /// Creates a generation error scoped to one object.
    pub fn generation_failed(object: &ObjectRef, context: impl Into<String>) -> Self {
        Self::Generation {
            object: object.to_string(),
            context: context.into(),
        }
    }

    /// Creates a generation error for malformed catalog metadata that is not
    /// attributable to a single loaded object.
    pub fn malformed_metadata(source_view: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Generation {
            object: source_view.into(),
            context: context.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
