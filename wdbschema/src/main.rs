//! Command-line SQL Server schema scripting tool.
//!
//! Connects to a SQL Server instance, introspects the catalog for the
//! requested objects, and prints a schema-only DDL script to stdout. All
//! diagnostics go to stderr; redirect stdout to capture the script.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use wdbschema_core::{
    init_logging, load_objects, resolver, ConnectionConfig, Credentials, EmissionFilter,
    ObjectSelector, Result, SchemaScriptError, ScriptGenerator, ScriptOptions, ServerAddr,
    SqlServerConnection,
};

#[derive(Parser)]
#[command(name = "wdbschema")]
#[command(about = "Prints a schema-creation SQL script for a SQL Server database")]
#[command(version)]
#[command(long_about = "
wdbschema - SQL Server schema scripting

Connects to a SQL Server instance and prints CREATE statements for the
database's tables and views (and, with --functions, stored procedures and
functions) in dependency order, suitable for re-creating the schema
elsewhere.

The script is written to stdout with GO batch separators; redirect it to a
file to save. Diagnostics and errors go to stderr.

EXAMPLES:
  wdbschema -S db01 -d Northwind -E > schema.sql
  wdbschema -S db01 --instance SQLEXPRESS -d Northwind -U sa -P secret
  wdbschema -S db01 -d Northwind -U sa -t Orders --schema sales
")]
struct Cli {
    /// Server hostname or address
    #[arg(short = 'S', long)]
    server: String,

    /// TCP port (mutually exclusive with --instance)
    #[arg(long, conflicts_with = "instance")]
    port: Option<u16>,

    /// Named instance, resolved via the SQL Browser service
    #[arg(long)]
    instance: Option<String>,

    /// Database to script
    #[arg(short = 'd', long)]
    database: String,

    /// Login name for SQL Server authentication
    #[arg(short = 'U', long)]
    user: Option<String>,

    /// Password for SQL Server authentication
    #[arg(short = 'P', long, env = "WDBSCHEMAPASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use Windows integrated authentication instead of a login
    // Not marked as conflicting with --password: a stray WDBSCHEMAPASSWORD
    // in the environment must not break trusted connections.
    #[arg(short = 'E', long, conflicts_with = "user")]
    trusted: bool,

    /// Script only this table
    #[arg(short = 't', long)]
    table: Option<String>,

    /// Schema qualifier for --table (exact match)
    #[arg(long, requires = "table")]
    schema: Option<String>,

    /// Include stored procedures and functions
    #[arg(short = 'f', long)]
    functions: bool,

    /// Omit COLLATE clauses for portability
    #[arg(long)]
    no_collation: bool,

    /// Include system (Microsoft-shipped) objects
    #[arg(long)]
    allow_system_objects: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30")]
    connect_timeout: u64,

    /// Dump the loaded object graph as JSON to stderr (debugging aid)
    #[arg(long)]
    dump_graph: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors and the script itself
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn connection_config(&self) -> Result<ConnectionConfig> {
        let addr = match (&self.port, &self.instance) {
            (Some(port), None) => ServerAddr::Port(*port),
            (None, Some(instance)) => ServerAddr::Instance(instance.clone()),
            (None, None) => ServerAddr::Port(1433),
            // clap enforces the conflict; keep a guard for programmatic use
            (Some(_), Some(_)) => {
                return Err(SchemaScriptError::configuration(
                    "--port and --instance are mutually exclusive",
                ))
            }
        };

        let credentials = if self.trusted {
            Credentials::Trusted
        } else {
            let username = self.user.clone().ok_or_else(|| {
                SchemaScriptError::configuration(
                    "either --trusted or --user is required to authenticate",
                )
            })?;
            // Precedence: explicit flag, then WDBSCHEMAPASSWORD, then empty
            let password = self.password.clone().unwrap_or_default();
            Credentials::Basic { username, password }
        };

        Ok(ConnectionConfig::new(&self.server, &self.database)
            .with_addr(addr)
            .with_credentials(credentials)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout)))
    }

    fn selector(&self) -> ObjectSelector {
        match &self.table {
            Some(name) => ObjectSelector::Table {
                name: name.clone(),
                schema: self.schema.clone(),
            },
            None => ObjectSelector::AllObjects {
                include_routines: self.functions,
            },
        }
    }

    fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            no_collation: self.no_collation,
            ..ScriptOptions::default()
        }
    }
}

/// Prints the object graph to stderr as JSON, keyed by bracketed object
/// names so the output is stable and greppable.
fn dump_graph(graph: &wdbschema_core::ObjectGraph) {
    let entries: Vec<serde_json::Value> = graph
        .refs()
        .iter()
        .map(|r| {
            let deps: Vec<String> = graph.dependencies(r).iter().map(ToString::to_string).collect();
            serde_json::json!({
                "object": r.to_string(),
                "kind": r.kind.to_string(),
                "depends_on": deps,
            })
        })
        .collect();
    match serde_json::to_string_pretty(&entries) {
        Ok(json) => eprintln!("{json}"),
        Err(e) => tracing::warn!("failed to serialize object graph: {e}"),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(&cli).await {
        tracing::debug!(?e, "run failed");
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.connection_config()?;
    let selector = cli.selector();

    let mut conn = SqlServerConnection::connect(&config).await?;
    let graph = load_objects(&mut conn, &selector, cli.allow_system_objects).await?;

    if cli.dump_graph {
        dump_graph(&graph);
    }

    let ordered = resolver::order(&graph)?;
    tracing::info!(objects = ordered.len(), "emitting script");

    let generator = ScriptGenerator::new(&graph, &ordered, cli.script_options());
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    EmissionFilter::default().write_script(&mut out, generator)?;
    out.flush().map_err(|e| SchemaScriptError::Io {
        context: "failed to flush script output".to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn minimal_invocation_defaults_to_port_1433_all_objects() {
        let cli = parse(&["wdbschema", "-S", "db01", "-d", "Northwind", "-E"]);
        let config = cli.connection_config().unwrap();
        assert_eq!(config.addr, ServerAddr::Port(1433));
        assert_eq!(config.credentials, Credentials::Trusted);
        assert_eq!(
            cli.selector(),
            ObjectSelector::AllObjects {
                include_routines: false
            }
        );
    }

    #[test]
    fn functions_flag_includes_routines() {
        let cli = parse(&["wdbschema", "-S", "db01", "-d", "db", "-E", "--functions"]);
        assert_eq!(
            cli.selector(),
            ObjectSelector::AllObjects {
                include_routines: true
            }
        );
    }

    #[test]
    fn table_selection_carries_schema_qualifier() {
        let cli = parse(&[
            "wdbschema", "-S", "db01", "-d", "db", "-E", "-t", "Orders", "--schema", "sales",
        ]);
        assert_eq!(
            cli.selector(),
            ObjectSelector::Table {
                name: "Orders".to_string(),
                schema: Some("sales".to_string()),
            }
        );
    }

    #[test]
    fn schema_without_table_is_rejected() {
        assert!(Cli::try_parse_from([
            "wdbschema", "-S", "db01", "-d", "db", "-E", "--schema", "sales",
        ])
        .is_err());
    }

    #[test]
    fn port_and_instance_are_mutually_exclusive() {
        assert!(Cli::try_parse_from([
            "wdbschema", "-S", "db01", "-d", "db", "-E", "--port", "1433", "--instance", "X",
        ])
        .is_err());
    }

    #[test]
    fn trusted_conflicts_with_sql_login() {
        assert!(Cli::try_parse_from([
            "wdbschema", "-S", "db01", "-d", "db", "-E", "-U", "sa",
        ])
        .is_err());
    }

    #[test]
    fn missing_credentials_fail_configuration() {
        let cli = parse(&["wdbschema", "-S", "db01", "-d", "db"]);
        let err = cli.connection_config().unwrap_err();
        assert!(matches!(err, SchemaScriptError::Configuration { .. }));
    }

    #[test]
    fn explicit_password_wins_and_absent_password_defaults_to_empty() {
        let cli = parse(&[
            "wdbschema", "-S", "db01", "-d", "db", "-U", "sa", "-P", "secret",
        ]);
        let config = cli.connection_config().unwrap();
        assert_eq!(
            config.credentials,
            Credentials::Basic {
                username: "sa".to_string(),
                password: "secret".to_string(),
            }
        );

        let cli = parse(&["wdbschema", "-S", "db01", "-d", "db", "-U", "sa"]);
        if std::env::var("WDBSCHEMAPASSWORD").is_err() {
            let config = cli.connection_config().unwrap();
            assert_eq!(
                config.credentials,
                Credentials::Basic {
                    username: "sa".to_string(),
                    password: String::new(),
                }
            );
        }
    }

    #[test]
    fn no_collation_flag_reaches_script_options() {
        let cli = parse(&[
            "wdbschema", "-S", "db01", "-d", "db", "-E", "--no-collation",
        ]);
        let options = cli.script_options();
        assert!(options.no_collation);
        assert!(options.include_indexes);
        assert!(!options.script_data);
    }
}
