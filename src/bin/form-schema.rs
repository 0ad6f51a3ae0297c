//! Form Schema CLI
//!
//! Command-line interface for storing, linting and filling form schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use form_schema::{
    field_errors, lint, load_schema_file, load_values_file, parse_date, Clock, DeliveryError,
    FileStatus, FixedClock, FormBuilder, FormSession, JsonFileRepository, SchemaRepository,
    SessionError, Severity, SystemClock, ValueSet,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "form-schema")]
#[command(about = "Store, lint and fill typed form schemas")]
#[command(version)]
struct Cli {
    /// Schema store file
    #[arg(long, global = true, env = "FORM_SCHEMA_STORE", default_value = "forms.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored schemas
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a stored schema
    Show {
        /// Schema id
        id: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check a schema file and add it to the store
    Import {
        /// Schema file ({ "name", "fields" })
        file: PathBuf,

        /// Override the schema name
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a stored schema (unknown ids are ignored)
    Delete {
        /// Schema id
        id: String,
    },

    /// Lint schema files for errors (syntax, bad fields, broken derived parents)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Fill a form with values, recompute derived fields and submit
    Fill {
        /// Values file ({ "<field id>": value }); derived field ids are ignored
        values: PathBuf,

        /// Stored schema id
        #[arg(long, conflicts_with = "schema", required_unless_present = "schema")]
        id: Option<String>,

        /// Schema file instead of a stored schema
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Date used for age calculations (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let repo = JsonFileRepository::new(&cli.store);

    let result = match cli.command {
        Commands::List { json } => run_list(&repo, json),
        Commands::Show { id, pretty } => run_show(&repo, &id, pretty),
        Commands::Import { file, name } => run_import(&repo, &file, name),
        Commands::Delete { id } => run_delete(&repo, &id),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
        Commands::Fill {
            values,
            id,
            schema,
            today,
            json,
        } => run_fill(FillArgs {
            repo: &repo,
            values,
            id,
            schema,
            today,
            json_output: json,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("FORM_SCHEMA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_list(repo: &JsonFileRepository, json_output: bool) -> Result<(), u8> {
    let schemas = repo.load_all().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if json_output {
        let summary: Vec<_> = schemas
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "name": s.name,
                    "fields": s.fields.len(),
                    "createdAt": s.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(summary));
    } else if schemas.is_empty() {
        println!("No saved forms");
    } else {
        for s in &schemas {
            println!(
                "{}  {}  ({} fields, created {})",
                s.id,
                s.name,
                s.fields.len(),
                s.created_at.format("%Y-%m-%d")
            );
        }
    }

    Ok(())
}

fn run_show(repo: &JsonFileRepository, id: &str, pretty: bool) -> Result<(), u8> {
    let schema = repo.get_by_id(id).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let Some(schema) = schema else {
        eprintln!("Error: no form with id {}", id);
        return Err(2);
    };

    let output = if pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_import(repo: &JsonFileRepository, file: &Path, name: Option<String>) -> Result<(), u8> {
    let mut draft = load_schema_file(file).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    if let Some(name) = name {
        draft.name = name;
    }

    let mut builder = FormBuilder::from_draft(draft);
    let saved = builder.save(repo).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    println!("{}", saved.id);
    Ok(())
}

fn run_delete(repo: &JsonFileRepository, id: &str) -> Result<(), u8> {
    repo.delete(id).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

struct FillArgs<'a> {
    repo: &'a JsonFileRepository,
    values: PathBuf,
    id: Option<String>,
    schema: Option<PathBuf>,
    today: Option<String>,
    json_output: bool,
}

fn run_fill(args: FillArgs<'_>) -> Result<(), u8> {
    let FillArgs {
        repo,
        values: values_path,
        id,
        schema,
        today,
        json_output,
    } = args;

    let fields = match (id, schema) {
        (Some(id), _) => match repo.get_by_id(&id) {
            Ok(Some(schema)) => schema.fields,
            Ok(None) => {
                report_error(json_output, &format!("no form with id {}", id));
                return Err(2);
            }
            Err(e) => {
                report_error(json_output, &e.to_string());
                return Err(e.exit_code() as u8);
            }
        },
        (None, Some(path)) => load_schema_file(&path)
            .map_err(|e| {
                report_error(json_output, &format!("loading schema: {}", e));
                e.exit_code() as u8
            })?
            .fields,
        (None, None) => {
            report_error(json_output, "either --id or --schema is required");
            return Err(2);
        }
    };

    let clock: Arc<dyn Clock> = match today.as_deref() {
        Some(s) => Arc::new(FixedClock(parse_date(s).ok_or_else(|| {
            report_error(json_output, &format!("invalid --today date: {}", s));
            2u8
        })?)),
        None => Arc::new(SystemClock),
    };

    let values = load_values_file(&values_path).map_err(|e| {
        report_error(json_output, &format!("loading values: {}", e));
        e.exit_code() as u8
    })?;

    let mut session = FormSession::with_clock(fields, clock);
    for (field_id, value) in values {
        // Derived values are recomputed, so a previous fill's output can be fed back in.
        if session.field(&field_id).is_some_and(|f| f.is_derived) {
            debug!(field = %field_id, "ignoring supplied value for derived field");
            continue;
        }
        session.set_value(&field_id, value).map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| {
            report_error(json_output, &format!("starting runtime: {}", e));
            3u8
        })?;

    let deliver = |values: &ValueSet| -> Result<(), DeliveryError> {
        let output = if json_output {
            serde_json::json!({ "valid": true, "values": values }).to_string()
        } else {
            serde_json::to_string_pretty(values)?
        };
        println!("{}", output);
        Ok(())
    };

    match runtime.block_on(session.submit(&deliver)) {
        Ok(()) => Ok(()),
        Err(SessionError::Invalid { errors }) => {
            let errors = field_errors(&errors, session.fields());
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
