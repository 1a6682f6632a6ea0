mod config;
mod error;
mod fallback;
mod telemetry;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use runtime::{CompilationRequest, EvalOptions, Override, Playground};
use serde_json::{Value, json};
use syntax::Dialect;

use config::Config;
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "regoplay")]
#[command(about = "Compile and evaluate Rego policy selections", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./regoplay.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a selection against policy modules and evaluate it
    Eval(EvalArgs),
    /// List the variables a selection binds
    Vars {
        /// Policy module
        #[arg(short, long)]
        module: PathBuf,
        /// Selection text
        #[arg(short, long)]
        selection: String,
        /// Rego version (0 or 1)
        #[arg(long)]
        rego_version: Option<u8>,
    },
}

#[derive(Args)]
struct EvalArgs {
    /// Policy module files
    #[arg(short, long = "module", required = true)]
    modules: Vec<PathBuf>,
    /// Selection or query text; empty selects the whole package
    #[arg(short, long, default_value = "")]
    query: String,
    /// JSON input document
    #[arg(long)]
    input: Option<PathBuf>,
    /// JSON data document
    #[arg(long)]
    data: Option<PathBuf>,
    /// Package to resolve the query in; an empty string means none
    #[arg(long)]
    package: Option<String>,
    /// Imports available to the query
    #[arg(long = "import")]
    imports: Vec<String>,
    /// Compile the query with no imports, even if the module has some
    #[arg(long, conflicts_with = "imports")]
    no_imports: bool,
    /// Enable strict compilation checks
    #[arg(long)]
    strict: bool,
    /// Rego version (0 or 1). Omit to try 1, then 0
    #[arg(long)]
    rego_version: Option<u8>,
    /// Include an evaluation trace
    #[arg(long)]
    trace: bool,
    /// Include a coverage report
    #[arg(long)]
    coverage: bool,
    /// Run to completion and report every built-in error
    #[arg(long)]
    all_builtin_errors: bool,
    /// Stop at the first built-in error (overrides --all-builtin-errors)
    #[arg(long)]
    strict_builtin_errors: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    telemetry::init_tracing(config.log.json, config.log_level()?);
    let playground = Playground::regorus().with_config(config.eval_config());

    match cli.command {
        Commands::Eval(args) => cmd_eval(&playground, args).await,
        Commands::Vars {
            module,
            selection,
            rego_version,
        } => cmd_vars(&playground, &module, &selection, rego_version),
    }
}

async fn cmd_eval(playground: &Playground<runtime::RegorusEngine>, args: EvalArgs) -> Result<()> {
    let mut modules = BTreeMap::new();
    for path in &args.modules {
        modules.insert(module_name(path), read(path)?);
    }

    let imports = if args.no_imports {
        Override::Empty
    } else if args.imports.is_empty() {
        Override::Infer
    } else {
        Override::Set(args.imports)
    };
    let package = match args.package {
        Some(package) if package.is_empty() => Override::Empty,
        other => Override::from(other),
    };

    let request = CompilationRequest {
        modules,
        input: args.input.as_deref().map(read_json).transpose()?,
        data: args.data.as_deref().map(read_json).transpose()?,
        query: args.query,
        package,
        imports,
        strict: args.strict,
        dialect: args.rego_version.map(dialect).transpose()?,
    };

    let compiled = match fallback::compile_with_fallback(playground, &request) {
        Ok(compiled) => compiled,
        Err(failure) => {
            for diagnostic in &failure.diagnostics {
                eprintln!("{diagnostic}");
            }
            return Err(failure.into());
        }
    };

    let options = EvalOptions {
        trace: args.trace,
        coverage: args.coverage,
        builtin_errors_all: args.all_builtin_errors,
        builtin_errors_strict: args.strict_builtin_errors,
    };
    let result = playground.evaluate(&compiled.result, options).await?;

    let diagnostics: Vec<String> = compiled
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect();
    print_json(&json!({
        "query": compiled.result.query.text(),
        "ignored": diagnostics,
        "result": result,
    }))
}

fn cmd_vars(
    playground: &Playground<runtime::RegorusEngine>,
    module: &Path,
    selection: &str,
    rego_version: Option<u8>,
) -> Result<()> {
    let source = read(module)?;
    let vars = playground.resolve_selection_vars(
        &source,
        selection,
        rego_version.map(dialect).transpose()?,
    )?;
    print_json(&json!({ "vars": vars }))
}

fn module_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn dialect(version: u8) -> Result<Dialect> {
    Dialect::from_version(version).ok_or(Error::RegoVersion(version))
}

fn print_json(value: &Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
