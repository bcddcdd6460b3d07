//! oxide-alter CLI
//!
//! Command-line tool for comparing and altering database schemas.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_alter::prelude::*;

/// Bring a database schema in line with a declared model.
#[derive(Parser)]
#[command(name = "oxide-alter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Platform to plan and render SQL for.
    #[arg(short, long, default_value = "sqlite")]
    platform: String,

    /// Match table, column and constraint names exactly.
    #[arg(long)]
    case_sensitive: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the alteration plan from the current schema to a model.
    Diff {
        /// Declared model (JSON).
        model: PathBuf,

        /// Compare from a model file instead of the database.
        #[arg(long)]
        from: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print the SQL bringing the current schema in line with a model.
    Sql {
        /// Declared model (JSON).
        model: PathBuf,

        /// Compare from a model file instead of the database.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Alter the database to match a model.
    Apply {
        /// Declared model (JSON).
        model: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Re-read the schema afterwards and check it matches the model.
        #[arg(long)]
        verify: bool,
    },

    /// Print the current schema as a model declaration.
    Dump {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drop every table whose name matches a regular expression.
    DropTables {
        /// Table name pattern.
        pattern: String,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },
}

async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database URL '{}'", url))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Reads the source model from a file, or from the database when no
/// file is given.
async fn source_model(cli: &Cli, from: Option<&PathBuf>) -> anyhow::Result<Database> {
    match from {
        Some(path) => Ok(read_model_file(path, cli.case_sensitive)?),
        None => {
            let pool = connect(&cli.database).await?;
            Ok(read_model(&pool, "main", None).await?)
        }
    }
}

fn report_warnings(plan: &AlterationPlan) {
    for warning in &plan.warnings {
        warn!("{}", warning);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = PlatformRegistry::with_builtin();
    let platform = registry.require(&cli.platform)?;
    let cs = cli.case_sensitive;

    match &cli.command {
        Commands::Diff {
            model,
            from,
            format,
        } => {
            let target = read_model_file(model, cs)?;
            let source = source_model(&cli, from.as_ref()).await?;
            let plan = plan(&source, &target, platform, cs)?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                Format::Text => {
                    if plan.is_empty() {
                        info!("Schema is up to date.");
                    }
                    for step in &plan.steps {
                        println!("{}", step.description());
                    }
                    report_warnings(&plan);
                }
            }
        }

        Commands::Sql { model, from } => {
            let dialect = for_platform(platform.name())?;
            let target = read_model_file(model, cs)?;
            let source = source_model(&cli, from.as_ref()).await?;
            let plan = plan(&source, &target, platform, cs)?;
            let statements = dialect.emit_plan(&plan, &source, cs)?;
            print!("{}", script(dialect.name(), &statements));
            report_warnings(&plan);
        }

        Commands::Apply {
            model,
            dry_run,
            verify,
        } => {
            anyhow::ensure!(
                platform.name() == "sqlite",
                "apply runs against SQLite databases; use `sql` to render statements for '{}'",
                platform.name()
            );
            let target = read_model_file(model, cs)?;
            let pool = connect(&cli.database).await?;
            let executor = AlterationExecutor::new(pool, SqliteDialect::new())
                .case_sensitive(cs)
                .dry_run(*dry_run);

            if *dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }

            let (plan, report) = executor.migrate(&target, platform).await?;
            report_warnings(&plan);
            info!(
                "Applied {} step(s): {} statement(s), {} skipped",
                plan.len(),
                report.executed,
                report.skipped
            );

            if *verify && !*dry_run {
                executor.verify(&target, platform).await?;
                info!("Schema matches the model.");
            }
        }

        Commands::Dump { output } => {
            let pool = connect(&cli.database).await?;
            let model = read_model(&pool, "main", None).await?;
            let json = write_model(&model)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    info!("Wrote {} table(s) to {}", model.tables.len(), path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::DropTables { pattern, dry_run } => {
            anyhow::ensure!(
                platform.name() == "sqlite",
                "drop-tables runs against SQLite databases"
            );
            let pool = connect(&cli.database).await?;
            let executor = AlterationExecutor::new(pool, SqliteDialect::new())
                .case_sensitive(cs)
                .dry_run(*dry_run);
            let (plan, report) = executor.drop_tables(pattern, platform).await?;
            info!(
                "Dropped tables matching '{}': {} step(s), {} statement(s)",
                pattern,
                plan.len(),
                report.executed
            );
        }
    }

    Ok(())
}
