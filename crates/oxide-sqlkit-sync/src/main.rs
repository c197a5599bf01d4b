//! oxide-sqlkit-sync CLI
//!
//! Command-line tool that brings a SQLite database in line with a JSON
//! schema file.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_sqlkit_sync::{SchemaFile, SqliteSync};

/// Brings SQLite tables in line with their declared schema.
#[derive(Parser)]
#[command(name = "oxide-sqlkit-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON schema file.
    #[arg(short, long, default_value = "schema.json")]
    schema: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statements a sync would run, without executing them.
    Plan {
        /// Only plan this table.
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Apply the schema.
    Sync {
        /// Only sync this table.
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Print the live column definitions and indexes of a table.
    Inspect {
        /// Table name.
        table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = SqliteConnectOptions::from_str(&cli.database)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    match cli.command {
        Commands::Plan { table } => {
            let sync = SqliteSync::new(pool).dry_run(true);
            let specs = SchemaFile::load(&cli.schema)?.table_specs()?;
            for spec in specs
                .iter()
                .filter(|s| table.as_deref().is_none_or(|t| t == s.name()))
            {
                let sqls = sync.sync_table(spec).await?;
                if sqls.is_empty() {
                    continue;
                }
                println!("-- {}", spec.name());
                for sql in sqls {
                    println!("{sql};");
                }
            }
        }

        Commands::Sync { table } => {
            let sync = SqliteSync::new(pool);
            let specs = SchemaFile::load(&cli.schema)?.table_specs()?;
            let selected: Vec<_> = specs
                .into_iter()
                .filter(|s| table.as_deref().is_none_or(|t| t == s.name()))
                .collect();
            let applied = sync.sync_all(&selected).await?;
            info!(
                tables = selected.len(),
                statements = applied.len(),
                "Sync complete"
            );
        }

        Commands::Inspect { table } => {
            let sync = SqliteSync::new(pool);
            let d = sync.database().dialect();
            let columns = sync.live_columns(&table).await?;
            println!("\n{table}:");
            println!("{:-<60}", "");
            for column in &columns {
                println!("  {}", d.column_definition(column)?);
            }
            for index in sync.live_indexes(&table).await? {
                let kind = if index.is_unique() { "UNIQUE INDEX" } else { "INDEX" };
                println!("  {kind} {} ({})", index.name(), index.columns().join(", "));
            }
            println!();
        }
    }

    Ok(())
}
