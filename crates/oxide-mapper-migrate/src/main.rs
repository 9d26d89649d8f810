//! oxide-mapper-migrate CLI
//!
//! Applies numbered `.sql` migrations to a SQLite database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxide_mapper::dialect::Sqlite3;
use oxide_mapper_migrate::{Migrator, DEFAULT_TABLE};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Numbered .sql file migrations.
#[derive(Parser)]
#[command(name = "oxide-mapper-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Directory holding the numbered .sql files.
    #[arg(short = 'm', long = "dir", env = "MIGRATIONS_DIR", default_value = "migrations")]
    dir: PathBuf,

    /// Bookkeeping table name.
    #[arg(short, long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations.
    Up,

    /// Print the current schema version.
    Version,

    /// List migrations as applied or pending.
    Status,
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

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&cli.database)
        .await?;

    let migrator = Migrator::new(pool, &cli.dir)
        .dialect(Sqlite3)
        .table(&cli.table)
        .verbose(cli.verbose);

    match cli.command {
        Commands::Up => {
            let applied = migrator.run().await?;
            if applied.is_empty() {
                info!("Database is up to date.");
            } else {
                info!("Applied {} migration(s): {:?}", applied.len(), applied);
            }
        }

        Commands::Version => match migrator.current_version().await? {
            Some(version) => println!("{version}"),
            None => println!("none"),
        },

        Commands::Status => {
            let statuses = migrator.status().await?;
            if statuses.is_empty() {
                info!("No migrations found in {}.", cli.dir.display());
            }
            for status in &statuses {
                let mark = if status.applied { "X" } else { " " };
                println!(
                    " [{mark}] {:>5}  {}",
                    status.migration.version,
                    status.migration.path.display()
                );
            }
        }
    }

    Ok(())
}
