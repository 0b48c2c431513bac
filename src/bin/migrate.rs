//! Migration runner for the orderdesk schema.

use anyhow::Context;
use clap::{Parser, Subcommand};
use orderdesk_api::migrator::Migrator;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

#[derive(Parser)]
#[command(name = "migrate", about = "Run orderdesk database migrations")]
struct Cli {
    /// Database connection URL; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Roll back the most recent migration
    Down,
    /// Drop everything and re-apply all migrations
    Fresh,
    /// Show migration status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("pass --database-url or set DATABASE_URL")?;

    let db = Database::connect(&database_url)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Up => Migrator::up(&db, None).await?,
        Command::Down => Migrator::down(&db, Some(1)).await?,
        Command::Fresh => Migrator::fresh(&db).await?,
        Command::Status => Migrator::status(&db).await?,
    }

    Ok(())
}
