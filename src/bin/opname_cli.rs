use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use utoipa::OpenApi;

use opname_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    openapi::ApiDoc,
    AppState,
};

#[derive(Parser)]
#[command(name = "opname", about = "Opname CLI for bootstrap, migrations and backups", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create the admin account, or reset it when the email already exists
    CreateAdmin(CreateAdminArgs),
    /// Export or restore a backup archive
    #[command(subcommand)]
    Backup(BackupCommands),
    /// Print the OpenAPI document
    Openapi,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "Administrator")]
    name: String,
    #[arg(long, env = "OPNAME_ADMIN_PASSWORD")]
    password: String,
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Write every table to a zip archive
    Export {
        /// Destination path
        file: PathBuf,
    },
    /// Replace all data with the contents of a zip archive
    Import {
        /// Archive to restore
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Openapi = cli.command {
        print_json(&ApiDoc::openapi())?;
        return Ok(());
    }

    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin(args) => handle_create_admin(&context, args, cli.json).await?,
        Commands::Backup(command) => handle_backup_command(&context, command, cli.json).await?,
        Commands::Openapi => {}
    }

    Ok(())
}

async fn handle_create_admin(context: &CliContext, args: CreateAdminArgs, json: bool) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;

    let state = context.state();
    let admin = state
        .services
        .users
        .ensure_admin(&args.email, &args.name, &args.password)
        .await
        .context("failed to create admin account")?;

    if json {
        print_json(&admin)?;
    } else {
        println!("Admin {} ready (id {})", admin.email, admin.id);
    }
    Ok(())
}

async fn handle_backup_command(
    context: &CliContext,
    command: BackupCommands,
    json: bool,
) -> Result<()> {
    let state = context.state();
    match command {
        BackupCommands::Export { file } => {
            let bytes = state
                .services
                .backup
                .export()
                .await
                .context("failed to build backup archive")?;
            tokio::fs::write(&file, &bytes)
                .await
                .with_context(|| format!("failed to write {}", file.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), file.display());
        }
        BackupCommands::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = state
                .services
                .backup
                .import(bytes)
                .await
                .context("restore failed")?;

            if json {
                print_json(&report)?;
            } else {
                println!("Restored {} rows with the {:?} engine", report.total, report.engine);
                for table in &report.tables {
                    match &table.reason {
                        Some(reason) if table.skipped => {
                            println!("- {} • skipped ({})", table.table, reason)
                        }
                        _ => println!("- {} • {} rows", table.table, table.inserted),
                    }
                }
            }
        }
    }
    Ok(())
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn state(&self) -> AppState {
        AppState::new(self.db.clone(), self.config.clone())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
