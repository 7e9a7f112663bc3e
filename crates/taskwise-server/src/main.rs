use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskwise_core::user::{CreateUser, NewUser};
use taskwise_core::Role;
use taskwise_db::{Database, SqliteDatabase};
use taskwise_server::config::ServerConfig;
use taskwise_server::password::hash_password;

#[derive(Parser)]
#[command(name = "taskwise-server")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user (the first admin, typically)
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Plaintext password; prefer the environment variable
        #[arg(long, env = "TASKWISE_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_parser = parse_role, default_value = "admin")]
        role: Role,
        /// Job title
        #[arg(long)]
        jabatan: Option<String>,
    },
    /// Roll back schema migrations
    MigrateDown {
        /// Target schema version; defaults to undoing the newest migration
        #[arg(long)]
        to: Option<i64>,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse_str(s).ok_or_else(|| format!("unknown role '{s}' (expected admin or employee)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db_config = cli.config.db_config();

    match cli.command {
        Some(Commands::CreateUser {
            name,
            email,
            password,
            role,
            jabatan,
        }) => {
            let input = CreateUser {
                name,
                email,
                password,
                role,
                jabatan,
            };
            input.validate()?;
            let db = SqliteDatabase::open(&db_config).context("opening database")?;
            let user = db
                .create_user(&NewUser {
                    name: input.name.trim().to_string(),
                    email: input.email.trim().to_string(),
                    password_hash: hash_password(&input.password)?,
                    role: input.role,
                    jabatan: input.jabatan,
                })
                .await?;
            eprintln!("Created {} {} (id: {})", user.role, user.email, user.id);
        }
        Some(Commands::MigrateDown { to }) => {
            let db = SqliteDatabase::open_unmigrated(&db_config.path())
                .context("opening database")?;
            let before = db.schema_version()?;
            let after = match to {
                Some(target) if target > before => {
                    bail!("target version {target} is newer than the current version {before}")
                }
                Some(target) => {
                    db.rollback_to(target)?;
                    target
                }
                None => db.rollback_last()?,
            };
            eprintln!("Schema version {before} -> {after}");
        }
        None => {
            let db = SqliteDatabase::open(&db_config).context("opening database")?;
            info!(path = %db_config.path().display(), "database ready");
            let store = taskwise_store::create_store(&cli.config.store_config())?;
            let addr = cli.config.addr();
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(public_url = %cli.config.public_url, "storage served under /storage");
            taskwise_server::serve(listener, Arc::new(db), store, &cli.config.public_url).await?;
        }
    }

    Ok(())
}
