use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use crate::app::{app, AppState};
use crate::config::{AppConfig, Environment};
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::notify::{mailer_from_config, NotificationWorker, TaskQueue};
use crate::services::AccountService;

#[derive(Parser)]
#[command(name = "academy-api")]
#[command(about = "Academy API - role-based academic administration backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Keep all data in memory instead of Postgres")]
        memory: bool,
    },

    #[command(about = "Create the database schema")]
    InitDb,

    #[command(about = "Create an admin account if it does not exist")]
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    match cli.command.unwrap_or(Commands::Serve { memory: false }) {
        Commands::Serve { memory } => serve(config, memory).await,
        Commands::InitDb => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::init_schema(&pool).await?;
            println!("Database schema created");
            Ok(())
        }
        Commands::CreateAdmin { username, email, password } => {
            let store = postgres_store(&config).await?;
            let (tasks, _rx) = TaskQueue::new();
            let state = AppState::new(store, tasks, config);
            let (admin, created) = AccountService::new(&state)
                .ensure_admin(&username, &email, &password)
                .await?;
            if created {
                println!("Created admin {} ({})", admin.username, admin.id);
            } else {
                println!("Admin {} already exists", admin.username);
            }
            Ok(())
        }
    }
}

async fn postgres_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to Postgres")?;
    DatabaseManager::init_schema(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

fn memory_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    if matches!(config.environment, Environment::Production) {
        bail!("--memory is not allowed in production");
    }
    tracing::warn!("Using the in-memory store; data is lost on exit");
    Ok(Arc::new(MemoryStore::new()))
}

async fn serve(config: AppConfig, memory: bool) -> anyhow::Result<()> {
    let store = if memory {
        memory_store(&config)?
    } else {
        postgres_store(&config).await?
    };

    let mailer = mailer_from_config(&config.mail)?;
    let (tasks, receiver) = TaskQueue::new();
    let worker = NotificationWorker::new(store.clone(), mailer, config.mail.from_address.clone()).spawn(receiver);

    let bind_addr = config.bind_address();
    let bootstrap = config.bootstrap.clone();
    let state = AppState::new(store, tasks, config);

    if let Some(admin) = bootstrap {
        let (user, created) = AccountService::new(&state)
            .ensure_admin(&admin.username, &admin.email, &admin.password)
            .await?;
        if created {
            tracing::info!("Bootstrapped admin account {}", user.username);
        }
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!(
        "Academy API listening on http://{} ({:?})",
        bind_addr,
        state.config.environment
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue handle; give the worker a moment to drain
    if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
        tracing::warn!("Notification worker did not finish draining");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["academy-api"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["academy-api", "serve", "--memory"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { memory: true })));
    }

    #[test]
    fn memory_store_follows_the_given_environment() {
        assert!(memory_store(&AppConfig::for_tests()).is_ok());
        assert!(memory_store(&AppConfig::staging()).is_ok());

        let err = memory_store(&AppConfig::production()).err().unwrap();
        assert!(err.to_string().contains("not allowed in production"));
    }

    #[test]
    fn create_admin_requires_all_flags() {
        assert!(Cli::try_parse_from(["academy-api", "create-admin", "--username", "root"]).is_err());
        let cli = Cli::try_parse_from([
            "academy-api",
            "create-admin",
            "--username",
            "root",
            "--email",
            "root@example.com",
            "--password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::CreateAdmin { .. })));
    }
}
