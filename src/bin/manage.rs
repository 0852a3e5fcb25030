use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use study_vault::infrastructure::{database, seed};
use study_vault::services::accounts::AccountService;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Administrative commands for a Study Vault deployment.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant staff rights (lookup management, comment moderation)
    Promote { username: String },
    /// Revoke staff rights
    Demote { username: String },
    /// Create tables and insert the core categories
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manage=info,study_vault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("🔌 Connecting to database...");
    let db = database::setup_database().await?;

    match args.command {
        Command::Promote { username } => set_staff(&db, &username, true).await,
        Command::Demote { username } => set_staff(&db, &username, false).await,
        Command::Seed => {
            let created = seed::seed_core_categories(&db).await?;
            info!("✅ Seed complete, {} new categories.", created);
            Ok(())
        }
    }
}

async fn set_staff(
    db: &sea_orm::DatabaseConnection,
    username: &str,
    is_staff: bool,
) -> anyhow::Result<()> {
    match AccountService::set_staff(db, username, is_staff).await {
        Ok(()) => {
            info!(
                "✅ '{}' is {} staff.",
                username,
                if is_staff { "now" } else { "no longer" }
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Could not update '{}': {}", username, e);
            std::process::exit(1);
        }
    }
}
