use crate::services::lookups::{LookupKind, LookupService};
use sea_orm::DatabaseConnection;
use tracing::info;

/// Categories every deployment starts with.
pub const CORE_CATEGORIES: [&str; 6] = ["pdf", "docx", "pptx", "semester", "subject", "department"];

/// Inserts the core categories that are missing and gives any existing one
/// without a slug a derived slug. Returns how many were created.
pub async fn seed_core_categories(db: &DatabaseConnection) -> anyhow::Result<usize> {
    info!("🌱 Seeding core categories...");

    let mut created = 0;
    for name in CORE_CATEGORIES {
        let (_, is_new) = LookupService::get_or_create(db, LookupKind::Category, name)
            .await
            .map_err(|e| anyhow::anyhow!("failed to seed category '{}': {}", name, e))?;
        if is_new {
            created += 1;
        }
    }

    info!("✅ Core categories ready ({} created)", created);
    Ok(created)
}
