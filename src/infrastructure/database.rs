use crate::entities::{
    categories, comments, departments, downvotes, materials, semester_years, tokens,
    universities, upvotes, user_profiles, users,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm::{ConnectionTrait, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(50)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates missing tables and indexes. Safe to run on every start.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: users and lookups before materials,
    // materials before votes and comments.
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "user_profiles",
            schema
                .create_table_from_entity(user_profiles::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tokens",
            schema
                .create_table_from_entity(tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "categories",
            schema
                .create_table_from_entity(categories::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "departments",
            schema
                .create_table_from_entity(departments::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "semester_years",
            schema
                .create_table_from_entity(semester_years::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "universities",
            schema
                .create_table_from_entity(universities::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "materials",
            schema
                .create_table_from_entity(materials::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "upvotes",
            schema
                .create_table_from_entity(upvotes::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "downvotes",
            schema
                .create_table_from_entity(downvotes::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "comments",
            schema
                .create_table_from_entity(comments::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create table '{}': {}", name, e))?;
        info!("   - Table '{}' checked/created", name);
    }

    info!("🔄 Checking indexes...");

    let indexes = [
        // One vote of each kind per (user, material)
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_upvotes_user_material ON upvotes(user_id, material_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_downvotes_user_material ON downvotes(user_id, material_id)",
        "CREATE INDEX IF NOT EXISTS idx_upvotes_material ON upvotes(material_id)",
        "CREATE INDEX IF NOT EXISTS idx_downvotes_material ON downvotes(material_id)",
        "CREATE INDEX IF NOT EXISTS idx_materials_created_at ON materials(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_materials_category ON materials(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_materials_department ON materials(department_id)",
        "CREATE INDEX IF NOT EXISTS idx_materials_semester ON materials(semester_id)",
        "CREATE INDEX IF NOT EXISTS idx_materials_university ON materials(university_id)",
        "CREATE INDEX IF NOT EXISTS idx_comments_material ON comments(material_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id)",
    ];

    for query in indexes {
        db.execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
            .map_err(|e| anyhow::anyhow!("index statement failed: {} -> {}", query, e))?;
        tracing::debug!("   - Executed: {}", query);
    }

    Ok(())
}
