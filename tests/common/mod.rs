#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::path::Path;
use std::sync::Arc;
use study_vault::config::AppConfig;
use study_vault::entities::materials;
use study_vault::infrastructure::database::run_migrations;
use study_vault::services::accounts::{AccountService, RegisterRequest};
use study_vault::services::lookups::{LookupKind, LookupService};
use study_vault::services::storage::{LocalStorageService, StorageService};
use study_vault::utils::auth::{CurrentUser, validate_jwt};
use study_vault::{AppState, create_app};
use tempfile::TempDir;

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    // Keeps the media directory alive for the duration of the test
    pub media: TempDir,
}

/// Lookup ids every material needs.
pub struct Lookups {
    pub category: i32,
    pub department: i32,
    pub semester: i32,
    pub university: i32,
}

pub async fn setup_db() -> DatabaseConnection {
    // One connection: every new in-memory connection is a fresh database
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}

/// A real database file with a pool of connections, for tests where
/// transactions have to run side by side.
pub async fn setup_file_db(dir: &Path) -> DatabaseConnection {
    let url = format!("sqlite://{}?mode=rwc", dir.join("vault.sqlite").display());
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(10).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}

pub async fn setup() -> TestContext {
    setup_with(|_| {}).await
}

pub async fn setup_with(tweak: impl FnOnce(&mut AppConfig)) -> TestContext {
    let media = TempDir::new().unwrap();
    let db = setup_db().await;
    build_context(media, db, tweak)
}

pub async fn setup_file_backed() -> TestContext {
    let media = TempDir::new().unwrap();
    let db = setup_file_db(media.path()).await;
    build_context(media, db, |_| {})
}

fn build_context(
    media: TempDir,
    db: DatabaseConnection,
    tweak: impl FnOnce(&mut AppConfig),
) -> TestContext {
    let mut config = AppConfig::development(media.path().to_string_lossy().to_string());
    tweak(&mut config);

    let storage: Arc<dyn StorageService> = Arc::new(LocalStorageService::new(media.path()));
    let state = AppState {
        db,
        storage,
        config,
    };
    let app = create_app(state.clone());

    TestContext { state, app, media }
}

/// Registers a user and returns their token together with the resolved caller.
pub async fn register(state: &AppState, username: &str) -> (String, CurrentUser) {
    let response = AccountService::register(
        &state.db,
        RegisterRequest {
            username: username.to_string(),
            password: "password123".to_string(),
        },
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )
    .await
    .unwrap();

    let claims = validate_jwt(&response.token, &state.config.jwt_secret).unwrap();
    let user = CurrentUser {
        id: claims.sub,
        username: username.to_string(),
        is_staff: false,
    };
    (response.token, user)
}

pub async fn make_staff(state: &AppState, user: &mut CurrentUser) {
    AccountService::set_staff(&state.db, &user.username, true)
        .await
        .unwrap();
    user.is_staff = true;
}

pub async fn create_lookups(state: &AppState) -> Lookups {
    let id = |kind: LookupKind, name: &'static str| {
        let db = state.db.clone();
        async move {
            LookupService::create(&db, kind, name, None)
                .await
                .unwrap()
                .id
        }
    };

    Lookups {
        category: id(LookupKind::Category, "Lecture Notes").await,
        department: id(LookupKind::Department, "CSE").await,
        semester: id(LookupKind::Semester, "Spring 2024").await,
        university: id(LookupKind::University, "Dhaka University").await,
    }
}

/// Writes `content` to storage and inserts a material pointing at it.
pub async fn create_material(
    state: &AppState,
    uploader: &CurrentUser,
    lookups: &Lookups,
    title: &str,
    content: &[u8],
) -> materials::Model {
    let file_name = format!("{}.pdf", title.replace(' ', "_"));
    let key = format!("materials/test/{}_{}", uuid::Uuid::new_v4().simple(), file_name);
    let stored = state
        .storage
        .put_stream_with_hash(&key, Box::pin(std::io::Cursor::new(content.to_vec())))
        .await
        .unwrap();

    let now = Utc::now();
    materials::ActiveModel {
        uploader_id: Set(uploader.id.clone()),
        title: Set(title.to_string()),
        description: Set(format!("About {}", title)),
        category_id: Set(lookups.category),
        department_id: Set(lookups.department),
        semester_id: Set(lookups.semester),
        university_id: Set(Some(lookups.university)),
        file_key: Set(stored.key),
        file_name: Set(file_name),
        file_size: Set(stored.size),
        file_hash: Set(stored.hash),
        download_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub async fn material_exists(db: &DatabaseConnection, id: i32) -> bool {
    use sea_orm::EntityTrait;
    study_vault::entities::prelude::Materials::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .is_some()
}
