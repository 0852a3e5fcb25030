pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::api::middleware::{
    auth::{auth_middleware, optional_auth_middleware, staff_middleware},
    request_id::request_id_middleware,
};
use crate::config::AppConfig;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::materials::browse,
        handlers::materials::material_detail,
        handlers::materials::download,
        handlers::materials::upload,
        handlers::votes::upvote,
        handlers::votes::downvote,
        handlers::comments::add_comment,
        handlers::comments::add_reply,
        handlers::comments::delete_comment,
        handlers::comments::list_comments,
        handlers::lookups::list_lookups,
        handlers::lookups::create_lookup,
        handlers::lookups::rename_lookup,
        handlers::lookups::delete_lookup,
        handlers::lookups::list_universities,
        handlers::lookups::top_universities,
        handlers::users::get_profile,
        handlers::users::my_profile,
        handlers::users::update_profile,
        handlers::users::upload_avatar,
        handlers::users::get_avatar,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            handlers::comments::CommentForm,
            handlers::comments::ParentId,
            handlers::lookups::CreateLookupRequest,
            handlers::lookups::RenameLookupRequest,
            handlers::users::AvatarResponse,
            services::accounts::RegisterRequest,
            services::accounts::LoginRequest,
            services::accounts::AuthResponse,
            services::accounts::ProfileUpdate,
            services::accounts::ProfileView,
            services::catalog::LookupRef,
            services::catalog::MaterialSummary,
            services::catalog::MaterialPage,
            services::catalog::MaterialDetail,
            services::comments::CommentView,
            services::comments::CommentNode,
            services::comments::CommentPosted,
            services::comments::CommentDeleted,
            services::comments::CommentThread,
            services::lookups::LookupKind,
            services::lookups::LookupView,
            services::lookups::UniversityStat,
            services::votes::VoteState,
            services::votes::VoteTally,
            utils::validation::FileKind,
            utils::validation::FieldErrors,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Health"),
        (name = "auth", description = "Registration and tokens"),
        (name = "materials", description = "Catalog, upload and download"),
        (name = "votes", description = "Up/down votes on materials"),
        (name = "comments", description = "Threaded comments"),
        (name = "lookups", description = "Categories, departments, semesters and universities"),
        (name = "users", description = "Profiles")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub config: AppConfig,
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), auth_middleware);
    let optional_auth = from_fn_with_state(state.clone(), optional_auth_middleware);
    let staff = from_fn(staff_middleware);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health_check))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route(
            "/logout",
            post(handlers::auth::logout).route_layer(auth.clone()),
        )
        .route("/materials/browse", get(handlers::materials::browse))
        .route(
            "/materials/upload",
            post(handlers::materials::upload)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024, // Add 10MB buffer for multipart overhead
                ))
                .route_layer(auth.clone()),
        )
        .route(
            "/materials/:id",
            get(handlers::materials::material_detail).route_layer(optional_auth),
        )
        .route(
            "/materials/:id/download",
            get(handlers::materials::download),
        )
        .route(
            "/materials/:id/upvote",
            post(handlers::votes::upvote).route_layer(auth.clone()),
        )
        .route(
            "/materials/:id/downvote",
            post(handlers::votes::downvote).route_layer(auth.clone()),
        )
        .route(
            "/materials/:id/comments",
            get(handlers::comments::list_comments),
        )
        .route(
            "/materials/:id/comment",
            post(handlers::comments::add_comment).route_layer(auth.clone()),
        )
        .route(
            "/materials/:id/reply",
            post(handlers::comments::add_reply).route_layer(auth.clone()),
        )
        .route(
            "/comment/:id/delete",
            post(handlers::comments::delete_comment).route_layer(auth.clone()),
        )
        .route(
            "/lookups/:kind",
            get(handlers::lookups::list_lookups).merge(
                post(handlers::lookups::create_lookup)
                    .route_layer(staff.clone())
                    .route_layer(auth.clone()),
            ),
        )
        .route(
            "/lookups/:kind/:id",
            put(handlers::lookups::rename_lookup)
                .delete(handlers::lookups::delete_lookup)
                .route_layer(staff)
                .route_layer(auth.clone()),
        )
        .route("/universities", get(handlers::lookups::list_universities))
        .route(
            "/universities/top",
            get(handlers::lookups::top_universities),
        )
        .route(
            "/users/me/profile",
            get(handlers::users::my_profile)
                .put(handlers::users::update_profile)
                .route_layer(auth.clone()),
        )
        .route(
            "/users/me/avatar",
            post(handlers::users::upload_avatar)
                .layer(axum::extract::DefaultBodyLimit::max(
                    handlers::users::AVATAR_MAX_BYTES as usize + 64 * 1024,
                ))
                .route_layer(auth.clone()),
        )
        .route(
            "/users/:username/profile",
            get(handlers::users::get_profile).route_layer(auth.clone()),
        )
        .route(
            "/users/:username/avatar",
            get(handlers::users::get_avatar).route_layer(auth),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
