use crate::api::error::AppError;
use crate::entities::{materials, prelude::*, tokens, user_profiles, users};
use crate::utils::auth::{CurrentUser, create_jwt};
use crate::utils::validation::FieldErrors;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Letters, digits and `@ . + - _` only.
fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("username").with_message(Cow::Borrowed(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        )))
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this value has 1 to 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ProfileUpdate {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub university: Option<String>,
    #[validate(length(max = 120, message = "Ensure this value has at most 120 characters."))]
    pub department: Option<String>,
    #[validate(length(max = 120, message = "Ensure this value has at most 120 characters."))]
    pub subject: Option<String>,
    #[validate(length(max = 2000, message = "Ensure this value has at most 2000 characters."))]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileView {
    pub username: String,
    pub is_staff: bool,
    pub joined_at: DateTime<Utc>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub subject: Option<String>,
    pub bio: Option<String>,
    pub has_avatar: bool,
    pub materials_uploaded: u64,
    /// True when the caller is looking at their own profile.
    pub editable: bool,
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string())
}

pub struct AccountService;

impl AccountService {
    /// Creates the user and their empty profile in one transaction, then
    /// issues a token.
    pub async fn register(
        db: &DatabaseConnection,
        req: RegisterRequest,
        jwt_secret: &str,
        ttl_hours: i64,
    ) -> Result<AuthResponse, AppError> {
        req.validate().map_err(FieldErrors::from)?;

        let taken = Users::find()
            .filter(users::Column::Username.eq(&req.username))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(AppError::field(
                "username",
                "A user with that username already exists.",
            ));
        }

        let password_hash = hash_password(&req.password)?;
        let now = Utc::now();
        let user_id = Uuid::new_v4().to_string();

        let txn = db.begin().await?;
        users::ActiveModel {
            id: Set(user_id.clone()),
            username: Set(req.username.clone()),
            password_hash: Set(password_hash),
            is_staff: Set(false),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            // Lost a race with another registration for the same name
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::field("username", "A user with that username already exists.")
            }
            _ => AppError::Database(e),
        })?;

        Self::ensure_profile(&txn, &user_id).await?;
        txn.commit().await?;

        tracing::info!("👤 Registered user {}", req.username);

        Self::issue_token(db, &user_id, jwt_secret, ttl_hours).await
    }

    pub async fn login(
        db: &DatabaseConnection,
        req: LoginRequest,
        jwt_secret: &str,
        ttl_hours: i64,
    ) -> Result<AuthResponse, AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(req.username))
            .one(db)
            .await?
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

        let parsed_hash =
            PasswordHash::new(&user.password_hash).map_err(|e| AppError::Internal(e.to_string()))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

        Self::issue_token(db, &user.id, jwt_secret, ttl_hours).await
    }

    /// Revokes one token by its id claim.
    pub async fn logout(db: &DatabaseConnection, jti: &str) -> Result<(), AppError> {
        Tokens::delete_many()
            .filter(tokens::Column::Jti.eq(jti))
            .exec(db)
            .await?;
        Ok(())
    }

    async fn issue_token(
        db: &DatabaseConnection,
        user_id: &str,
        jwt_secret: &str,
        ttl_hours: i64,
    ) -> Result<AuthResponse, AppError> {
        let issued = create_jwt(user_id, jwt_secret, ttl_hours)?;

        // Stored so the token can be revoked before it expires
        tokens::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            jti: Set(issued.claims.jti.clone()),
            expires_at: Set(issued.expires_at),
        }
        .insert(db)
        .await?;

        Ok(AuthResponse {
            token: issued.token,
        })
    }

    /// The profile row of a user, created on first use.
    pub async fn ensure_profile<C: ConnectionTrait>(
        db: &C,
        user_id: &str,
    ) -> Result<user_profiles::Model, AppError> {
        if let Some(profile) = UserProfiles::find()
            .filter(user_profiles::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(profile);
        }

        Ok(user_profiles::ActiveModel {
            user_id: Set(user_id.to_string()),
            avatar_key: Set(None),
            university: Set(None),
            department: Set(None),
            subject: Set(None),
            bio: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?)
    }

    pub async fn profile(
        db: &DatabaseConnection,
        viewer: &CurrentUser,
        username: &str,
    ) -> Result<ProfileView, AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let profile = Self::ensure_profile(db, &user.id).await?;
        let materials_uploaded = Materials::find()
            .filter(materials::Column::UploaderId.eq(&user.id))
            .count(db)
            .await?;

        Ok(ProfileView {
            editable: viewer.id == user.id,
            username: user.username,
            is_staff: user.is_staff,
            joined_at: user.created_at,
            university: profile.university,
            department: profile.department,
            subject: profile.subject,
            bio: profile.bio,
            has_avatar: profile.avatar_key.is_some(),
            materials_uploaded,
        })
    }

    /// Overwrites the given profile fields. Blank values clear a field.
    pub async fn update_profile(
        db: &DatabaseConnection,
        user: &CurrentUser,
        update: ProfileUpdate,
    ) -> Result<ProfileView, AppError> {
        update.validate().map_err(FieldErrors::from)?;

        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };

        let profile = Self::ensure_profile(db, &user.id).await?;
        let mut active: user_profiles::ActiveModel = profile.into();
        if update.university.is_some() {
            active.university = Set(clean(update.university));
        }
        if update.department.is_some() {
            active.department = Set(clean(update.department));
        }
        if update.subject.is_some() {
            active.subject = Set(clean(update.subject));
        }
        if update.bio.is_some() {
            active.bio = Set(clean(update.bio));
        }
        active.updated_at = Set(Utc::now());
        active.update(db).await?;

        Self::profile(db, user, &user.username).await
    }

    /// Points the profile at a newly stored avatar, returning the old key.
    pub async fn set_avatar(
        db: &DatabaseConnection,
        user_id: &str,
        key: &str,
    ) -> Result<Option<String>, AppError> {
        let profile = Self::ensure_profile(db, user_id).await?;
        let previous = profile.avatar_key.clone();
        let mut active: user_profiles::ActiveModel = profile.into();
        active.avatar_key = Set(Some(key.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(previous.filter(|k| k != key))
    }

    pub async fn avatar_key(db: &DatabaseConnection, username: &str) -> Result<String, AppError> {
        let (_, profile) = Users::find()
            .filter(users::Column::Username.eq(username))
            .find_also_related(UserProfiles)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        profile
            .and_then(|p| p.avatar_key)
            .ok_or_else(|| AppError::NotFound("Avatar not found".to_string()))
    }

    /// Grants or removes the staff role.
    pub async fn set_staff(
        db: &DatabaseConnection,
        username: &str,
        is_staff: bool,
    ) -> Result<(), AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

        let mut active: users::ActiveModel = user.into();
        active.is_staff = Set(is_staff);
        active.update(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            username: "rafi.cse+1@du".to_string(),
            password: "long enough".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            username: "has space".to_string(),
            password: "short".to_string(),
        };
        let errors = FieldErrors::from(bad.validate().unwrap_err());
        assert!(errors.contains("username"));
        assert!(errors.contains("password"));
    }

    #[test]
    fn test_profile_update_limits() {
        let update = ProfileUpdate {
            bio: Some("b".repeat(2001)),
            ..Default::default()
        };
        let errors = FieldErrors::from(update.validate().unwrap_err());
        assert!(errors.contains("bio"));
    }
}
