use std::env;

/// Which backend holds uploaded material files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

/// Application configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// File extensions accepted for materials, lowercase without the dot
    pub allowed_extensions: Vec<String>,

    /// Materials per catalog page (default: 10)
    pub page_size: u64,

    /// Hard limit on comment length in characters (default: 2000)
    pub comment_max_chars: usize,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Token lifetime in hours (default: 24)
    pub token_ttl_hours: i64,

    /// "local" or "s3" (default: "local")
    pub storage_backend: StorageBackend,

    /// Root directory for the local storage backend (default: "./media")
    pub media_root: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// Listen address (default: "127.0.0.1:3000")
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024, // 50 MB
            allowed_extensions: ["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "zip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            page_size: 10,
            comment_max_chars: 2000,
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            storage_backend: StorageBackend::Local,
            media_root: "./media".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| split_list(&v, true))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.allowed_extensions),

            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.page_size),

            comment_max_chars: env::var("COMMENT_MAX_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.comment_max_chars),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.token_ttl_hours),

            storage_backend: match env::var("STORAGE_BACKEND")
                .map(|v| v.to_lowercase())
                .as_deref()
            {
                Ok("s3") => StorageBackend::S3,
                _ => default.storage_backend,
            },

            media_root: env::var("MEDIA_ROOT").unwrap_or(default.media_root),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| split_list(&v, false))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.allowed_origins),

            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),
        }
    }

    /// Config for local development and tests: files under the given root.
    pub fn development(media_root: impl Into<String>) -> Self {
        Self {
            media_root: media_root.into(),
            jwt_secret: "development-secret".to_string(),
            ..Self::default()
        }
    }
}

fn split_list(raw: &str, lowercase: bool) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.'))
        .filter(|s| !s.is_empty())
        .map(|s| if lowercase { s.to_lowercase() } else { s.to_string() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.comment_max_chars, 2000);
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert!(config.allowed_extensions.contains(&"pptx".to_string()));
        assert!(!config.allowed_extensions.contains(&"exe".to_string()));
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development("/tmp/media");
        assert_eq!(config.media_root, "/tmp/media");
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" PDF, .zip,,docx ", true), vec!["pdf", "zip", "docx"]);
        assert_eq!(
            split_list("http://a.test, http://B.test", false),
            vec!["http://a.test", "http://B.test"]
        );
    }
}
