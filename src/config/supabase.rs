//! Supabase configuration module
//!
//! Loads the credentials of the PostgREST document store that holds
//! transactions, snapshots, flags and subscriber records.

use thiserror::Error;
use tracing::info;

use crate::core::logging::sanitize;

/// Errors for Supabase configuration
#[derive(Debug, Error)]
pub enum SupabaseConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid Supabase URL format: {0}")]
    InvalidUrl(String),
}

/// Supabase configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Supabase project URL (e.g., <https://xxx.supabase.co>)
    pub url: String,
    /// API key sent as `apikey` and bearer token
    pub anon_key: String,
}

impl SupabaseConfig {
    /// Load Supabase configuration from environment variables
    ///
    /// Required env vars:
    /// - `SUPABASE_URL`: Supabase project URL
    /// - `SUPABASE_ANON_KEY`: API key
    pub fn from_env() -> Result<Self, SupabaseConfigError> {
        let url = std::env::var("SUPABASE_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SupabaseConfigError::MissingEnvVar("SUPABASE_URL".to_string()))?;

        if url.contains("your-project") {
            return Err(SupabaseConfigError::MissingEnvVar(
                "SUPABASE_URL (contains placeholder)".to_string(),
            ));
        }

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(SupabaseConfigError::InvalidUrl(url));
        }

        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| SupabaseConfigError::MissingEnvVar("SUPABASE_ANON_KEY".to_string()))?;

        if anon_key.is_empty() || anon_key.contains("your-anon-key") {
            return Err(SupabaseConfigError::MissingEnvVar(
                "SUPABASE_ANON_KEY (contains placeholder)".to_string(),
            ));
        }

        info!(url = %url, anon_key = %sanitize(&anon_key), "Supabase configuration loaded");

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    /// Create a SupabaseConfig pointing at an arbitrary server
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
