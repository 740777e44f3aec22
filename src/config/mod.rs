//! Configuration module for engine settings
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `TokenConfig`, `ExchangeCredentials`)
//! - Flat key/value loading (`load_config`, `load_config_from_env`)
//! - Supabase store credentials (`SupabaseConfig`)
//! - Engine constants with environment variable overrides

pub mod constants;
mod loader;
pub mod supabase;
mod types;

// Re-export types
pub use types::{
    AppConfig, DiscordConfig, ExchangeCredentials, ExchangeKind, SharedConfig, StoreBackend,
    TokenConfig,
};

// Re-export loader functions
pub use loader::{
    config_from_pairs, load_config, load_config_from_env, load_config_from_str, parse_tokens,
};

pub use supabase::{SupabaseConfig, SupabaseConfigError};

#[cfg(test)]
pub(crate) use types::tests::create_valid_config;
