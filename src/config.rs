// Runtime configuration, read from the environment (and .env when present)

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";
pub const DEFAULT_STARTING_BALANCE: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid value: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} is set but {1} is not")]
    Incomplete(&'static str, &'static str),
}

/// Hosted identity provider used to verify bearer tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// sled database directory; None keeps everything in memory
    pub data_dir: Option<PathBuf>,
    pub starting_balance: u64,
    /// Shared secret for the settle endpoint; None disables it
    pub settlement_key: Option<String>,
    /// None falls back to the trusted x-user-id header
    pub supabase: Option<SupabaseSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            data_dir: None,
            starting_balance: DEFAULT_STARTING_BALANCE,
            settlement_key: None,
            supabase: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = get("ARENA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            key: "ARENA_BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let starting_balance = match get("ARENA_STARTING_BALANCE") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "ARENA_STARTING_BALANCE",
                value: raw,
            })?,
            None => DEFAULT_STARTING_BALANCE,
        };

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseSettings {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete("SUPABASE_URL", "SUPABASE_ANON_KEY")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("SUPABASE_ANON_KEY", "SUPABASE_URL")),
            (None, None) => None,
        };

        Ok(Self {
            bind_addr,
            data_dir: get("ARENA_DATA_DIR").map(PathBuf::from),
            starting_balance,
            settlement_key: get("ARENA_SETTLEMENT_KEY"),
            supabase,
        })
    }
}
