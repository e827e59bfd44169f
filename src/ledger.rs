//! Profile Ledger
//!
//! Holds every user's wallet balance and win/loss record. Balances change
//! only through bet settlement; the ledger itself creates profiles and answers
//! "can this profile cover that stake".

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::BetError;
use crate::models::{Profile, MAX_USERNAME_LEN, MIN_USERNAME_LEN};
use crate::store::LedgerStore;

/// Longest avatar reference stored on a profile
pub const MAX_AVATAR_LEN: usize = 512;

#[derive(Clone)]
pub struct ProfileLedger {
    store: Arc<dyn LedgerStore>,
    starting_balance: u64,
}

impl ProfileLedger {
    pub fn new(store: Arc<dyn LedgerStore>, starting_balance: u64) -> Self {
        Self {
            store,
            starting_balance,
        }
    }

    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    /// Register a profile for an authenticated subject, funded with the starting balance
    pub fn register(
        &self,
        user_id: &str,
        username: &str,
        avatar: Option<String>,
    ) -> Result<Profile, BetError> {
        let username = validate_username(username)?;
        let avatar = validate_avatar(avatar)?;

        let profile = Profile::new(user_id.to_string(), username, avatar, self.starting_balance);
        self.store.insert_profile(&profile)?;

        info!(
            profile_id = %profile.id,
            username = %profile.username,
            balance = profile.balance,
            "registered profile"
        );
        Ok(profile)
    }

    pub fn get(&self, id: Uuid) -> Result<Profile, BetError> {
        self.store
            .profile(id)?
            .ok_or_else(|| BetError::NotFound(format!("profile {}", id)))
    }

    /// The profile owned by an identity subject
    pub fn by_subject(&self, user_id: &str) -> Result<Profile, BetError> {
        self.store
            .profile_by_subject(user_id)?
            .ok_or_else(|| BetError::NotFound("profile for this account".into()))
    }
}

/// Stake check used at create and accept time
pub fn ensure_covers(profile: &Profile, amount: u64) -> Result<(), BetError> {
    if profile.balance < amount {
        return Err(BetError::InsufficientBalance {
            available: profile.balance,
            required: amount,
        });
    }
    Ok(())
}

fn validate_username(raw: &str) -> Result<String, BetError> {
    let username = raw.trim();
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(BetError::InvalidInput(format!(
            "username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if len > MAX_USERNAME_LEN {
        return Err(BetError::InvalidInput(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

fn validate_avatar(raw: Option<String>) -> Result<Option<String>, BetError> {
    let avatar = match raw {
        Some(avatar) => avatar.trim().to_string(),
        None => return Ok(None),
    };
    if avatar.is_empty() {
        return Ok(None);
    }
    if avatar.len() > MAX_AVATAR_LEN {
        return Err(BetError::InvalidInput("avatar reference is too long".into()));
    }
    Ok(Some(avatar))
}
