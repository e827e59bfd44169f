// In-memory ledger store. All writes take the table lock, so every call is atomic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{
    apply_settlement, select, settlement_parties, BetFilter, LedgerStore, SettledBet, Settlement,
    StoreError, StoreResult,
};
use crate::models::{Bet, BetStatus, Profile};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    bets: HashMap<Uuid, Bet>,
    /// Lowercased username -> profile id
    usernames: HashMap<String, Uuid>,
    /// Identity subject -> profile id
    subjects: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

fn missing_profile(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("profile {}", id))
}

impl LedgerStore for MemoryStore {
    fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut tables = self.write()?;
        let username = profile.username.to_lowercase();

        if tables.usernames.contains_key(&username) {
            return Err(StoreError::UsernameTaken(profile.username.clone()));
        }
        if tables.subjects.contains_key(&profile.user_id) {
            return Err(StoreError::SubjectTaken(profile.user_id.clone()));
        }

        tables.usernames.insert(username, profile.id);
        tables.subjects.insert(profile.user_id.clone(), profile.id);
        tables.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.get(&id).cloned())
    }

    fn profile_by_subject(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let tables = self.read()?;
        Ok(tables
            .subjects
            .get(user_id)
            .and_then(|id| tables.profiles.get(id))
            .cloned())
    }

    fn insert_bet(&self, bet: &Bet) -> StoreResult<()> {
        self.write()?.bets.insert(bet.id, bet.clone());
        Ok(())
    }

    fn bet(&self, id: Uuid) -> StoreResult<Option<Bet>> {
        Ok(self.read()?.bets.get(&id).cloned())
    }

    fn query_bets(&self, filter: &BetFilter) -> StoreResult<Vec<Bet>> {
        let tables = self.read()?;
        Ok(select(tables.bets.values().cloned(), filter))
    }

    fn swap_bet(&self, id: Uuid, expected: BetStatus, update: &dyn Fn(&mut Bet)) -> StoreResult<Bet> {
        let mut tables = self.write()?;
        let bet = tables
            .bets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("bet {}", id)))?;

        if bet.status != expected {
            return Err(StoreError::StatusMismatch {
                id,
                expected,
                actual: bet.status,
            });
        }
        update(bet);
        Ok(bet.clone())
    }

    fn settle(&self, settlement: &Settlement) -> StoreResult<SettledBet> {
        let mut tables = self.write()?;

        let mut bet = tables
            .bets
            .get(&settlement.bet_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("bet {}", settlement.bet_id)))?;
        let (winner_id, loser_id) = settlement_parties(&bet, settlement.winner)?;
        let mut winner = tables
            .profiles
            .get(&winner_id)
            .cloned()
            .ok_or_else(|| missing_profile(winner_id))?;
        let mut loser = tables
            .profiles
            .get(&loser_id)
            .cloned()
            .ok_or_else(|| missing_profile(loser_id))?;

        // mutate copies, commit only once every check has passed
        apply_settlement(&mut bet, &mut winner, &mut loser, settlement.at)?;

        tables.bets.insert(bet.id, bet.clone());
        tables.profiles.insert(winner.id, winner.clone());
        tables.profiles.insert(loser.id, loser.clone());
        Ok(SettledBet { bet, winner, loser })
    }
}
