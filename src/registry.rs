// Bet Registry - bet records and their guarded status transitions

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::BetError;
use crate::models::{Bet, BetStatus};
use crate::store::{BetFilter, LedgerStore, SettledBet, Settlement, StoreError};

#[derive(Clone)]
pub struct BetRegistry {
    store: Arc<dyn LedgerStore>,
}

impl BetRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// New bets always enter the registry open and unmatched
    pub fn insert(&self, bet: &Bet) -> Result<(), BetError> {
        if bet.status != BetStatus::Open || bet.opponent.is_some() || bet.winner.is_some() {
            return Err(BetError::InvalidInput("new bets must be open and unmatched".into()));
        }
        self.store.insert_bet(bet)?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Bet, BetError> {
        self.store
            .bet(id)?
            .ok_or_else(|| BetError::NotFound(format!("bet {}", id)))
    }

    pub fn query(&self, filter: &BetFilter) -> Result<Vec<Bet>, BetError> {
        Ok(self.store.query_bets(filter)?)
    }

    /// Move a bet `from → to` as one conditional update on its stored status.
    /// `update` sets whatever else the transition carries (e.g. the opponent).
    pub fn transition(
        &self,
        id: Uuid,
        from: BetStatus,
        to: BetStatus,
        update: &dyn Fn(&mut Bet),
    ) -> Result<Bet, BetError> {
        if !from.can_transition_to(to) {
            return Err(BetError::InvalidTransition { id, from, to });
        }

        let now = Utc::now();
        self.store
            .swap_bet(id, from, &|bet: &mut Bet| {
                update(bet);
                bet.status = to;
                bet.updated_at = now;
            })
            .map_err(|err| mismatch_as_transition(err, to))
    }

    /// matched → completed together with the balance moves
    pub fn settle(&self, settlement: &Settlement) -> Result<SettledBet, BetError> {
        self.store
            .settle(settlement)
            .map_err(|err| mismatch_as_transition(err, BetStatus::Completed))
    }
}

fn mismatch_as_transition(err: StoreError, to: BetStatus) -> BetError {
    match err {
        StoreError::StatusMismatch { id, actual, .. } => BetError::InvalidTransition {
            id,
            from: actual,
            to,
        },
        other => other.into(),
    }
}
