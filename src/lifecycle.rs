// ============================================================================
// Bet Lifecycle Controller
// ============================================================================
//
//   open ──accept──▶ matched ──settle──▶ completed
//     │
//     └──cancel──▶ cancelled
//
// The stake is checked against the balance at create and accept time but is
// only moved at settlement. Accept and cancel are single conditional updates
// on the stored status; settle is one atomic store commit.
//
// ============================================================================

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::BetError;
use crate::ledger::{ensure_covers, ProfileLedger};
use crate::models::{Bet, BetStatus, CreateBetRequest, MAX_DESCRIPTION_LEN};
use crate::notify::{ChangeKind, ChangeNotifier, RegistryEvent};
use crate::registry::BetRegistry;
use crate::store::{SettledBet, Settlement};

#[derive(Clone)]
pub struct BetLifecycle {
    ledger: ProfileLedger,
    registry: BetRegistry,
    notifier: ChangeNotifier,
}

impl BetLifecycle {
    pub fn new(ledger: ProfileLedger, registry: BetRegistry, notifier: ChangeNotifier) -> Self {
        Self {
            ledger,
            registry,
            notifier,
        }
    }

    /// Post a new open bet on behalf of `creator`
    pub fn create(&self, creator: Uuid, request: &CreateBetRequest) -> Result<Bet, BetError> {
        let description = validate_description(&request.description)?;
        let amount = validate_amount(request.amount)?;

        let profile = self.ledger.get(creator)?;
        ensure_covers(&profile, amount)?;

        let bet = Bet::new(profile.id, description, amount, request.visibility);
        self.registry.insert(&bet)?;

        info!(
            bet_id = %bet.id,
            creator = %profile.username,
            amount,
            visibility = ?bet.visibility,
            "bet created"
        );
        self.notifier.publish(RegistryEvent::new(bet.id, ChangeKind::Created));
        Ok(bet)
    }

    /// open → matched. Exactly one concurrent acceptor wins; the rest get AlreadyMatched.
    pub fn accept(&self, bet_id: Uuid, acceptor: Uuid) -> Result<Bet, BetError> {
        let bet = self.registry.get(bet_id)?;
        if bet.creator == acceptor {
            return Err(BetError::Unauthorized("you cannot accept your own bet".into()));
        }
        check_open(&bet, BetStatus::Matched)?;

        let profile = self.ledger.get(acceptor)?;
        ensure_covers(&profile, bet.amount)?;

        let matched = self
            .registry
            .transition(bet_id, BetStatus::Open, BetStatus::Matched, &|bet: &mut Bet| {
                bet.opponent = Some(acceptor);
            })
            .map_err(|err| lost_race(err, bet_id))?;

        info!(
            bet_id = %bet_id,
            opponent = %profile.username,
            amount = matched.amount,
            "bet matched"
        );
        self.notifier.publish(RegistryEvent::new(bet_id, ChangeKind::Accepted));
        Ok(matched)
    }

    /// matched → completed, moving the stake from loser to winner.
    /// Triggered externally; nothing in the lifecycle decides outcomes.
    pub fn settle(&self, bet_id: Uuid, winner: Uuid) -> Result<SettledBet, BetError> {
        let bet = self.registry.get(bet_id)?;
        if bet.status != BetStatus::Matched {
            return Err(BetError::InvalidTransition {
                id: bet_id,
                from: bet.status,
                to: BetStatus::Completed,
            });
        }
        if bet.counterparty(winner).is_none() {
            return Err(BetError::InvalidInput(
                "winner must be the creator or the opponent".into(),
            ));
        }

        let settled = self
            .registry
            .settle(&Settlement {
                bet_id,
                winner,
                at: Utc::now(),
            })
            .map_err(|err| {
                if let BetError::InsufficientBalance { available, required } = &err {
                    warn!(bet_id = %bet_id, available, required, "loser cannot cover the stake");
                }
                err
            })?;

        info!(
            bet_id = %bet_id,
            winner = %settled.winner.username,
            loser = %settled.loser.username,
            amount = settled.bet.amount,
            "bet settled"
        );
        self.notifier.publish(RegistryEvent::new(bet_id, ChangeKind::Settled));
        Ok(settled)
    }

    /// open → cancelled, creator only
    pub fn cancel(&self, bet_id: Uuid, actor: Uuid) -> Result<Bet, BetError> {
        let bet = self.registry.get(bet_id)?;
        if bet.creator != actor {
            return Err(BetError::Unauthorized("only the creator can cancel a bet".into()));
        }
        check_open(&bet, BetStatus::Cancelled)?;

        let cancelled = self
            .registry
            .transition(bet_id, BetStatus::Open, BetStatus::Cancelled, &|_| {})
            .map_err(|err| lost_race(err, bet_id))?;

        info!(bet_id = %bet_id, "bet cancelled");
        self.notifier.publish(RegistryEvent::new(bet_id, ChangeKind::Cancelled));
        Ok(cancelled)
    }
}

/// A matched bet reports AlreadyMatched. A completed one does too for an
/// acceptor, since it was taken; everything else is a bad transition.
fn check_open(bet: &Bet, to: BetStatus) -> Result<(), BetError> {
    match (bet.status, to) {
        (BetStatus::Open, _) => Ok(()),
        (BetStatus::Matched, _) | (BetStatus::Completed, BetStatus::Matched) => {
            Err(BetError::AlreadyMatched(bet.id))
        }
        (from, to) => Err(BetError::InvalidTransition { id: bet.id, from, to }),
    }
}

fn lost_race(err: BetError, bet_id: Uuid) -> BetError {
    match err {
        BetError::InvalidTransition {
            from: BetStatus::Matched | BetStatus::Completed,
            ..
        } => BetError::AlreadyMatched(bet_id),
        other => other,
    }
}

fn validate_description(raw: &str) -> Result<String, BetError> {
    let description = raw.trim();
    if description.is_empty() {
        return Err(BetError::InvalidInput("please describe your bet".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(BetError::InvalidInput(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(description.to_string())
}

fn validate_amount(amount: i64) -> Result<u64, BetError> {
    if amount <= 0 {
        return Err(BetError::InvalidInput("amount must be greater than zero".into()));
    }
    Ok(amount as u64)
}
