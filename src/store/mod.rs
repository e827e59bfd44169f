// ============================================================================
// Ledger Store - storage boundary for profiles and bets
// ============================================================================
//
// Every mutation that must not interleave with another goes through a single
// store call:
//   - swap_bet: conditional update guarded on the current status (the
//     compare-and-swap used by accept and cancel)
//   - settle: bet + both profiles in one atomic commit
//
// Backends:
//   - MemoryStore: HashMaps behind a RwLock (tests, ephemeral runs)
//   - SledStore: sled trees, bincode values (persistent)
//
// ============================================================================

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Bet, BetStatus, Profile, Visibility};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("subject {0} already has a profile")]
    SubjectTaken(String),

    #[error("bet {id} is {actual}, expected {expected}")]
    StatusMismatch {
        id: Uuid,
        expected: BetStatus,
        actual: BetStatus,
    },

    #[error("profile {profile} is not a party to bet {bet}")]
    NotAParty { bet: Uuid, profile: Uuid },

    #[error("profile {profile} holds {balance}, needs {required}")]
    Shortfall {
        profile: Uuid,
        balance: u64,
        required: u64,
    },

    #[error("balance overflow on profile {0}")]
    Overflow(Uuid),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
}

// ============================================================================
// QUERIES
// ============================================================================

/// Row filter for bet reads. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BetFilter {
    pub statuses: Option<Vec<BetStatus>>,
    pub visibility: Option<Visibility>,
    /// Creator or opponent
    pub party: Option<Uuid>,
}

impl BetFilter {
    /// status == open AND visibility == public
    pub fn public_open() -> Self {
        Self {
            statuses: Some(vec![BetStatus::Open]),
            visibility: Some(Visibility::Public),
            party: None,
        }
    }

    /// creator == profile OR opponent == profile
    pub fn involving(profile: Uuid) -> Self {
        Self {
            party: Some(profile),
            ..Self::default()
        }
    }

    pub fn matches(&self, bet: &Bet) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&bet.status) {
                return false;
            }
        }
        if let Some(visibility) = self.visibility {
            if bet.visibility != visibility {
                return false;
            }
        }
        match self.party {
            Some(profile) => bet.involves(profile),
            None => true,
        }
    }
}

/// Filter and order a full scan, newest first
pub(crate) fn select(bets: impl Iterator<Item = Bet>, filter: &BetFilter) -> Vec<Bet> {
    let mut selected: Vec<Bet> = bets.filter(|bet| filter.matches(bet)).collect();
    selected.sort_by(Bet::newest_first);
    selected
}

// ============================================================================
// SETTLEMENT
// ============================================================================

/// Outcome declaration for a matched bet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub bet_id: Uuid,
    pub winner: Uuid,
    pub at: DateTime<Utc>,
}

/// Records written by a committed settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledBet {
    pub bet: Bet,
    pub winner: Profile,
    pub loser: Profile,
}

/// Resolve (winner, loser) for a bet that must currently be matched
pub(crate) fn settlement_parties(bet: &Bet, winner: Uuid) -> StoreResult<(Uuid, Uuid)> {
    if bet.status != BetStatus::Matched {
        return Err(StoreError::StatusMismatch {
            id: bet.id,
            expected: BetStatus::Matched,
            actual: bet.status,
        });
    }
    let loser = bet.counterparty(winner).ok_or(StoreError::NotAParty {
        bet: bet.id,
        profile: winner,
    })?;
    Ok((winner, loser))
}

/// The four mutations of a settlement, applied to copies the caller commits together
pub(crate) fn apply_settlement(
    bet: &mut Bet,
    winner: &mut Profile,
    loser: &mut Profile,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    if loser.balance < bet.amount {
        return Err(StoreError::Shortfall {
            profile: loser.id,
            balance: loser.balance,
            required: bet.amount,
        });
    }
    winner.balance = winner
        .balance
        .checked_add(bet.amount)
        .ok_or(StoreError::Overflow(winner.id))?;
    loser.balance -= bet.amount;
    winner.wins += 1;
    loser.losses += 1;
    winner.updated_at = at;
    loser.updated_at = at;

    bet.status = BetStatus::Completed;
    bet.winner = Some(winner.id);
    bet.updated_at = at;
    Ok(())
}

/// Storage contract consumed by the ledger, registry and feeds.
///
/// Implementations must make `swap_bet` and `settle` atomic: a concurrent
/// caller either observes none of the write or all of it.
pub trait LedgerStore: Send + Sync {
    /// Fails with `UsernameTaken` / `SubjectTaken` on duplicates (usernames compare case-insensitively)
    fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;

    fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    fn profile_by_subject(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    fn insert_bet(&self, bet: &Bet) -> StoreResult<()>;

    fn bet(&self, id: Uuid) -> StoreResult<Option<Bet>>;

    /// Bets matching `filter`, newest first
    fn query_bets(&self, filter: &BetFilter) -> StoreResult<Vec<Bet>>;

    /// Apply `update` to the stored bet only if its status still equals `expected`.
    /// Returns the bet as committed, or `StatusMismatch` carrying the status found.
    fn swap_bet(&self, id: Uuid, expected: BetStatus, update: &dyn Fn(&mut Bet)) -> StoreResult<Bet>;

    /// Complete a matched bet and move the stake between its parties in one commit
    fn settle(&self, settlement: &Settlement) -> StoreResult<SettledBet>;

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behaviour every backend must share; each backend's tests call these.

    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    pub fn profile(store: &dyn LedgerStore, name: &str, balance: u64) -> Profile {
        let profile = Profile::new(format!("sub-{}", name), name.to_string(), None, balance);
        store.insert_profile(&profile).unwrap();
        profile
    }

    pub fn open_bet(store: &dyn LedgerStore, creator: &Profile, amount: u64) -> Bet {
        let bet = Bet::new(creator.id, "Team X covers spread".into(), amount, Visibility::Public);
        store.insert_bet(&bet).unwrap();
        bet
    }

    fn match_with(opponent: Uuid) -> impl Fn(&mut Bet) {
        move |bet: &mut Bet| {
            bet.opponent = Some(opponent);
            bet.status = BetStatus::Matched;
        }
    }

    pub fn rejects_duplicate_usernames(store: &dyn LedgerStore) {
        profile(store, "Shooter", 100);
        let dup = Profile::new("sub-other".into(), "shooter".into(), None, 100);
        assert!(matches!(store.insert_profile(&dup), Err(StoreError::UsernameTaken(_))));

        let same_subject = Profile::new("sub-Shooter".into(), "another".into(), None, 100);
        assert!(matches!(
            store.insert_profile(&same_subject),
            Err(StoreError::SubjectTaken(_))
        ));
    }

    pub fn looks_up_by_subject(store: &dyn LedgerStore) {
        let alice = profile(store, "alice", 500);
        let found = store.profile_by_subject("sub-alice").unwrap().unwrap();
        assert_eq!(found, alice);
        assert!(store.profile_by_subject("sub-nobody").unwrap().is_none());
    }

    pub fn swap_guards_on_status(store: &dyn LedgerStore) {
        let alice = profile(store, "alice", 500);
        let carol = profile(store, "carol", 200);
        let bet = open_bet(store, &alice, 100);

        let matched = store.swap_bet(bet.id, BetStatus::Open, &match_with(carol.id)).unwrap();
        assert_eq!(matched.status, BetStatus::Matched);
        assert_eq!(matched.opponent, Some(carol.id));

        let again = store.swap_bet(bet.id, BetStatus::Open, &match_with(alice.id));
        match again {
            Err(StoreError::StatusMismatch { actual, .. }) => assert_eq!(actual, BetStatus::Matched),
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert_eq!(store.bet(bet.id).unwrap().unwrap().opponent, Some(carol.id));

        assert!(matches!(
            store.swap_bet(Uuid::new_v4(), BetStatus::Open, &match_with(carol.id)),
            Err(StoreError::NotFound(_))
        ));
    }

    pub fn concurrent_swaps_have_one_winner(store: Arc<dyn LedgerStore>) {
        let alice = profile(store.as_ref(), "alice", 500);
        let bet_id = open_bet(store.as_ref(), &alice, 100).id;

        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let opponent = Uuid::new_v4();
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .swap_bet(bet_id, BetStatus::Open, &match_with(opponent))
                        .map(|_| opponent)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<Uuid> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StoreError::StatusMismatch { .. }))));

        let stored = store.bet(bet_id).unwrap().unwrap();
        assert_eq!(stored.opponent, Some(winners[0]));
    }

    pub fn settles_atomically(store: &dyn LedgerStore) {
        let alice = profile(store, "alice", 500);
        let carol = profile(store, "carol", 200);
        let bet = open_bet(store, &alice, 100);
        store.swap_bet(bet.id, BetStatus::Open, &match_with(carol.id)).unwrap();

        let settled = store
            .settle(&Settlement { bet_id: bet.id, winner: alice.id, at: Utc::now() })
            .unwrap();
        assert_eq!(settled.bet.status, BetStatus::Completed);
        assert_eq!(settled.bet.winner, Some(alice.id));
        assert_eq!(settled.winner.balance, 600);
        assert_eq!(settled.loser.balance, 100);

        let alice = store.profile(alice.id).unwrap().unwrap();
        let carol = store.profile(carol.id).unwrap().unwrap();
        assert_eq!((alice.balance, alice.wins, alice.losses), (600, 1, 0));
        assert_eq!((carol.balance, carol.wins, carol.losses), (100, 0, 1));

        // terminal: a second settlement is refused
        assert!(matches!(
            store.settle(&Settlement { bet_id: bet.id, winner: carol.id, at: Utc::now() }),
            Err(StoreError::StatusMismatch { .. })
        ));
    }

    pub fn settlement_shortfall_changes_nothing(store: &dyn LedgerStore) {
        let alice = profile(store, "alice", 500);
        let dave = profile(store, "dave", 30);
        let bet = open_bet(store, &alice, 100);
        store.swap_bet(bet.id, BetStatus::Open, &match_with(dave.id)).unwrap();

        let result = store.settle(&Settlement { bet_id: bet.id, winner: alice.id, at: Utc::now() });
        assert!(matches!(result, Err(StoreError::Shortfall { required: 100, .. })));

        assert_eq!(store.bet(bet.id).unwrap().unwrap().status, BetStatus::Matched);
        assert_eq!(store.profile(alice.id).unwrap().unwrap().balance, 500);
        assert_eq!(store.profile(dave.id).unwrap().unwrap().balance, 30);
    }

    pub fn queries_filter_and_order(store: &dyn LedgerStore) {
        let alice = profile(store, "alice", 500);
        let base = Utc::now();
        let mut ids = Vec::new();
        for (i, visibility) in [Visibility::Public, Visibility::Friends, Visibility::Public]
            .into_iter()
            .enumerate()
        {
            let mut bet = Bet::new(alice.id, format!("bet {}", i), 10, visibility);
            bet.created_at = base + chrono::Duration::seconds(i as i64);
            store.insert_bet(&bet).unwrap();
            ids.push(bet.id);
        }

        let public: Vec<Uuid> = store
            .query_bets(&BetFilter::public_open())
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(public, vec![ids[2], ids[0]]);

        let mine = store.query_bets(&BetFilter::involving(alice.id)).unwrap();
        assert_eq!(mine.len(), 3);
        assert_eq!(mine[0].id, ids[2]);
        assert!(store.query_bets(&BetFilter::involving(Uuid::new_v4())).unwrap().is_empty());
    }
}
