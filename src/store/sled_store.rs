// Persistent ledger store on sled.
//
// Trees:
//   profiles   profile id -> bincode(Profile)
//   bets       bet id     -> bincode(Bet)
//   usernames  lowercased username -> profile id
//   subjects   identity subject    -> profile id
//
// Bet status changes use Tree::compare_and_swap against the exact bytes that
// were read; writes spanning trees run as sled transactions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
    TransactionalTree,
};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    apply_settlement, select, settlement_parties, BetFilter, LedgerStore, SettledBet, Settlement,
    StoreError, StoreResult,
};
use crate::models::{Bet, BetStatus, Profile};

pub struct SledStore {
    db: Db,
    profiles: Tree,
    bets: Tree,
    usernames: Tree,
    subjects: Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), "opened sled ledger store");
        Self::from_db(db)
    }

    /// A throwaway database removed on drop
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            profiles: db.open_tree("profiles")?,
            bets: db.open_tree("bets")?,
            usernames: db.open_tree("usernames")?,
            subjects: db.open_tree("subjects")?,
            db,
        })
    }

    fn load<T: DeserializeOwned>(tree: &Tree, id: Uuid) -> StoreResult<Option<T>> {
        match tree.get(id.as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn abort<T>(err: StoreError) -> ConflictableTransactionResult<T, StoreError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn decode_tx<T: DeserializeOwned>(raw: &[u8]) -> ConflictableTransactionResult<T, StoreError> {
    bincode::deserialize(raw).or_else(|e| abort(StoreError::Codec(e)))
}

fn encode_tx<T: Serialize>(value: &T) -> ConflictableTransactionResult<Vec<u8>, StoreError> {
    bincode::serialize(value).or_else(|e| abort(StoreError::Codec(e)))
}

fn load_tx<T: DeserializeOwned>(
    tree: &TransactionalTree,
    id: Uuid,
    what: &str,
) -> ConflictableTransactionResult<T, StoreError> {
    match tree.get(id.as_bytes())? {
        Some(raw) => decode_tx(&raw),
        None => abort(StoreError::NotFound(format!("{} {}", what, id))),
    }
}

fn from_tx(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Sled(err),
    }
}

fn id_from_bytes(raw: &[u8]) -> StoreResult<Uuid> {
    Uuid::from_slice(raw).map_err(|_| StoreError::NotFound("profile index entry".into()))
}

impl LedgerStore for SledStore {
    fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let value = encode(profile)?;
        let username = profile.username.to_lowercase();
        let id = profile.id.as_bytes();

        (&self.profiles, &self.usernames, &self.subjects)
            .transaction(|(profiles, usernames, subjects)| {
                if usernames.get(username.as_bytes())?.is_some() {
                    return abort(StoreError::UsernameTaken(profile.username.clone()));
                }
                if subjects.get(profile.user_id.as_bytes())?.is_some() {
                    return abort(StoreError::SubjectTaken(profile.user_id.clone()));
                }
                usernames.insert(username.as_bytes(), &id[..])?;
                subjects.insert(profile.user_id.as_bytes(), &id[..])?;
                profiles.insert(&id[..], value.as_slice())?;
                Ok(())
            })
            .map_err(from_tx)
    }

    fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Self::load(&self.profiles, id)
    }

    fn profile_by_subject(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        match self.subjects.get(user_id.as_bytes())? {
            Some(raw) => Self::load(&self.profiles, id_from_bytes(&raw)?),
            None => Ok(None),
        }
    }

    fn insert_bet(&self, bet: &Bet) -> StoreResult<()> {
        self.bets.insert(bet.id.as_bytes(), encode(bet)?)?;
        Ok(())
    }

    fn bet(&self, id: Uuid) -> StoreResult<Option<Bet>> {
        Self::load(&self.bets, id)
    }

    fn query_bets(&self, filter: &BetFilter) -> StoreResult<Vec<Bet>> {
        let mut bets = Vec::new();
        for entry in self.bets.iter() {
            let (_, raw) = entry?;
            bets.push(bincode::deserialize::<Bet>(&raw)?);
        }
        Ok(select(bets.into_iter(), filter))
    }

    fn swap_bet(&self, id: Uuid, expected: BetStatus, update: &dyn Fn(&mut Bet)) -> StoreResult<Bet> {
        let key = id.as_bytes();
        loop {
            let current = self
                .bets
                .get(key)?
                .ok_or_else(|| StoreError::NotFound(format!("bet {}", id)))?;
            let mut bet: Bet = bincode::deserialize(&current)?;
            if bet.status != expected {
                return Err(StoreError::StatusMismatch {
                    id,
                    expected,
                    actual: bet.status,
                });
            }
            update(&mut bet);

            match self.bets.compare_and_swap(key, Some(&current), Some(encode(&bet)?))? {
                Ok(()) => return Ok(bet),
                // another writer got in between; re-read and re-check the guard
                Err(_) => debug!(bet_id = %id, "compare-and-swap lost, retrying"),
            }
        }
    }

    fn settle(&self, settlement: &Settlement) -> StoreResult<SettledBet> {
        (&self.bets, &self.profiles)
            .transaction(|(bets, profiles)| {
                let mut bet: Bet = load_tx(bets, settlement.bet_id, "bet")?;
                let (winner_id, loser_id) = match settlement_parties(&bet, settlement.winner) {
                    Ok(parties) => parties,
                    Err(err) => return abort(err),
                };
                let mut winner: Profile = load_tx(profiles, winner_id, "profile")?;
                let mut loser: Profile = load_tx(profiles, loser_id, "profile")?;

                if let Err(err) = apply_settlement(&mut bet, &mut winner, &mut loser, settlement.at) {
                    return abort(err);
                }

                bets.insert(&bet.id.as_bytes()[..], encode_tx(&bet)?)?;
                profiles.insert(&winner.id.as_bytes()[..], encode_tx(&winner)?)?;
                profiles.insert(&loser.id.as_bytes()[..], encode_tx(&loser)?)?;
                Ok(SettledBet { bet, winner, loser })
            })
            .map_err(from_tx)
    }

    fn flush(&self) -> StoreResult<()> {
        let bytes = self.db.flush()?;
        debug!(bytes, "flushed sled ledger store");
        Ok(())
    }
}
