// ============================================================================
// Feed Projector - read-only views over the bet registry
// ============================================================================
//
// Public feed: status == open AND visibility == public, newest first
// Mine feed:   creator == profile OR opponent == profile, newest first
//              active  = open | matched
//              history = completed | cancelled
//
// Nothing here is cached. Each read re-queries the registry, so a view is
// always replaced wholesale rather than patched.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::BetError;
use crate::ledger::ProfileLedger;
use crate::models::{Bet, BetCard, BetStatus, ProfileSummary};
use crate::registry::BetRegistry;
use crate::store::BetFilter;

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// Clamp a requested page size into 1..=MAX_PAGE_LIMIT
pub fn page_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// A query over the registry. Nothing runs until it is iterated, and every
/// `iter()` starts over from a fresh read.
#[derive(Clone)]
pub struct Feed {
    registry: BetRegistry,
    filter: BetFilter,
}

impl Feed {
    fn new(registry: BetRegistry, filter: BetFilter) -> Self {
        Self { registry, filter }
    }

    pub fn iter(&self) -> Result<std::vec::IntoIter<Bet>, BetError> {
        Ok(self.registry.query(&self.filter)?.into_iter())
    }

    pub fn page(&self, offset: usize, limit: usize) -> Result<Vec<Bet>, BetError> {
        Ok(self.iter()?.skip(offset).take(limit).collect())
    }
}

/// Tabs of the "my bets" screen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MineTab {
    #[default]
    Active,
    History,
}

impl MineTab {
    pub fn includes(self, status: BetStatus) -> bool {
        match self {
            MineTab::Active => status.is_active(),
            MineTab::History => status.is_terminal(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MyBets {
    pub active: Vec<Bet>,
    pub history: Vec<Bet>,
}

#[derive(Clone)]
pub struct MineFeed {
    feed: Feed,
}

impl MineFeed {
    pub fn all(&self) -> Result<Vec<Bet>, BetError> {
        Ok(self.feed.iter()?.collect())
    }

    /// Both tabs from a single read
    pub fn partition(&self) -> Result<MyBets, BetError> {
        let (active, history) = self
            .feed
            .iter()?
            .partition(|bet| MineTab::Active.includes(bet.status));
        Ok(MyBets { active, history })
    }

    pub fn tab(&self, tab: MineTab) -> Result<Vec<Bet>, BetError> {
        Ok(self.feed.iter()?.filter(|bet| tab.includes(bet.status)).collect())
    }
}

#[derive(Clone)]
pub struct FeedProjector {
    registry: BetRegistry,
    ledger: ProfileLedger,
}

impl FeedProjector {
    pub fn new(registry: BetRegistry, ledger: ProfileLedger) -> Self {
        Self { registry, ledger }
    }

    pub fn public_feed(&self) -> Feed {
        Feed::new(self.registry.clone(), BetFilter::public_open())
    }

    pub fn mine_feed(&self, profile: Uuid) -> MineFeed {
        MineFeed {
            feed: Feed::new(self.registry.clone(), BetFilter::involving(profile)),
        }
    }

    /// Public feed page joined with the parties' profiles.
    /// `limit: None` returns everything after `offset`.
    pub fn public_cards(&self, offset: usize, limit: Option<usize>) -> Result<Vec<BetCard>, BetError> {
        let feed = self.public_feed();
        let bets = match limit {
            Some(limit) => feed.page(offset, limit)?,
            None => feed.iter()?.skip(offset).collect(),
        };
        self.cards(bets)
    }

    pub fn mine_cards(&self, profile: Uuid, tab: MineTab) -> Result<Vec<BetCard>, BetError> {
        let bets = self.mine_feed(profile).tab(tab)?;
        self.cards(bets)
    }

    pub fn card(&self, bet: Bet) -> Result<BetCard, BetError> {
        let creator = ProfileSummary::from(&self.ledger.get(bet.creator)?);
        let opponent = match bet.opponent {
            Some(id) => Some(ProfileSummary::from(&self.ledger.get(id)?)),
            None => None,
        };
        Ok(BetCard { bet, creator, opponent })
    }

    /// Joins profiles, loading each one at most once per call
    pub fn cards(&self, bets: Vec<Bet>) -> Result<Vec<BetCard>, BetError> {
        let mut seen: HashMap<Uuid, ProfileSummary> = HashMap::new();
        let mut summary = |id: Uuid| -> Result<ProfileSummary, BetError> {
            if let Some(found) = seen.get(&id) {
                return Ok(found.clone());
            }
            let loaded = ProfileSummary::from(&self.ledger.get(id)?);
            seen.insert(id, loaded.clone());
            Ok(loaded)
        };

        let mut cards = Vec::with_capacity(bets.len());
        for bet in bets {
            let creator = summary(bet.creator)?;
            let opponent = match bet.opponent {
                Some(id) => Some(summary(id)?),
                None => None,
            };
            cards.push(BetCard { bet, creator, opponent });
        }
        Ok(cards)
    }
}
