// Data models for the Arena wagering ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Longest bet description accepted, in characters
pub const MAX_DESCRIPTION_LEN: usize = 280;

/// Username length bounds enforced at registration
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 20;

// ============================================================================
// BET STATUS & VISIBILITY
// ============================================================================

/// Lifecycle state of a bet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Open,
    Matched,
    Completed,
    Cancelled,
}

impl BetStatus {
    /// The only edges of the lifecycle graph: open→matched, open→cancelled, matched→completed
    pub fn can_transition_to(self, next: BetStatus) -> bool {
        matches!(
            (self, next),
            (BetStatus::Open, BetStatus::Matched)
                | (BetStatus::Open, BetStatus::Cancelled)
                | (BetStatus::Matched, BetStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BetStatus::Completed | BetStatus::Cancelled)
    }

    /// Open and matched bets show up under the "active" tab
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BetStatus::Open => "open",
            BetStatus::Matched => "matched",
            BetStatus::Completed => "completed",
            BetStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who can see a bet in the public feed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Friends,
}

// ============================================================================
// PROFILE
// ============================================================================

/// A user's persistent identity, wallet balance and win/loss record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    /// Subject id issued by the identity provider
    pub user_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub balance: u64,
    pub wins: u64,
    pub losses: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: String, username: String, avatar: Option<String>, balance: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            username,
            avatar,
            balance,
            wins: 0,
            losses: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn games_played(&self) -> u64 {
        self.wins + self.losses
    }

    /// Rounded win percentage, 0 before the first settled bet
    pub fn win_rate(&self) -> u32 {
        let played = self.games_played();
        if played == 0 {
            return 0;
        }
        ((self.wins as f64 / played as f64) * 100.0).round() as u32
    }
}

// ============================================================================
// BET
// ============================================================================

/// A wager between a creator and (once matched) a single opponent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    pub id: Uuid,
    pub creator: Uuid,
    pub opponent: Option<Uuid>,
    pub description: String,
    pub amount: u64,
    pub status: BetStatus,
    pub winner: Option<Uuid>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bet {
    pub fn new(creator: Uuid, description: String, amount: u64, visibility: Visibility) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator,
            opponent: None,
            description,
            amount,
            status: BetStatus::Open,
            winner: None,
            visibility,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `profile` is the creator or the opponent
    pub fn involves(&self, profile: Uuid) -> bool {
        self.creator == profile || self.opponent == Some(profile)
    }

    /// The other party of a matched bet, or None if `profile` is not a party
    pub fn counterparty(&self, profile: Uuid) -> Option<Uuid> {
        if profile == self.creator {
            self.opponent
        } else if self.opponent == Some(profile) {
            Some(self.creator)
        } else {
            None
        }
    }

    /// Feed order: newest first, ties broken by id so the order is total
    pub fn newest_first(a: &Bet, b: &Bet) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

// ============================================================================
// VIEWS
// ============================================================================

/// The slice of a profile shown next to a bet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub wins: u64,
    pub losses: u64,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            avatar: profile.avatar.clone(),
            wins: profile.wins,
            losses: profile.losses,
        }
    }
}

/// A bet joined with its parties, as rendered in feeds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetCard {
    #[serde(flatten)]
    pub bet: Bet,
    #[serde(rename = "creator_profile")]
    pub creator: ProfileSummary,
    #[serde(rename = "opponent_profile")]
    pub opponent: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub games_played: u64,
    pub win_rate: u32,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            games_played: profile.games_played(),
            win_rate: profile.win_rate(),
            profile,
        }
    }
}

// Request/Response structs

/// POST /bets request body
///
/// `amount` is signed so that negative stakes reach validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBetRequest {
    pub description: String,
    pub amount: i64,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    pub winner: Uuid,
}

/// POST /games/:id/bets request body
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadBetRequest {
    pub team: String,
    pub spread: String,
    pub stake: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
