// ============================================================================
// Bookie - spread bets against the upcoming games catalog
// ============================================================================
//
//   team ──▶ spread ──▶ stake ──▶ confirm
//
// A draft only ever produces a CreateBetRequest; posting it is the
// lifecycle's job like any other bet.
//
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::errors::BetError;
use crate::models::{CreateBetRequest, Visibility};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub record: String,
}

impl Team {
    fn new(id: &str, name: &str, short_name: &str, record: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
            record: record.to_string(),
        }
    }

    /// Matches the catalog id, short name or full name, ignoring case
    pub fn answers_to(&self, key: &str) -> bool {
        let key = key.trim();
        self.id.eq_ignore_ascii_case(key)
            || self.short_name.eq_ignore_ascii_case(key)
            || self.name.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Game {
    pub id: String,
    pub home_team: Team,
    pub away_team: Team,
    pub start_time: DateTime<Utc>,
    pub venue: String,
}

impl Game {
    pub fn team(&self, key: &str) -> Option<&Team> {
        [&self.home_team, &self.away_team]
            .into_iter()
            .find(|team| team.answers_to(key))
    }

    pub fn opponent_of(&self, team: &Team) -> &Team {
        if team.id == self.home_team.id {
            &self.away_team
        } else {
            &self.home_team
        }
    }
}

// ===== CATALOG =====

/// Tonight's slate and the next two days, timed from `now`
pub fn upcoming_games(now: DateTime<Utc>) -> Vec<Game> {
    let game = |n: u32, home: Team, away: Team, hours: i64, venue: &str| Game {
        id: format!("game-{}", n),
        home_team: home,
        away_team: away,
        start_time: now + Duration::hours(hours),
        venue: venue.to_string(),
    };

    vec![
        game(
            1,
            Team::new("lakers", "Los Angeles Lakers", "LAL", "32-18"),
            Team::new("warriors", "Golden State Warriors", "GSW", "28-22"),
            2,
            "Crypto.com Arena",
        ),
        game(
            2,
            Team::new("bulls", "Chicago Bulls", "CHI", "24-26"),
            Team::new("heat", "Miami Heat", "MIA", "30-20"),
            4,
            "United Center",
        ),
        game(
            3,
            Team::new("celtics", "Boston Celtics", "BOS", "40-10"),
            Team::new("nets", "Brooklyn Nets", "BKN", "20-30"),
            24,
            "TD Garden",
        ),
        game(
            4,
            Team::new("suns", "Phoenix Suns", "PHX", "33-17"),
            Team::new("nuggets", "Denver Nuggets", "DEN", "35-15"),
            26,
            "Footprint Center",
        ),
        game(
            5,
            Team::new("knicks", "New York Knicks", "NYK", "31-19"),
            Team::new("sixers", "Philadelphia 76ers", "PHI", "29-21"),
            48,
            "Madison Square Garden",
        ),
    ]
}

// ===== DRAFT =====

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookieStep {
    Team,
    Spread,
    Stake,
    Confirm,
}

impl BookieStep {
    pub const ALL: [BookieStep; 4] = [
        BookieStep::Team,
        BookieStep::Spread,
        BookieStep::Stake,
        BookieStep::Confirm,
    ];

    pub fn title(self) -> &'static str {
        match self {
            BookieStep::Team => "Pick Your Team",
            BookieStep::Spread => "Set the Line",
            BookieStep::Stake => "Set Your Stake",
            BookieStep::Confirm => "Confirm Your Bet",
        }
    }

    fn previous(self) -> BookieStep {
        match self {
            BookieStep::Team | BookieStep::Spread => BookieStep::Team,
            BookieStep::Stake => BookieStep::Spread,
            BookieStep::Confirm => BookieStep::Stake,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookieDraft {
    game: Game,
    step: BookieStep,
    team: Option<Team>,
    spread: Option<String>,
    stake: Option<u64>,
}

impl BookieDraft {
    pub fn new(game: Game) -> Self {
        Self {
            game,
            step: BookieStep::Team,
            team: None,
            spread: None,
            stake: None,
        }
    }

    pub fn step(&self) -> BookieStep {
        self.step
    }

    /// (current step number, total steps), 1-based
    pub fn progress(&self) -> (usize, usize) {
        let index = BookieStep::ALL
            .iter()
            .position(|s| *s == self.step)
            .unwrap_or(0);
        (index + 1, BookieStep::ALL.len())
    }

    pub fn pick_team(&mut self, key: &str) -> Result<&Team, BetError> {
        self.expect_step(BookieStep::Team)?;
        let team = self.game.team(key).cloned().ok_or_else(|| {
            BetError::InvalidInput(format!("{} is not playing in {}", key.trim(), self.game.id))
        })?;
        self.step = BookieStep::Spread;
        let team: &Team = self.team.insert(team);
        Ok(team)
    }

    /// Accepts "-5.5", "+3" or "3.5"; a missing sign reads as "+"
    pub fn set_spread(&mut self, raw: &str) -> Result<&str, BetError> {
        self.expect_step(BookieStep::Spread)?;
        let spread = normalize_spread(raw)?;
        self.step = BookieStep::Stake;
        Ok(self.spread.insert(spread).as_str())
    }

    pub fn set_stake(&mut self, amount: i64, balance: u64) -> Result<u64, BetError> {
        self.expect_step(BookieStep::Stake)?;
        if amount <= 0 {
            return Err(BetError::InvalidInput("please enter a valid stake amount".into()));
        }
        let stake = amount as u64;
        if stake > balance {
            return Err(BetError::InsufficientBalance {
                available: balance,
                required: stake,
            });
        }
        self.stake = Some(stake);
        self.step = BookieStep::Confirm;
        Ok(stake)
    }

    /// One step back; a no-op on the first step
    pub fn back(&mut self) {
        self.step = self.step.previous();
    }

    pub fn description(&self) -> Result<String, BetError> {
        let (team, spread, _) = self.picks()?;
        Ok(format!("{} {} vs {}", team.name, spread, self.game.opponent_of(team).name))
    }

    /// Shareable invite for the posted bet
    pub fn challenge_text(&self) -> Result<String, BetError> {
        let (team, spread, stake) = self.picks()?;
        Ok(format!(
            "I bet ${} on {} {}. You in? Join Arena to accept!",
            stake, team.name, spread
        ))
    }

    pub fn confirm(&self) -> Result<CreateBetRequest, BetError> {
        self.expect_step(BookieStep::Confirm)?;
        let (_, _, stake) = self.picks()?;
        Ok(CreateBetRequest {
            description: self.description()?,
            amount: stake as i64,
            visibility: Visibility::Public,
        })
    }

    fn picks(&self) -> Result<(&Team, &str, u64), BetError> {
        match (&self.team, &self.spread, self.stake) {
            (Some(team), Some(spread), Some(stake)) => Ok((team, spread.as_str(), stake)),
            _ => Err(BetError::InvalidInput("the bet slip is not complete".into())),
        }
    }

    fn expect_step(&self, step: BookieStep) -> Result<(), BetError> {
        if self.step != step {
            return Err(BetError::InvalidInput(format!(
                "expected step '{}', draft is at '{}'",
                step.title(),
                self.step.title()
            )));
        }
        Ok(())
    }
}

fn normalize_spread(raw: &str) -> Result<String, BetError> {
    let spread = raw.trim();
    if spread.is_empty() {
        return Err(BetError::InvalidInput("please enter a spread".into()));
    }
    match spread.parse::<f64>() {
        Ok(value) if value.is_finite() => {}
        _ => return Err(BetError::InvalidInput(format!("{} is not a spread", spread))),
    }
    if spread.starts_with('+') || spread.starts_with('-') {
        Ok(spread.to_string())
    } else {
        Ok(format!("+{}", spread))
    }
}
