//! Arena Ledger - peer-to-peer wagering between user profiles
//! Exports all modules for use as a library crate

pub mod app_state;
pub mod auth;
pub mod bookie;
pub mod config;
pub mod errors;
pub mod extract;
pub mod feed;
pub mod handlers;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod registry;
pub mod routes;
pub mod store;

pub use app_state::{AppState, SharedState};
pub use bookie::{upcoming_games, BookieDraft, BookieStep, Game, Team};
pub use config::{Config, ConfigError};
pub use errors::BetError;
pub use feed::{Feed, FeedProjector, MineFeed, MineTab, MyBets};
pub use ledger::ProfileLedger;
pub use lifecycle::BetLifecycle;
pub use models::{Bet, BetCard, BetStatus, Profile, ProfileSummary, Visibility};
pub use notify::{ChangeKind, ChangeNotifier, FeedWatcher, RegistryEvent};
pub use registry::BetRegistry;
pub use routes::build_router;
pub use store::{BetFilter, LedgerStore, MemoryStore, SledStore, StoreError};
