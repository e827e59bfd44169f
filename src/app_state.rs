// Application state management

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::auth::IdentityProvider;
use crate::bookie::{upcoming_games, Game};
use crate::config::Config;
use crate::errors::BetError;
use crate::feed::FeedProjector;
use crate::ledger::ProfileLedger;
use crate::lifecycle::BetLifecycle;
use crate::notify::ChangeNotifier;
use crate::registry::BetRegistry;
use crate::store::{LedgerStore, MemoryStore, SledStore, StoreError};

pub type SharedState = Arc<AppState>;

/// Buffered registry events per subscriber before it is told it lagged
const EVENT_CAPACITY: usize = 256;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LedgerStore>,
    pub ledger: ProfileLedger,
    pub registry: BetRegistry,
    pub lifecycle: BetLifecycle,
    pub feed: FeedProjector,
    pub notifier: ChangeNotifier,
    pub identity: IdentityProvider,
    /// Upcoming games, timed from service start
    pub games: Vec<Game>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn LedgerStore>) -> Self {
        let notifier = ChangeNotifier::new(EVENT_CAPACITY);
        let ledger = ProfileLedger::new(store.clone(), config.starting_balance);
        let registry = BetRegistry::new(store.clone());
        let lifecycle = BetLifecycle::new(ledger.clone(), registry.clone(), notifier.clone());
        let feed = FeedProjector::new(registry.clone(), ledger.clone());
        let identity = IdentityProvider::from_settings(config.supabase.as_ref());

        info!(
            starting_balance = ledger.starting_balance(),
            identity = identity.mode(),
            settlement = config.settlement_key.is_some(),
            "ledger state initialized"
        );

        Self {
            config,
            store,
            ledger,
            registry,
            lifecycle,
            feed,
            notifier,
            identity,
            games: upcoming_games(Utc::now()),
            shutdown: watch::channel(false).0,
        }
    }

    /// sled when a data directory is configured, memory otherwise
    pub fn open(config: Config) -> Result<Self, StoreError> {
        let store: Arc<dyn LedgerStore> = match &config.data_dir {
            Some(dir) => Arc::new(SledStore::open(dir)?),
            None => {
                info!("no ARENA_DATA_DIR set, keeping the ledger in memory");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(config, store))
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    pub fn game(&self, id: &str) -> Result<&Game, BetError> {
        self.games
            .iter()
            .find(|game| game.id == id)
            .ok_or_else(|| BetError::NotFound(format!("game {}", id)))
    }

    /// Ends long-lived responses (the SSE feed) so graceful shutdown can finish
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once shutdown has begun
    pub fn on_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut stop = self.shutdown.subscribe();
        async move {
            let _ = stop.wait_for(|stopping| *stopping).await;
        }
    }

    /// Flush pending writes before shutdown
    pub fn save_to_disk(&self) -> Result<(), StoreError> {
        self.store.flush()
    }
}
