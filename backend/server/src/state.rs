use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use show::{
    MemoryStore, Session, Store,
    scoring::{ExactMatch, PairMatcher},
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::{config::Config, database::RedisStore};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MEMORY_STORE: &str = "memory";

/// Sessions are keyed by `(user, episode)`.
pub type SessionKey = (String, String);

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub matcher: Arc<dyn PairMatcher>,
    pub sessions: DashMap<SessionKey, Arc<Session>>,
}

impl AppState {
    /// `REDIS_URL=memory` runs on a process local store that is lost on restart.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        if config.redis_url == MEMORY_STORE {
            warn!("Using the in-memory store, nothing will be persisted");
            return Ok(Self::with_store(config, Arc::new(MemoryStore::new())));
        }

        let store = RedisStore::connect(&config.redis_url).await?;
        info!("Connected to Redis at {}", config.redis_url);

        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            matcher: Arc::new(ExactMatch),
            sessions: DashMap::new(),
        })
    }

    pub fn session(&self, user_id: &str, episode_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(&(user_id.to_string(), episode_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Drops sessions untouched for longer than the configured idle time.
    pub fn sweep_sessions(&self) -> usize {
        let before = self.sessions.len();
        let idle = self.config.session_idle;

        self.sessions
            .retain(|_, session| session.idle_since().elapsed() < idle);

        before.saturating_sub(self.sessions.len())
    }
}

pub fn spawn_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let evicted = state.sweep_sessions();
            if evicted > 0 {
                debug!("Evicted {evicted} idle prediction sessions");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use show::{EpisodeStatus, Pool, SetKey};

    use super::*;
    use crate::{
        admin::{self, NewEpisode, NewParticipant, NewSeason},
        config::test_config,
    };

    async fn open_session(state: &AppState) -> Session {
        let store = &*state.store;
        let season = admin::create_season(
            store,
            NewSeason {
                title: "Season 1".to_string(),
                code: "s1".to_string(),
                start_date: None,
                end_date: None,
                is_active: true,
            },
        )
        .await
        .unwrap();

        for (name, pool) in [("A1", Pool::A), ("B1", Pool::B)] {
            admin::create_participant(
                store,
                NewParticipant {
                    name: name.to_string(),
                    pool,
                    image_url: None,
                    season_id: season.id.clone(),
                },
            )
            .await
            .unwrap();
        }

        let episode = admin::create_episode(
            store,
            NewEpisode {
                season_id: season.id,
                number: 1,
                title: None,
                open_at: None,
                close_at: None,
                status: EpisodeStatus::Open,
            },
        )
        .await
        .unwrap();

        Session::open(store, store, SetKey::new("u1", &episode.id, 1))
            .await
            .unwrap()
            .session
    }

    #[tokio::test]
    async fn test_memory_store_from_config() {
        let mut config = test_config();
        config.redis_url = MEMORY_STORE.to_string();

        let state = AppState::new(config).await.unwrap();

        assert!(state.store.list_seasons().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_sessions() {
        let state = AppState::with_store(test_config(), Arc::new(MemoryStore::new()));
        let session = open_session(&state).await;
        let episode_id = session.key().episode_id.clone();
        state
            .sessions
            .insert(("u1".to_string(), episode_id.clone()), Arc::new(session));

        assert_eq!(state.sweep_sessions(), 0);
        assert!(state.session("u1", &episode_id).is_some());
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_sessions() {
        let mut config = test_config();
        config.session_idle = Duration::ZERO;
        let state = AppState::with_store(config, Arc::new(MemoryStore::new()));
        let session = open_session(&state).await;
        let episode_id = session.key().episode_id.clone();
        state
            .sessions
            .insert(("u1".to_string(), episode_id.clone()), Arc::new(session));

        assert_eq!(state.sweep_sessions(), 1);
        assert!(state.session("u1", &episode_id).is_none());
    }
}
