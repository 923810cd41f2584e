//! One user's editing session for one episode.
//!
//! Transitions take the builder lock briefly. A save snapshots the pairs, then awaits the
//! gateway without holding the builder, so edits made meanwhile land in the next save.
//! Overlapping saves queue on `save_lock` and complete in order.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    builder::{Activation, BuilderView, PredictionBuilder},
    error::BuilderError,
    gateway::PredictionGateway,
    records::{Pairing, SetKey, StoredPrediction},
    roster::RosterProvider,
};

pub struct Session {
    key: SetKey,
    builder: Mutex<PredictionBuilder>,
    save_lock: Mutex<()>,
    last_touched: std::sync::Mutex<Instant>,
}

/// Result of opening a session.
pub struct Opened {
    pub session: Session,
    pub restored: usize,
    pub load_error: Option<BuilderError>,
}

impl Session {
    /// Builds the roster and restores the latest stored prediction. A failed load falls back
    /// to an empty prediction instead of blocking the user.
    pub async fn open<R, G>(roster: &R, gateway: &G, key: SetKey) -> Result<Opened, BuilderError>
    where
        R: RosterProvider + ?Sized,
        G: PredictionGateway + ?Sized,
    {
        let roster = roster.get_roster(&key.episode_id).await?;
        let mut builder = PredictionBuilder::new(roster)?;

        let (restored, load_error) = match gateway
            .load_prediction_set(&key.user_id, &key.episode_id)
            .await
        {
            Ok(Some(previous)) => (builder.restore(previous.pairs), None),
            Ok(None) => (0, None),
            Err(e) => {
                warn!(
                    "Failed to load prediction for {} on {}: {e}",
                    key.user_id, key.episode_id
                );
                (0, Some(BuilderError::LoadFailed(e.to_string())))
            }
        };

        Ok(Opened {
            session: Self {
                key,
                builder: Mutex::new(builder),
                save_lock: Mutex::new(()),
                last_touched: std::sync::Mutex::new(Instant::now()),
            },
            restored,
            load_error,
        })
    }

    pub fn key(&self) -> &SetKey {
        &self.key
    }

    fn touch(&self) {
        let mut last_touched = self
            .last_touched
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last_touched = Instant::now();
    }

    pub fn idle_since(&self) -> Instant {
        *self
            .last_touched
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub async fn activate(&self, id: &str) -> Activation {
        self.touch();
        self.builder.lock().await.activate(id)
    }

    pub async fn unpair(&self, id: &str) -> Option<Pairing> {
        self.touch();
        self.builder.lock().await.unpair(id)
    }

    pub async fn reset(&self) {
        self.touch();
        self.builder.lock().await.reset();
    }

    pub async fn view(&self) -> BuilderView {
        self.builder.lock().await.view(Instant::now())
    }

    pub async fn save<G>(&self, gateway: &G) -> Result<StoredPrediction, BuilderError>
    where
        G: PredictionGateway + ?Sized,
    {
        self.touch();
        let _queued = self.save_lock.lock().await;

        let set = self.builder.lock().await.prediction_set(&self.key);
        if set.pairs.is_empty() {
            return Err(BuilderError::EmptyPrediction);
        }

        match gateway.save_prediction_set(&set).await {
            Ok(stored) => {
                info!(
                    "Saved {} pairs for {} on {} (v{})",
                    stored.set.pairs.len(),
                    self.key.user_id,
                    self.key.episode_id,
                    self.key.version
                );
                self.builder.lock().await.mark_saved(Instant::now());

                Ok(stored)
            }
            Err(e) => Err(BuilderError::SaveFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        error::StoreError,
        records::{Candidate, Pool, PredictionSet},
        roster::Roster,
        store::MemoryStore,
    };

    struct FixedRoster(Roster);

    #[async_trait]
    impl RosterProvider for FixedRoster {
        async fn get_roster(&self, _episode_id: &str) -> Result<Roster, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn roster(a: &[&str], b: &[&str], fixed: &[&str]) -> FixedRoster {
        let candidate = |id: &&str, pool| Candidate {
            id: id.to_string(),
            pool,
            fixed: false,
            display_name: id.to_string(),
        };

        FixedRoster(Roster {
            pool_a: a.iter().map(|id| candidate(id, Pool::A)).collect(),
            pool_b: b.iter().map(|id| candidate(id, Pool::B)).collect(),
            fixed_ids: fixed.iter().map(|id| id.to_string()).collect::<HashSet<_>>(),
        })
    }

    /// Gateway that fails on demand and can hold a save open until released.
    #[derive(Default)]
    struct FlakyGateway {
        inner: MemoryStore,
        failing: AtomicBool,
        hold: Option<Arc<Notify>>,
        entered: Arc<Notify>,
    }

    #[async_trait]
    impl PredictionGateway for FlakyGateway {
        async fn save_prediction_set(&self, set: &PredictionSet) -> Result<StoredPrediction, StoreError> {
            self.entered.notify_one();
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("connection refused".to_string()));
            }

            self.inner.save_prediction_set(set).await
        }

        async fn load_prediction_set(
            &self,
            user_id: &str,
            episode_id: &str,
        ) -> Result<Option<PredictionSet>, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("connection refused".to_string()));
            }

            self.inner.load_prediction_set(user_id, episode_id).await
        }
    }

    fn key() -> SetKey {
        SetKey::new("u1", "e1", 1)
    }

    #[tokio::test]
    async fn test_save_then_reload_round_trip() {
        let roster = roster(&["m1", "m2"], &["f1", "f2"], &[]);
        let store = MemoryStore::new();

        let opened = Session::open(&roster, &store, key()).await.unwrap();
        let session = opened.session;
        session.activate("m2").await;
        session.activate("f1").await;
        session.activate("f2").await;
        session.activate("m1").await;
        let saved = session.save(&store).await.unwrap();

        let reopened = Session::open(&roster, &store, key()).await.unwrap();

        assert_eq!(reopened.restored, 2);
        assert_eq!(reopened.session.view().await.pairs, saved.set.pairs);
        assert_eq!(
            saved.set.pairs,
            vec![Pairing::new("m2", "f1"), Pairing::new("m1", "f2")]
        );
    }

    #[tokio::test]
    async fn test_save_does_not_clear_pairs() {
        let roster = roster(&["m1"], &["f1"], &[]);
        let store = MemoryStore::new();

        let session = Session::open(&roster, &store, key()).await.unwrap().session;
        session.activate("m1").await;
        session.activate("f1").await;
        session.save(&store).await.unwrap();

        let view = session.view().await;
        assert_eq!(view.pairs, vec![Pairing::new("m1", "f1")]);
        assert!(view.saved);
    }

    #[tokio::test]
    async fn test_empty_prediction_not_saved() {
        let roster = roster(&["m1"], &["f1"], &[]);
        let store = MemoryStore::new();

        let session = Session::open(&roster, &store, key()).await.unwrap().session;

        assert!(matches!(
            session.save(&store).await,
            Err(BuilderError::EmptyPrediction)
        ));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_state() {
        let roster = roster(&["m1"], &["f1"], &[]);
        let gateway = FlakyGateway::default();

        let session = Session::open(&roster, &gateway, key()).await.unwrap().session;
        session.activate("m1").await;
        session.activate("f1").await;

        gateway.failing.store(true, Ordering::SeqCst);
        let result = session.save(&gateway).await;

        assert!(matches!(result, Err(BuilderError::SaveFailed(_))));
        let view = session.view().await;
        assert_eq!(view.pairs, vec![Pairing::new("m1", "f1")]);
        assert!(!view.saved);

        gateway.failing.store(false, Ordering::SeqCst);
        assert!(session.save(&gateway).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_load_falls_back_to_empty() {
        let roster = roster(&["m1"], &["f1"], &[]);
        let gateway = FlakyGateway::default();
        gateway.failing.store(true, Ordering::SeqCst);

        let opened = Session::open(&roster, &gateway, key()).await.unwrap();

        assert!(matches!(opened.load_error, Some(BuilderError::LoadFailed(_))));
        assert!(opened.session.view().await.pairs.is_empty());
    }

    #[tokio::test]
    async fn test_empty_roster_rejected() {
        let roster = roster(&["m1"], &[], &[]);
        let store = MemoryStore::new();

        assert!(matches!(
            Session::open(&roster, &store, key()).await,
            Err(BuilderError::EmptyRoster)
        ));
    }

    #[tokio::test]
    async fn test_edits_during_save_land_in_next_save() {
        let roster = roster(&["m1", "m2"], &["f1", "f2"], &[]);
        let hold = Arc::new(Notify::new());
        let gateway = Arc::new(FlakyGateway {
            hold: Some(hold.clone()),
            ..FlakyGateway::default()
        });

        let session = Arc::new(
            Session::open(&roster, gateway.as_ref(), key())
                .await
                .unwrap()
                .session,
        );
        session.activate("m1").await;
        session.activate("f1").await;

        let in_flight = {
            let session = session.clone();
            let saving_gateway = gateway.clone();
            tokio::spawn(async move { session.save(saving_gateway.as_ref()).await })
        };

        gateway.entered.notified().await;
        session.activate("m2").await;
        session.activate("f2").await;
        hold.notify_one();

        let first = in_flight.await.unwrap().unwrap();
        assert_eq!(first.set.pairs, vec![Pairing::new("m1", "f1")]);

        let second = {
            let session = session.clone();
            let saving_gateway = gateway.clone();
            let save = tokio::spawn(async move { session.save(saving_gateway.as_ref()).await });
            gateway.entered.notified().await;
            hold.notify_one();
            save.await.unwrap().unwrap()
        };
        assert_eq!(
            second.set.pairs,
            vec![Pairing::new("m1", "f1"), Pairing::new("m2", "f2")]
        );

        let stored = gateway.inner.load_prediction_set("u1", "e1").await.unwrap().unwrap();
        assert_eq!(stored.pairs.len(), 2);
    }
}
