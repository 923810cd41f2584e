use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    gateway::PredictionGateway,
    records::{
        Episode, OfficialCouple, Participant, PredictionSet, Season, SetKey, StoredPrediction,
        UserProfile, latest_first,
    },
    roster::{self, Roster, RosterProvider},
};

/// Catalog and prediction storage. Implementations double as roster provider and
/// persistence gateway.
#[async_trait]
pub trait Store: RosterProvider + PredictionGateway + Send + Sync {
    /// Newest first.
    async fn list_seasons(&self) -> Result<Vec<Season>, StoreError>;
    async fn get_season(&self, id: &str) -> Result<Option<Season>, StoreError>;
    async fn put_season(&self, season: &Season) -> Result<(), StoreError>;

    /// Ordered by name, inactive participants included.
    async fn list_participants(&self, season_id: Option<&str>) -> Result<Vec<Participant>, StoreError>;
    async fn get_participant(&self, id: &str) -> Result<Option<Participant>, StoreError>;
    async fn put_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    /// Ordered by episode number.
    async fn list_episodes(&self, season_id: Option<&str>) -> Result<Vec<Episode>, StoreError>;
    async fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError>;
    async fn put_episode(&self, episode: &Episode) -> Result<(), StoreError>;

    /// Most recently decided first.
    async fn list_couples(&self, episode_id: Option<&str>) -> Result<Vec<OfficialCouple>, StoreError>;
    async fn put_couple(&self, couple: &OfficialCouple) -> Result<(), StoreError>;
    async fn delete_couple(&self, id: &str) -> Result<Option<OfficialCouple>, StoreError>;

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;
    async fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Most recently submitted first.
    async fn list_predictions(
        &self,
        user_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> Result<Vec<StoredPrediction>, StoreError>;
}

pub fn sort_seasons(seasons: &mut [Season]) {
    seasons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub fn sort_participants(participants: &mut [Participant]) {
    participants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

pub fn sort_episodes(episodes: &mut [Episode]) {
    episodes.sort_by_key(|episode| episode.number);
}

pub fn sort_couples(couples: &mut [OfficialCouple]) {
    couples.sort_by(|a, b| b.decided_at.cmp(&a.decided_at));
}

pub fn matches_filter(value: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|expected| expected == value)
}

#[derive(Default)]
struct Tables {
    seasons: HashMap<String, Season>,
    participants: HashMap<String, Participant>,
    episodes: HashMap<String, Episode>,
    couples: HashMap<String, OfficialCouple>,
    profiles: HashMap<String, UserProfile>,
    predictions: HashMap<SetKey, StoredPrediction>,
}

/// Process local store, used by tests and local runs without Redis.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_seasons(&self) -> Result<Vec<Season>, StoreError> {
        let mut seasons: Vec<Season> = self.tables.read().await.seasons.values().cloned().collect();
        sort_seasons(&mut seasons);

        Ok(seasons)
    }

    async fn get_season(&self, id: &str) -> Result<Option<Season>, StoreError> {
        Ok(self.tables.read().await.seasons.get(id).cloned())
    }

    async fn put_season(&self, season: &Season) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .seasons
            .insert(season.id.clone(), season.clone());

        Ok(())
    }

    async fn list_participants(&self, season_id: Option<&str>) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> = self
            .tables
            .read()
            .await
            .participants
            .values()
            .filter(|participant| matches_filter(&participant.season_id, season_id))
            .cloned()
            .collect();
        sort_participants(&mut participants);

        Ok(participants)
    }

    async fn get_participant(&self, id: &str) -> Result<Option<Participant>, StoreError> {
        Ok(self.tables.read().await.participants.get(id).cloned())
    }

    async fn put_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .participants
            .insert(participant.id.clone(), participant.clone());

        Ok(())
    }

    async fn list_episodes(&self, season_id: Option<&str>) -> Result<Vec<Episode>, StoreError> {
        let mut episodes: Vec<Episode> = self
            .tables
            .read()
            .await
            .episodes
            .values()
            .filter(|episode| matches_filter(&episode.season_id, season_id))
            .cloned()
            .collect();
        sort_episodes(&mut episodes);

        Ok(episodes)
    }

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError> {
        Ok(self.tables.read().await.episodes.get(id).cloned())
    }

    async fn put_episode(&self, episode: &Episode) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .episodes
            .insert(episode.id.clone(), episode.clone());

        Ok(())
    }

    async fn list_couples(&self, episode_id: Option<&str>) -> Result<Vec<OfficialCouple>, StoreError> {
        let mut couples: Vec<OfficialCouple> = self
            .tables
            .read()
            .await
            .couples
            .values()
            .filter(|couple| matches_filter(&couple.episode_id, episode_id))
            .cloned()
            .collect();
        sort_couples(&mut couples);

        Ok(couples)
    }

    async fn put_couple(&self, couple: &OfficialCouple) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .couples
            .insert(couple.id.clone(), couple.clone());

        Ok(())
    }

    async fn delete_couple(&self, id: &str) -> Result<Option<OfficialCouple>, StoreError> {
        Ok(self.tables.write().await.couples.remove(id))
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(id).cloned())
    }

    async fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.id.clone(), profile.clone());

        Ok(())
    }

    async fn list_predictions(
        &self,
        user_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> Result<Vec<StoredPrediction>, StoreError> {
        let mut predictions: Vec<StoredPrediction> = self
            .tables
            .read()
            .await
            .predictions
            .values()
            .filter(|stored| {
                matches_filter(&stored.set.user_id, user_id)
                    && matches_filter(&stored.set.episode_id, episode_id)
            })
            .cloned()
            .collect();
        predictions.sort_by(latest_first);

        Ok(predictions)
    }
}

#[async_trait]
impl PredictionGateway for MemoryStore {
    async fn save_prediction_set(&self, set: &PredictionSet) -> Result<StoredPrediction, StoreError> {
        let stored = StoredPrediction {
            set: set.clone(),
            submitted_at: Utc::now(),
        };

        self.tables
            .write()
            .await
            .predictions
            .insert(set.key(), stored.clone());

        Ok(stored)
    }

    async fn load_prediction_set(
        &self,
        user_id: &str,
        episode_id: &str,
    ) -> Result<Option<PredictionSet>, StoreError> {
        let predictions = self.list_predictions(Some(user_id), Some(episode_id)).await?;

        Ok(predictions.into_iter().next().map(|stored| stored.set))
    }
}

#[async_trait]
impl RosterProvider for MemoryStore {
    async fn get_roster(&self, episode_id: &str) -> Result<Roster, StoreError> {
        roster::resolve(self, episode_id).await
    }
}
