//! # Redis
//!
//! Backing store for the catalog and user predictions.
//!
//! ## Layout
//!
//! One hash per record kind, the record id as field and the JSON encoded record as value.
//!
//! - `seasons`, `participants`, `episodes`, `couples`, `profiles`
//! - `predictions`: field `user:episode:version`, so a save under the same key
//!   overwrites the previous pair list in a single `HSET`
//!
//! ## Notes
//! - The catalog is small (a season has a few dozen participants and episodes), so listing
//!   reads the whole hash and filters in process.
//! - Malformed entries are skipped with a warning when listing and rejected when read directly.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use show::{
    Episode, OfficialCouple, Participant, PredictionGateway, PredictionSet, Roster,
    RosterProvider, Season, Store, StoreError, StoredPrediction, UserProfile,
    records::latest_first,
    roster,
    store::{matches_filter, sort_couples, sort_episodes, sort_participants, sort_seasons},
};
use tracing::warn;

pub const SEASONS: &str = "seasons";
pub const PARTICIPANTS: &str = "participants";
pub const EPISODES: &str = "episodes";
pub const COUPLES: &str = "couples";
pub const PROFILES: &str = "profiles";
pub const PREDICTIONS: &str = "predictions";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}

fn backend(e: RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn prediction_field(user_id: &str, episode_id: &str, version: u32) -> String {
    format!("{user_id}:{episode_id}:{version}")
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        Ok(Self::new(init_redis(redis_url).await?))
    }

    async fn get<T: DeserializeOwned>(&self, hash: &str, id: &str) -> Result<Option<T>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.hget(hash, id).await.map_err(backend)?;

        Ok(raw.map(|raw| serde_json::from_str(&raw)).transpose()?)
    }

    async fn all<T: DeserializeOwned>(&self, hash: &str) -> Result<Vec<T>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: HashMap<String, String> = connection.hgetall(hash).await.map_err(backend)?;

        let records = raw
            .into_iter()
            .filter_map(|(field, value)| match serde_json::from_str(&value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed {hash} entry {field}: {e}");
                    None
                }
            })
            .collect();

        Ok(records)
    }

    async fn put<T: Serialize + Sync>(&self, hash: &str, id: &str, record: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        let mut connection = self.connection.clone();

        let _: () = connection.hset(hash, id, raw).await.map_err(backend)?;

        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn list_seasons(&self) -> Result<Vec<Season>, StoreError> {
        let mut seasons: Vec<Season> = self.all(SEASONS).await?;
        sort_seasons(&mut seasons);

        Ok(seasons)
    }

    async fn get_season(&self, id: &str) -> Result<Option<Season>, StoreError> {
        self.get(SEASONS, id).await
    }

    async fn put_season(&self, season: &Season) -> Result<(), StoreError> {
        self.put(SEASONS, &season.id, season).await
    }

    async fn list_participants(&self, season_id: Option<&str>) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> = self.all(PARTICIPANTS).await?;
        participants.retain(|participant| matches_filter(&participant.season_id, season_id));
        sort_participants(&mut participants);

        Ok(participants)
    }

    async fn get_participant(&self, id: &str) -> Result<Option<Participant>, StoreError> {
        self.get(PARTICIPANTS, id).await
    }

    async fn put_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.put(PARTICIPANTS, &participant.id, participant).await
    }

    async fn list_episodes(&self, season_id: Option<&str>) -> Result<Vec<Episode>, StoreError> {
        let mut episodes: Vec<Episode> = self.all(EPISODES).await?;
        episodes.retain(|episode| matches_filter(&episode.season_id, season_id));
        sort_episodes(&mut episodes);

        Ok(episodes)
    }

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError> {
        self.get(EPISODES, id).await
    }

    async fn put_episode(&self, episode: &Episode) -> Result<(), StoreError> {
        self.put(EPISODES, &episode.id, episode).await
    }

    async fn list_couples(&self, episode_id: Option<&str>) -> Result<Vec<OfficialCouple>, StoreError> {
        let mut couples: Vec<OfficialCouple> = self.all(COUPLES).await?;
        couples.retain(|couple| matches_filter(&couple.episode_id, episode_id));
        sort_couples(&mut couples);

        Ok(couples)
    }

    async fn put_couple(&self, couple: &OfficialCouple) -> Result<(), StoreError> {
        self.put(COUPLES, &couple.id, couple).await
    }

    async fn delete_couple(&self, id: &str) -> Result<Option<OfficialCouple>, StoreError> {
        let Some(couple) = self.get::<OfficialCouple>(COUPLES, id).await? else {
            return Ok(None);
        };

        let mut connection = self.connection.clone();
        let _: () = connection.hdel(COUPLES, id).await.map_err(backend)?;

        Ok(Some(couple))
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.get(PROFILES, id).await
    }

    async fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.put(PROFILES, &profile.id, profile).await
    }

    async fn list_predictions(
        &self,
        user_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> Result<Vec<StoredPrediction>, StoreError> {
        let mut predictions: Vec<StoredPrediction> = self.all(PREDICTIONS).await?;
        predictions.retain(|stored| {
            matches_filter(&stored.set.user_id, user_id)
                && matches_filter(&stored.set.episode_id, episode_id)
        });
        predictions.sort_by(latest_first);

        Ok(predictions)
    }
}

#[async_trait]
impl PredictionGateway for RedisStore {
    async fn save_prediction_set(&self, set: &PredictionSet) -> Result<StoredPrediction, StoreError> {
        let stored = StoredPrediction {
            set: set.clone(),
            submitted_at: Utc::now(),
        };
        let field = prediction_field(&set.user_id, &set.episode_id, set.version);

        self.put(PREDICTIONS, &field, &stored).await?;

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
impl RosterProvider for RedisStore {
    async fn get_roster(&self, episode_id: &str) -> Result<Roster, StoreError> {
        roster::resolve(self, episode_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::prediction_field;

    #[test]
    fn test_prediction_field_is_per_version() {
        assert_eq!(prediction_field("u1", "e1", 1), "u1:e1:1");
        assert_ne!(prediction_field("u1", "e1", 1), prediction_field("u1", "e1", 2));
    }
}
