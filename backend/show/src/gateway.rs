use async_trait::async_trait;

use crate::{
    error::StoreError,
    records::{PredictionSet, StoredPrediction},
};

/// Upsert style persistence of prediction sets.
///
/// A save replaces whatever was stored under the same `(user, episode, version)` key,
/// it never merges. A load returns the most recently submitted version for the
/// `(user, episode)` pair.
#[async_trait]
pub trait PredictionGateway: Send + Sync {
    async fn save_prediction_set(&self, set: &PredictionSet) -> Result<StoredPrediction, StoreError>;

    async fn load_prediction_set(
        &self,
        user_id: &str,
        episode_id: &str,
    ) -> Result<Option<PredictionSet>, StoreError>;
}
