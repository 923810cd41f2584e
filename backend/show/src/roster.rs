use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    error::StoreError,
    records::{Candidate, Episode, OfficialCouple, Participant, Pool},
    store::Store,
};

/// Candidates offered for one episode. Fixed ids are read only input for the builder.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub pool_a: Vec<Candidate>,
    pub pool_b: Vec<Candidate>,
    pub fixed_ids: HashSet<String>,
}

#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn get_roster(&self, episode_id: &str) -> Result<Roster, StoreError>;
}

impl Roster {
    /// Active participants of the episode's season, split by pool and ordered by name.
    /// Members of couples confirmed in earlier episodes of the season are fixed.
    pub fn assemble(
        episode: &Episode,
        season_episodes: &[Episode],
        participants: &[Participant],
        couples: &[OfficialCouple],
    ) -> Self {
        let earlier: HashSet<&str> = season_episodes
            .iter()
            .filter(|other| other.season_id == episode.season_id && other.number < episode.number)
            .map(|other| other.id.as_str())
            .collect();

        let fixed_ids: HashSet<String> = couples
            .iter()
            .filter(|couple| earlier.contains(couple.episode_id.as_str()))
            .flat_map(|couple| [couple.a_id.clone(), couple.b_id.clone()])
            .collect();

        let mut active: Vec<&Participant> = participants
            .iter()
            .filter(|participant| participant.is_active && participant.season_id == episode.season_id)
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));

        let candidates_in = |pool: Pool| -> Vec<Candidate> {
            active
                .iter()
                .filter(|participant| participant.pool == pool)
                .map(|participant| {
                    Candidate::from_participant(participant, fixed_ids.contains(&participant.id))
                })
                .collect()
        };

        let pool_a = candidates_in(Pool::A);
        let pool_b = candidates_in(Pool::B);

        Self {
            pool_a,
            pool_b,
            fixed_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pool_a.is_empty() || self.pool_b.is_empty()
    }
}

/// Roster lookup shared by every [`Store`] implementation.
pub async fn resolve<S: Store + ?Sized>(store: &S, episode_id: &str) -> Result<Roster, StoreError> {
    let episode = store
        .get_episode(episode_id)
        .await?
        .ok_or_else(|| StoreError::not_found("Episode", episode_id))?;

    let season_episodes = store.list_episodes(Some(&episode.season_id)).await?;
    let participants = store.list_participants(Some(&episode.season_id)).await?;
    let couples = store.list_couples(None).await?;

    Ok(Roster::assemble(&episode, &season_episodes, &participants, &couples))
}
