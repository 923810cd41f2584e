//! Catalog management shared by the admin routes and the admin CLI.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use show::{
    Episode, EpisodeStatus, OfficialCouple, Participant, Pool, Role, Season, Store, UserProfile,
    records::new_id,
};
use tracing::info;

use crate::error::AppError;

fn default_true() -> bool {
    true
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(AppError::MalformedPayload(format!("{field} must not be empty")));
    }

    Ok(trimmed.to_string())
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewSeason {
    pub title: String,
    pub code: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPatch {
    pub title: Option<String>,
    pub code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewParticipant {
    pub name: String,
    pub pool: Pool,
    pub image_url: Option<String>,
    pub season_id: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPatch {
    pub name: Option<String>,
    pub pool: Option<Pool>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewEpisode {
    pub season_id: String,
    pub number: u32,
    pub title: Option<String>,
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EpisodeStatus,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EpisodePatch {
    pub number: Option<u32>,
    pub title: Option<String>,
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    pub status: Option<EpisodeStatus>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewCouple {
    pub episode_id: String,
    pub a_id: String,
    pub b_id: String,
}

fn check_window(open_at: Option<DateTime<Utc>>, close_at: Option<DateTime<Utc>>) -> Result<(), AppError> {
    match (open_at, close_at) {
        (Some(open_at), Some(close_at)) if close_at <= open_at => Err(AppError::MalformedPayload(
            "closeAt must be after openAt".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn season_exists(store: &dyn Store, season_id: &str) -> Result<(), AppError> {
    store
        .get_season(season_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Season", season_id))
}

pub async fn create_season(store: &dyn Store, new: NewSeason) -> Result<Season, AppError> {
    let season = Season {
        id: new_id(),
        title: required("title", &new.title)?,
        code: required("code", &new.code)?,
        start_date: new.start_date,
        end_date: new.end_date,
        is_active: new.is_active,
        created_at: Utc::now(),
    };

    store.put_season(&season).await?;
    info!("Created season {} ({})", season.code, season.id);

    Ok(season)
}

pub async fn update_season(store: &dyn Store, id: &str, patch: SeasonPatch) -> Result<Season, AppError> {
    let mut season = store
        .get_season(id)
        .await?
        .ok_or_else(|| AppError::not_found("Season", id))?;

    if let Some(title) = patch.title {
        season.title = required("title", &title)?;
    }
    if let Some(code) = patch.code {
        season.code = required("code", &code)?;
    }
    season.start_date = patch.start_date.or(season.start_date);
    season.end_date = patch.end_date.or(season.end_date);
    season.is_active = patch.is_active.unwrap_or(season.is_active);

    store.put_season(&season).await?;

    Ok(season)
}

pub async fn create_participant(store: &dyn Store, new: NewParticipant) -> Result<Participant, AppError> {
    season_exists(store, &new.season_id).await?;

    let participant = Participant {
        id: new_id(),
        name: required("name", &new.name)?,
        pool: new.pool,
        image_url: new.image_url.filter(|url| !url.trim().is_empty()),
        season_id: new.season_id,
        is_active: true,
        created_at: Utc::now(),
    };

    store.put_participant(&participant).await?;
    info!("Added {} to season {}", participant.name, participant.season_id);

    Ok(participant)
}

pub async fn update_participant(
    store: &dyn Store,
    id: &str,
    patch: ParticipantPatch,
) -> Result<Participant, AppError> {
    let mut participant = store
        .get_participant(id)
        .await?
        .ok_or_else(|| AppError::not_found("Participant", id))?;

    if let Some(name) = patch.name {
        participant.name = required("name", &name)?;
    }
    participant.pool = patch.pool.unwrap_or(participant.pool);
    if let Some(image_url) = patch.image_url {
        participant.image_url = Some(image_url).filter(|url| !url.trim().is_empty());
    }
    participant.is_active = patch.is_active.unwrap_or(participant.is_active);

    store.put_participant(&participant).await?;

    Ok(participant)
}

/// Soft delete, the participant stays referenced by stored predictions.
pub async fn deactivate_participant(store: &dyn Store, id: &str) -> Result<Participant, AppError> {
    update_participant(
        store,
        id,
        ParticipantPatch {
            is_active: Some(false),
            ..ParticipantPatch::default()
        },
    )
    .await
}

async fn check_unique_number(
    store: &dyn Store,
    season_id: &str,
    number: u32,
    except_id: Option<&str>,
) -> Result<(), AppError> {
    let taken = store
        .list_episodes(Some(season_id))
        .await?
        .iter()
        .any(|episode| episode.number == number && Some(episode.id.as_str()) != except_id);

    if taken {
        return Err(AppError::MalformedPayload(format!(
            "Episode {number} already exists in season {season_id}"
        )));
    }

    Ok(())
}

pub async fn create_episode(store: &dyn Store, new: NewEpisode) -> Result<Episode, AppError> {
    season_exists(store, &new.season_id).await?;
    check_window(new.open_at, new.close_at)?;
    check_unique_number(store, &new.season_id, new.number, None).await?;

    let episode = Episode {
        id: new_id(),
        season_id: new.season_id,
        number: new.number,
        title: new.title.filter(|title| !title.trim().is_empty()),
        open_at: new.open_at,
        close_at: new.close_at,
        status: new.status,
        created_at: Utc::now(),
    };

    store.put_episode(&episode).await?;
    info!("Created episode {} of season {}", episode.number, episode.season_id);

    Ok(episode)
}

pub async fn update_episode(store: &dyn Store, id: &str, patch: EpisodePatch) -> Result<Episode, AppError> {
    let mut episode = store
        .get_episode(id)
        .await?
        .ok_or_else(|| AppError::not_found("Episode", id))?;

    if let Some(number) = patch.number {
        check_unique_number(store, &episode.season_id, number, Some(id)).await?;
        episode.number = number;
    }
    if let Some(title) = patch.title {
        episode.title = Some(title).filter(|title| !title.trim().is_empty());
    }
    episode.open_at = patch.open_at.or(episode.open_at);
    episode.close_at = patch.close_at.or(episode.close_at);
    check_window(episode.open_at, episode.close_at)?;

    if let Some(status) = patch.status {
        info!("Episode {} status {:?} -> {:?}", episode.id, episode.status, status);
        episode.status = status;
    }

    store.put_episode(&episode).await?;

    Ok(episode)
}

pub async fn create_couple(store: &dyn Store, new: NewCouple) -> Result<OfficialCouple, AppError> {
    let episode = store
        .get_episode(&new.episode_id)
        .await?
        .ok_or_else(|| AppError::not_found("Episode", &new.episode_id))?;

    for (id, pool) in [(&new.a_id, Pool::A), (&new.b_id, Pool::B)] {
        let participant = store
            .get_participant(id)
            .await?
            .ok_or_else(|| AppError::not_found("Participant", id))?;

        if participant.pool != pool || participant.season_id != episode.season_id {
            return Err(AppError::MalformedPayload(format!(
                "Participant {id} cannot stand on the {pool:?} side of this couple"
            )));
        }
    }

    let already_decided = store
        .list_couples(Some(&episode.id))
        .await?
        .iter()
        .any(|couple| couple.a_id == new.a_id || couple.b_id == new.b_id);
    if already_decided {
        return Err(AppError::MalformedPayload(
            "A member of this couple is already in an official couple for the episode".to_string(),
        ));
    }

    let now = Utc::now();
    let couple = OfficialCouple {
        id: new_id(),
        episode_id: episode.id,
        a_id: new.a_id,
        b_id: new.b_id,
        decided_at: now,
        created_at: now,
    };

    store.put_couple(&couple).await?;
    info!("Official couple {}:{} for episode {}", couple.a_id, couple.b_id, couple.episode_id);

    Ok(couple)
}

pub async fn delete_couple(store: &dyn Store, id: &str) -> Result<OfficialCouple, AppError> {
    store
        .delete_couple(id)
        .await?
        .ok_or_else(|| AppError::not_found("Couple", id))
}

pub async fn set_role(store: &dyn Store, user_id: &str, role: Role) -> Result<UserProfile, AppError> {
    let mut profile = store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", user_id))?;

    profile.role = role;
    profile.updated_at = Utc::now();
    store.put_profile(&profile).await?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use show::MemoryStore;

    use super::*;

    async fn seeded() -> (MemoryStore, Season) {
        let store = MemoryStore::new();
        let season = create_season(
            &store,
            NewSeason {
                title: "Transit Love 4".to_string(),
                code: "tl4".to_string(),
                start_date: None,
                end_date: None,
                is_active: true,
            },
        )
        .await
        .unwrap();

        (store, season)
    }

    async fn participant(store: &MemoryStore, season: &Season, name: &str, pool: Pool) -> Participant {
        create_participant(
            store,
            NewParticipant {
                name: name.to_string(),
                pool,
                image_url: None,
                season_id: season.id.clone(),
            },
        )
        .await
        .unwrap()
    }

    fn new_episode(season: &Season, number: u32) -> NewEpisode {
        NewEpisode {
            season_id: season.id.clone(),
            number,
            title: None,
            open_at: None,
            close_at: None,
            status: EpisodeStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let store = MemoryStore::new();

        let result = create_season(
            &store,
            NewSeason {
                title: "   ".to_string(),
                code: "x".to_string(),
                start_date: None,
                end_date: None,
                is_active: true,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_participant_needs_season() {
        let store = MemoryStore::new();

        let result = create_participant(
            &store,
            NewParticipant {
                name: "Minho".to_string(),
                pool: Pool::A,
                image_url: None,
                season_id: "missing".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_soft_delete_participant() {
        let (store, season) = seeded().await;
        let minho = participant(&store, &season, "Minho", Pool::A).await;

        let removed = deactivate_participant(&store, &minho.id).await.unwrap();

        assert!(!removed.is_active);
        assert!(store.get_participant(&minho.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_episode_numbers_unique_per_season() {
        let (store, season) = seeded().await;

        create_episode(&store, new_episode(&season, 1)).await.unwrap();
        let duplicate = create_episode(&store, new_episode(&season, 1)).await;

        assert!(matches!(duplicate, Err(AppError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_episode_window_validated() {
        let (store, season) = seeded().await;
        let now = Utc::now();

        let mut new = new_episode(&season, 1);
        new.open_at = Some(now);
        new.close_at = Some(now - Duration::hours(1));

        assert!(matches!(
            create_episode(&store, new).await,
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_episode_status_update() {
        let (store, season) = seeded().await;
        let episode = create_episode(&store, new_episode(&season, 1)).await.unwrap();

        let updated = update_episode(
            &store,
            &episode.id,
            EpisodePatch {
                status: Some(EpisodeStatus::Closed),
                ..EpisodePatch::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.status, EpisodeStatus::Closed);
        assert_eq!(updated.number, 1);
    }

    #[tokio::test]
    async fn test_couple_sides_checked() {
        let (store, season) = seeded().await;
        let episode = create_episode(&store, new_episode(&season, 1)).await.unwrap();
        let minho = participant(&store, &season, "Minho", Pool::A).await;
        let yuna = participant(&store, &season, "Yuna", Pool::B).await;

        let swapped = create_couple(
            &store,
            NewCouple {
                episode_id: episode.id.clone(),
                a_id: yuna.id.clone(),
                b_id: minho.id.clone(),
            },
        )
        .await;
        assert!(matches!(swapped, Err(AppError::MalformedPayload(_))));

        let couple = create_couple(
            &store,
            NewCouple {
                episode_id: episode.id.clone(),
                a_id: minho.id.clone(),
                b_id: yuna.id.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(couple.episode_id, episode.id);

        let again = create_couple(
            &store,
            NewCouple {
                episode_id: episode.id.clone(),
                a_id: minho.id.clone(),
                b_id: yuna.id.clone(),
            },
        )
        .await;
        assert!(matches!(again, Err(AppError::MalformedPayload(_))));

        delete_couple(&store, &couple.id).await.unwrap();
        assert!(matches!(
            delete_couple(&store, &couple.id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_role() {
        let store = MemoryStore::new();
        store.put_profile(&UserProfile::new("u1", "host")).await.unwrap();

        let profile = set_role(&store, "u1", Role::Admin).await.unwrap();

        assert!(profile.is_admin());
        assert!(matches!(
            set_role(&store, "u2", Role::Admin).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
