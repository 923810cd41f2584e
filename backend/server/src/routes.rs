use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use show::{
    Activation, Episode, OfficialCouple, Pairing, PredictionBuilder, PredictionSet, Roster,
    Season, Session, SetKey, StoredPrediction, UserProfile,
    builder::BuilderView,
    scoring::{self, EpisodeStats, ScoreCard},
    time::format_time_remaining,
};
use tracing::info;

use crate::{
    admin::{
        self, EpisodePatch, NewCouple, NewEpisode, NewParticipant, NewSeason, ParticipantPatch,
        SeasonPatch,
    },
    error::AppError,
    state::AppState,
    utils::{AdminUser, CurrentUser},
};

const DEFAULT_VERSION: u32 = 1;
const MAX_USERNAME_CHARS: usize = 32;

fn default_version() -> u32 {
    DEFAULT_VERSION
}

async fn episode_or_404(state: &AppState, id: &str) -> Result<Episode, AppError> {
    state
        .store
        .get_episode(id)
        .await?
        .ok_or_else(|| AppError::not_found("Episode", id))
}

async fn participant_names(state: &AppState, season_id: Option<&str>) -> Result<HashMap<String, String>, AppError> {
    Ok(state
        .store
        .list_participants(season_id)
        .await?
        .into_iter()
        .map(|participant| (participant.id, participant.name))
        .collect())
}

fn session_for(state: &AppState, user: &CurrentUser, episode_id: &str) -> Result<Arc<Session>, AppError> {
    state
        .session(&user.id, episode_id)
        .ok_or_else(|| AppError::NoSession(episode_id.to_string()))
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    sessions: usize,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        sessions: state.sessions.len(),
    })
}

// Profile

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub username: String,
}

pub async fn get_profile_handler(user: CurrentUser) -> Result<Json<UserProfile>, AppError> {
    user.profile
        .map(Json)
        .ok_or_else(|| AppError::not_found("Profile", &user.id))
}

/// Creates the profile on first call, renames it afterwards. The role is never changed here.
pub async fn put_profile_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let username = payload.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::MalformedPayload(format!(
            "username must be 1 to {MAX_USERNAME_CHARS} characters"
        )));
    }

    let profile = match user.profile {
        Some(mut profile) => {
            profile.username = username.to_string();
            profile.updated_at = Utc::now();
            profile
        }
        None => {
            info!("Creating profile for {}", user.id);
            UserProfile::new(&user.id, username)
        }
    };

    state.store.put_profile(&profile).await?;

    Ok(Json(profile))
}

// Catalog

pub async fn seasons_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Season>>, AppError> {
    let mut seasons = state.store.list_seasons().await?;
    seasons.retain(|season| season.is_active);

    Ok(Json(seasons))
}

pub async fn season_participants_handler(
    State(state): State<Arc<AppState>>,
    Path(season_id): Path<String>,
) -> Result<Json<Vec<show::Participant>>, AppError> {
    if state.store.get_season(&season_id).await?.is_none() {
        return Err(AppError::not_found("Season", &season_id));
    }

    let mut participants = state.store.list_participants(Some(&season_id)).await?;
    participants.retain(|participant| participant.is_active);

    Ok(Json(participants))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeQuery {
    pub season_id: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    #[serde(flatten)]
    pub episode: Episode,
    pub accepting: bool,
    pub time_remaining: Option<String>,
    pub total_predictions: usize,
    pub accuracy_rate: u32,
}

pub async fn episodes_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EpisodeQuery>,
) -> Result<Json<Vec<EpisodeSummary>>, AppError> {
    let episodes = state.store.list_episodes(query.season_id.as_deref()).await?;
    let predictions = state.store.list_predictions(None, None).await?;
    let couples = state.store.list_couples(None).await?;
    let now = Utc::now();

    let summaries = episodes
        .into_iter()
        .map(|episode| {
            let episode_predictions: Vec<StoredPrediction> = scoring::latest_per_user(
                predictions
                    .iter()
                    .filter(|stored| stored.set.episode_id == episode.id)
                    .cloned()
                    .collect(),
            );
            let official: Vec<OfficialCouple> = couples
                .iter()
                .filter(|couple| couple.episode_id == episode.id)
                .cloned()
                .collect();
            let stats = scoring::episode_stats(&*state.matcher, &episode.id, &episode_predictions, &official);

            EpisodeSummary {
                accepting: episode.accepts_predictions(now),
                time_remaining: episode.close_at.map(|close_at| format_time_remaining(close_at, now)),
                total_predictions: stats.total_predictions,
                accuracy_rate: stats.accuracy_rate,
                episode,
            }
        })
        .collect();

    Ok(Json(summaries))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDetail {
    #[serde(flatten)]
    pub episode: Episode,
    pub season: Option<Season>,
    pub accepting: bool,
    pub time_remaining: Option<String>,
}

pub async fn episode_handler(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
) -> Result<Json<EpisodeDetail>, AppError> {
    let episode = episode_or_404(&state, &episode_id).await?;
    let season = state.store.get_season(&episode.season_id).await?;
    let now = Utc::now();

    Ok(Json(EpisodeDetail {
        season,
        accepting: episode.accepts_predictions(now),
        time_remaining: episode.close_at.map(|close_at| format_time_remaining(close_at, now)),
        episode,
    }))
}

pub async fn roster_handler(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
) -> Result<Json<Roster>, AppError> {
    Ok(Json(state.store.get_roster(&episode_id).await?))
}

// Results and rankings

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CoupleView {
    #[serde(flatten)]
    pub couple: OfficialCouple,
    pub a_name: Option<String>,
    pub b_name: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PairResult {
    #[serde(flatten)]
    pub pairing: Pairing,
    pub correct: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPrediction {
    pub version: u32,
    pub submitted_at: DateTime<Utc>,
    pub pairs: Vec<PairResult>,
    #[serde(flatten)]
    pub card: ScoreCard,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeResults {
    pub episode_id: String,
    pub official: Vec<CoupleView>,
    pub mine: Option<ScoredPrediction>,
    pub stats: EpisodeStats,
}

pub async fn results_handler(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    Path(episode_id): Path<String>,
) -> Result<Json<EpisodeResults>, AppError> {
    let episode = episode_or_404(&state, &episode_id).await?;
    let official = state.store.list_couples(Some(&episode.id)).await?;
    let names = participant_names(&state, Some(&episode.season_id)).await?;
    let predictions = scoring::latest_per_user(state.store.list_predictions(None, Some(&episode.id)).await?);

    let mine = user.and_then(|user| {
        predictions
            .iter()
            .find(|stored| stored.set.user_id == user.id)
            .map(|stored| ScoredPrediction {
                version: stored.set.version,
                submitted_at: stored.submitted_at,
                pairs: stored
                    .set
                    .pairs
                    .iter()
                    .map(|pairing| PairResult {
                        correct: official.iter().any(|couple| state.matcher.matches(pairing, couple)),
                        pairing: pairing.clone(),
                    })
                    .collect(),
                card: scoring::score(&*state.matcher, &stored.set.pairs, &official),
            })
    });

    let stats = scoring::episode_stats(&*state.matcher, &episode.id, &predictions, &official);
    let official = official
        .into_iter()
        .map(|couple| CoupleView {
            a_name: names.get(&couple.a_id).cloned(),
            b_name: names.get(&couple.b_id).cloned(),
            couple,
        })
        .collect();

    Ok(Json(EpisodeResults {
        episode_id: episode.id,
        official,
        mine,
        stats,
    }))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: Option<String>,
    pub score: u32,
}

pub async fn rankings_handler(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
) -> Result<Json<Vec<RankingEntry>>, AppError> {
    let episode = episode_or_404(&state, &episode_id).await?;
    let official = state.store.list_couples(Some(&episode.id)).await?;
    let predictions = scoring::latest_per_user(state.store.list_predictions(None, Some(&episode.id)).await?);

    let scores = predictions
        .into_iter()
        .map(|stored| {
            let card = scoring::score(&*state.matcher, &stored.set.pairs, &official);
            (stored.set.user_id, card.score)
        })
        .collect();

    let mut entries = Vec::new();
    for ranked in scoring::rank(scores) {
        let username = state
            .store
            .get_profile(&ranked.user_id)
            .await?
            .map(|profile| profile.username);

        entries.push(RankingEntry {
            rank: ranked.rank,
            user_id: ranked.user_id,
            username,
            score: ranked.score,
        });
    }

    Ok(Json(entries))
}

// Predictions

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NamedPairing {
    #[serde(flatten)]
    pub pairing: Pairing,
    pub a_name: Option<String>,
    pub b_name: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PredictionView {
    pub episode_id: String,
    pub episode_number: Option<u32>,
    pub episode_title: Option<String>,
    pub version: u32,
    pub submitted_at: DateTime<Utc>,
    pub pairs: Vec<NamedPairing>,
}

pub async fn my_predictions_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<PredictionView>>, AppError> {
    let predictions = state.store.list_predictions(Some(&user.id), None).await?;
    let names = participant_names(&state, None).await?;
    let episodes: HashMap<String, Episode> = state
        .store
        .list_episodes(None)
        .await?
        .into_iter()
        .map(|episode| (episode.id.clone(), episode))
        .collect();

    let views = predictions
        .into_iter()
        .map(|stored| {
            let episode = episodes.get(&stored.set.episode_id);

            PredictionView {
                episode_number: episode.map(|episode| episode.number),
                episode_title: episode.and_then(|episode| episode.title.clone()),
                version: stored.set.version,
                submitted_at: stored.submitted_at,
                pairs: stored
                    .set
                    .pairs
                    .into_iter()
                    .map(|pairing| NamedPairing {
                        a_name: names.get(&pairing.a_id).cloned(),
                        b_name: names.get(&pairing.b_id).cloned(),
                        pairing,
                    })
                    .collect(),
                episode_id: stored.set.episode_id,
            }
        })
        .collect();

    Ok(Json(views))
}

pub async fn get_prediction_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
) -> Result<Json<Option<PredictionSet>>, AppError> {
    episode_or_404(&state, &episode_id).await?;

    Ok(Json(state.store.load_prediction_set(&user.id, &episode_id).await?))
}

#[derive(Deserialize)]
pub struct PredictionSubmission {
    #[serde(default = "default_version")]
    pub version: u32,
    pub pairs: Vec<Pairing>,
}

/// Saves a full pair list in one request. Pairs are replayed through a builder so the same
/// rules apply as for interactive editing.
pub async fn put_prediction_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
    Json(payload): Json<PredictionSubmission>,
) -> Result<Json<StoredPrediction>, AppError> {
    let episode = episode_or_404(&state, &episode_id).await?;
    if !episode.accepts_predictions(Utc::now()) {
        return Err(AppError::PredictionClosed(episode_id));
    }

    let roster = state.store.get_roster(&episode_id).await?;
    let mut builder = PredictionBuilder::new(roster)?;

    let submitted = payload.pairs.len();
    if builder.restore(payload.pairs) != submitted {
        return Err(AppError::MalformedPayload(
            "pairs must join unfixed candidates of opposite pools, each at most once".to_string(),
        ));
    }

    let set = builder.prediction_set(&SetKey::new(&user.id, &episode_id, payload.version));
    if set.pairs.is_empty() {
        return Err(show::BuilderError::EmptyPrediction.into());
    }

    let stored = state.store.save_prediction_set(&set).await?;

    // An open session would otherwise overwrite this save with stale pairs.
    state.sessions.remove(&(user.id, episode_id));

    Ok(Json(stored))
}

// Builder sessions

#[derive(Deserialize)]
pub struct VersionQuery {
    pub version: Option<u32>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OpenedView {
    #[serde(flatten)]
    pub view: BuilderView,
    pub restored: usize,
    pub load_error: Option<String>,
}

pub async fn open_builder_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<OpenedView>, AppError> {
    let key = SetKey::new(&user.id, &episode_id, query.version.unwrap_or(DEFAULT_VERSION));
    let opened = Session::open(&*state.store, &*state.store, key).await?;

    let session = Arc::new(opened.session);
    let view = session.view().await;
    state.sessions.insert((user.id, episode_id), session);

    Ok(Json(OpenedView {
        view,
        restored: opened.restored,
        load_error: opened.load_error.map(|e| e.to_string()),
    }))
}

pub async fn builder_view_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
) -> Result<Json<BuilderView>, AppError> {
    let session = session_for(&state, &user, &episode_id)?;

    Ok(Json(session.view().await))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub candidate_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivationView {
    pub activation: Activation,
    pub view: BuilderView,
}

pub async fn activate_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
    Json(payload): Json<CandidateRequest>,
) -> Result<Json<ActivationView>, AppError> {
    let session = session_for(&state, &user, &episode_id)?;
    let activation = session.activate(&payload.candidate_id).await;

    Ok(Json(ActivationView {
        activation,
        view: session.view().await,
    }))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UnpairView {
    pub unpaired: Option<Pairing>,
    pub view: BuilderView,
}

pub async fn unpair_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
    Json(payload): Json<CandidateRequest>,
) -> Result<Json<UnpairView>, AppError> {
    let session = session_for(&state, &user, &episode_id)?;
    let unpaired = session.unpair(&payload.candidate_id).await;

    Ok(Json(UnpairView {
        unpaired,
        view: session.view().await,
    }))
}

pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
) -> Result<Json<BuilderView>, AppError> {
    let session = session_for(&state, &user, &episode_id)?;
    session.reset().await;

    Ok(Json(session.view().await))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub stored: StoredPrediction,
    pub view: BuilderView,
}

pub async fn save_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(episode_id): Path<String>,
) -> Result<Json<SavedView>, AppError> {
    let session = session_for(&state, &user, &episode_id)?;

    let episode = episode_or_404(&state, &episode_id).await?;
    if !episode.accepts_predictions(Utc::now()) {
        return Err(AppError::PredictionClosed(episode_id));
    }

    let stored = session.save(&*state.store).await?;

    Ok(Json(SavedView {
        stored,
        view: session.view().await,
    }))
}

// Admin

pub async fn create_season_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<NewSeason>,
) -> Result<(StatusCode, Json<Season>), AppError> {
    let season = admin::create_season(&*state.store, payload).await?;

    Ok((StatusCode::CREATED, Json(season)))
}

pub async fn update_season_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(season_id): Path<String>,
    Json(payload): Json<SeasonPatch>,
) -> Result<Json<Season>, AppError> {
    Ok(Json(admin::update_season(&*state.store, &season_id, payload).await?))
}

pub async fn create_participant_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<NewParticipant>,
) -> Result<(StatusCode, Json<show::Participant>), AppError> {
    let participant = admin::create_participant(&*state.store, payload).await?;

    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn update_participant_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(participant_id): Path<String>,
    Json(payload): Json<ParticipantPatch>,
) -> Result<Json<show::Participant>, AppError> {
    Ok(Json(
        admin::update_participant(&*state.store, &participant_id, payload).await?,
    ))
}

pub async fn delete_participant_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(participant_id): Path<String>,
) -> Result<Json<show::Participant>, AppError> {
    Ok(Json(
        admin::deactivate_participant(&*state.store, &participant_id).await?,
    ))
}

pub async fn create_episode_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<NewEpisode>,
) -> Result<(StatusCode, Json<Episode>), AppError> {
    let episode = admin::create_episode(&*state.store, payload).await?;

    Ok((StatusCode::CREATED, Json(episode)))
}

pub async fn update_episode_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(episode_id): Path<String>,
    Json(payload): Json<EpisodePatch>,
) -> Result<Json<Episode>, AppError> {
    Ok(Json(admin::update_episode(&*state.store, &episode_id, payload).await?))
}

pub async fn create_couple_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<NewCouple>,
) -> Result<(StatusCode, Json<OfficialCouple>), AppError> {
    let couple = admin::create_couple(&*state.store, payload).await?;

    Ok((StatusCode::CREATED, Json(couple)))
}

pub async fn delete_couple_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(couple_id): Path<String>,
) -> Result<Json<OfficialCouple>, AppError> {
    Ok(Json(admin::delete_couple(&*state.store, &couple_id).await?))
}
