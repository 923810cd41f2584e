//! # Catalog administration
//!
//! Works directly against the store, bypassing the HTTP surface. Used to seed a season
//! before it airs and to promote the first admin, who can then use the admin routes.
//!
//! ## Import
//! 1. Load the import file from disk or over HTTP.
//! 2. Clean participant names and derive the season code from the title when missing.
//! 3. Reuse the season with the same code, otherwise create it.
//! 4. Add participants not yet known under the same name and pool.
//! 5. Add episodes whose number is not taken yet.
//!
//! Rerunning an import is safe, already imported entries are skipped.
use std::collections::HashSet;

use anyhow::{Context, bail};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use server::admin::{
    EpisodePatch, NewCouple, NewEpisode, NewParticipant, NewSeason, create_couple,
    create_episode, create_participant, create_season, set_role, update_episode,
};
use show::{EpisodeStatus, Pool, Role, Store};

pub mod models;
pub mod utils;

use models::ImportFile;
use utils::{clean_name, is_url, slugify};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusArg {
    Scheduled,
    Open,
    Closed,
}

impl From<StatusArg> for EpisodeStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Scheduled => EpisodeStatus::Scheduled,
            StatusArg::Open => EpisodeStatus::Open,
            StatusArg::Closed => EpisodeStatus::Closed,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub season_id: String,
    pub season_created: bool,
    pub participants_added: usize,
    pub participants_skipped: usize,
    pub episodes_added: usize,
    pub episodes_skipped: usize,
}

pub async fn load_source(source: &str) -> anyhow::Result<ImportFile> {
    let raw = if is_url(source) {
        Client::new()
            .get(source)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read {source}"))?
    };

    serde_json::from_str(&raw).with_context(|| format!("Malformed import file {source}"))
}

pub async fn import(store: &dyn Store, source: &str) -> anyhow::Result<()> {
    let file = load_source(source).await?;

    println!("Loaded Season: {}", file.season.title);
    println!("Loaded Participants: {}", file.participants.len());
    println!("Loaded Episodes: {}\n", file.episodes.len());

    let summary = import_file(store, file).await?;

    if summary.season_created {
        println!("Created season {}", summary.season_id);
    } else {
        println!("Updated existing season {}", summary.season_id);
    }
    println!(
        "Participants: {} added, {} skipped",
        summary.participants_added, summary.participants_skipped
    );
    println!(
        "Episodes: {} added, {} skipped",
        summary.episodes_added, summary.episodes_skipped
    );

    Ok(())
}

fn progress(len: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    Ok(pb)
}

pub async fn import_file(store: &dyn Store, file: ImportFile) -> anyhow::Result<ImportSummary> {
    let title = clean_name(&file.season.title);
    let code = slugify(file.season.code.as_deref().unwrap_or(&title));
    if code.is_empty() {
        bail!("Season code for {title:?} is empty after cleaning");
    }

    let existing = store
        .list_seasons()
        .await?
        .into_iter()
        .find(|season| season.code == code);

    let (season, season_created) = match existing {
        Some(season) => (season, false),
        None => {
            let season = create_season(
                store,
                NewSeason {
                    title,
                    code,
                    start_date: file.season.start_date,
                    end_date: file.season.end_date,
                    is_active: true,
                },
            )
            .await?;

            (season, true)
        }
    };

    let mut known: HashSet<(String, Pool)> = store
        .list_participants(Some(&season.id))
        .await?
        .into_iter()
        .map(|participant| (participant.name, participant.pool))
        .collect();
    let mut numbers: HashSet<u32> = store
        .list_episodes(Some(&season.id))
        .await?
        .iter()
        .map(|episode| episode.number)
        .collect();

    let mut summary = ImportSummary {
        season_id: season.id.clone(),
        season_created,
        ..ImportSummary::default()
    };

    let pb = progress(file.participants.len() + file.episodes.len())?;

    for entry in file.participants {
        let name = clean_name(&entry.name);
        pb.set_message(format!("Participant {name}"));

        if name.is_empty() || !known.insert((name.clone(), entry.pool)) {
            summary.participants_skipped += 1;
        } else {
            create_participant(
                store,
                NewParticipant {
                    name,
                    pool: entry.pool,
                    image_url: entry.image_url,
                    season_id: season.id.clone(),
                },
            )
            .await?;
            summary.participants_added += 1;
        }

        pb.inc(1);
    }

    for entry in file.episodes {
        pb.set_message(format!("Episode {}", entry.number));

        if !numbers.insert(entry.number) {
            summary.episodes_skipped += 1;
        } else {
            create_episode(
                store,
                NewEpisode {
                    season_id: season.id.clone(),
                    number: entry.number,
                    title: entry.title.map(|title| clean_name(&title)),
                    open_at: entry.open_at,
                    close_at: entry.close_at,
                    status: entry.status,
                },
            )
            .await?;
            summary.episodes_added += 1;
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    Ok(summary)
}

pub async fn promote(store: &dyn Store, user_id: &str) -> anyhow::Result<()> {
    let profile = set_role(store, user_id, Role::Admin)
        .await
        .with_context(|| format!("User {user_id} needs a profile before promotion"))?;

    println!("{} ({}) is now an admin", profile.username, profile.id);

    Ok(())
}

pub async fn set_status(store: &dyn Store, episode_id: &str, status: StatusArg) -> anyhow::Result<()> {
    let episode = update_episode(
        store,
        episode_id,
        EpisodePatch {
            status: Some(status.into()),
            ..EpisodePatch::default()
        },
    )
    .await?;

    println!("Episode {} is now {:?}", episode.number, episode.status);

    Ok(())
}

pub async fn couple(store: &dyn Store, episode_id: &str, a_id: &str, b_id: &str) -> anyhow::Result<()> {
    let couple = create_couple(
        store,
        NewCouple {
            episode_id: episode_id.to_string(),
            a_id: a_id.to_string(),
            b_id: b_id.to_string(),
        },
    )
    .await?;

    println!("Recorded couple {} ({}:{})", couple.id, couple.a_id, couple.b_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use show::{MemoryStore, UserProfile};

    use super::*;

    const SEASON: &str = r#"{
        "season": { "title": "  Transit   Love 4 ", "startDate": "2025-03-01" },
        "participants": [
            { "name": "Minho", "pool": "A" },
            { "name": " Minho ", "pool": "A" },
            { "name": "Yuna", "pool": "B", "imageUrl": "https://img.example/yuna.png" }
        ],
        "episodes": [
            { "number": 1, "status": "open" },
            { "number": 2 }
        ]
    }"#;

    fn season_file() -> ImportFile {
        serde_json::from_str(SEASON).unwrap()
    }

    #[tokio::test]
    async fn test_import_creates_catalog() {
        let store = MemoryStore::new();

        let summary = import_file(&store, season_file()).await.unwrap();

        assert!(summary.season_created);
        assert_eq!(summary.participants_added, 2);
        assert_eq!(summary.participants_skipped, 1);
        assert_eq!(summary.episodes_added, 2);

        let season = store.get_season(&summary.season_id).await.unwrap().unwrap();
        assert_eq!(season.title, "Transit Love 4");
        assert_eq!(season.code, "transit-love-4");

        let episodes = store.list_episodes(Some(&season.id)).await.unwrap();
        assert_eq!(episodes[0].status, EpisodeStatus::Open);
        assert_eq!(episodes[1].status, EpisodeStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_import_is_rerunnable() {
        let store = MemoryStore::new();
        let first = import_file(&store, season_file()).await.unwrap();

        let second = import_file(&store, season_file()).await.unwrap();

        assert!(!second.season_created);
        assert_eq!(second.season_id, first.season_id);
        assert_eq!(second.participants_added, 0);
        assert_eq!(second.participants_skipped, 3);
        assert_eq!(second.episodes_skipped, 2);
        assert_eq!(store.list_seasons().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_hangul_title_without_code() {
        let store = MemoryStore::new();
        let file: ImportFile = serde_json::from_str(r#"{ "season": { "title": "환승연애 4" } }"#).unwrap();

        let summary = import_file(&store, file).await.unwrap();

        let season = store.get_season(&summary.season_id).await.unwrap().unwrap();
        assert_eq!(season.code, "환승연애-4");
    }

    #[tokio::test]
    async fn test_import_rejects_unsluggable_title() {
        let store = MemoryStore::new();
        let file: ImportFile = serde_json::from_str(r#"{ "season": { "title": "!!!" } }"#).unwrap();

        assert!(import_file(&store, file).await.is_err());
    }

    #[tokio::test]
    async fn test_set_status() {
        let store = MemoryStore::new();
        let summary = import_file(&store, season_file()).await.unwrap();
        let episode = store.list_episodes(Some(&summary.season_id)).await.unwrap().remove(1);

        set_status(&store, &episode.id, StatusArg::Closed).await.unwrap();

        let updated = store.get_episode(&episode.id).await.unwrap().unwrap();
        assert_eq!(updated.status, EpisodeStatus::Closed);
    }

    #[tokio::test]
    async fn test_promote_requires_profile() {
        let store = MemoryStore::new();
        assert!(promote(&store, "u1").await.is_err());

        store.put_profile(&UserProfile::new("u1", "host")).await.unwrap();
        promote(&store, "u1").await.unwrap();

        assert!(store.get_profile("u1").await.unwrap().unwrap().is_admin());
    }
}
