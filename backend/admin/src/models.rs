use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use show::{EpisodeStatus, Pool};

/// Season import file.
///
/// ```json
/// {
///   "season": { "title": "Transit Love 4", "startDate": "2025-03-01" },
///   "participants": [{ "name": "Minho", "pool": "A" }],
///   "episodes": [{ "number": 1, "closeAt": "2025-03-08T11:00:00Z" }]
/// }
/// ```
#[derive(Deserialize, Debug)]
pub struct ImportFile {
    pub season: SeasonEntry,
    #[serde(default)]
    pub participants: Vec<ParticipantEntry>,
    #[serde(default)]
    pub episodes: Vec<EpisodeEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEntry {
    pub title: String,
    /// Derived from the title when missing. Letters and digits of any script are kept.
    pub code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEntry {
    pub name: String,
    pub pool: Pool,
    pub image_url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeEntry {
    pub number: u32,
    pub title: Option<String>,
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EpisodeStatus,
}
