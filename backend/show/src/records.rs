use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pool {
    A,
    B,
}

impl Pool {
    pub fn opposite(self) -> Self {
        match self {
            Pool::A => Pool::B,
            Pool::B => Pool::A,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: &str, username: &str) -> Self {
        let now = Utc::now();

        Self {
            id: id.to_string(),
            username: username.to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: String,
    pub title: String,
    pub code: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub pool: Pool,
    pub image_url: Option<String>,
    pub season_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    #[default]
    Scheduled,
    Open,
    Closed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub season_id: String,
    pub number: u32,
    pub title: Option<String>,
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    pub status: EpisodeStatus,
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Predictions are only taken while the episode is open and inside its window.
    pub fn accepts_predictions(&self, now: DateTime<Utc>) -> bool {
        self.status == EpisodeStatus::Open
            && self.open_at.is_none_or(|open_at| now >= open_at)
            && self.close_at.is_none_or(|close_at| now < close_at)
    }
}

/// An administrator confirmed couple, the ground truth predictions are scored against.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfficialCouple {
    pub id: String,
    pub episode_id: String,
    pub a_id: String,
    pub b_id: String,
    pub decided_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub pool: Pool,
    pub fixed: bool,
    pub display_name: String,
}

impl Candidate {
    pub fn from_participant(participant: &Participant, fixed: bool) -> Self {
        Self {
            id: participant.id.clone(),
            pool: participant.pool,
            fixed,
            display_name: participant.name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Pairing {
    pub a_id: String,
    pub b_id: String,
}

impl Pairing {
    pub fn new(a_id: &str, b_id: &str) -> Self {
        Self {
            a_id: a_id.to_string(),
            b_id: b_id.to_string(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.a_id == id || self.b_id == id
    }

    pub fn partner_of(&self, id: &str) -> Option<&str> {
        if self.a_id == id {
            Some(&self.b_id)
        } else if self.b_id == id {
            Some(&self.a_id)
        } else {
            None
        }
    }

    pub fn pick_key(&self) -> String {
        format!("{}:{}", self.a_id, self.b_id)
    }
}

/// Storage key of a prediction set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SetKey {
    pub user_id: String,
    pub episode_id: String,
    pub version: u32,
}

impl SetKey {
    pub fn new(user_id: &str, episode_id: &str, version: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            episode_id: episode_id.to_string(),
            version,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSet {
    pub user_id: String,
    pub episode_id: String,
    pub version: u32,
    pub pairs: Vec<Pairing>,
}

impl PredictionSet {
    pub fn new(key: &SetKey, pairs: Vec<Pairing>) -> Self {
        Self {
            user_id: key.user_id.clone(),
            episode_id: key.episode_id.clone(),
            version: key.version,
            pairs,
        }
    }

    pub fn key(&self) -> SetKey {
        SetKey::new(&self.user_id, &self.episode_id, self.version)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrediction {
    #[serde(flatten)]
    pub set: PredictionSet,
    pub submitted_at: DateTime<Utc>,
}

/// Most recently submitted first, ties broken by the higher version.
pub fn latest_first(a: &StoredPrediction, b: &StoredPrediction) -> std::cmp::Ordering {
    b.submitted_at
        .cmp(&a.submitted_at)
        .then(b.set.version.cmp(&a.set.version))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn episode(status: EpisodeStatus) -> Episode {
        Episode {
            id: "e1".to_string(),
            season_id: "s1".to_string(),
            number: 1,
            title: None,
            open_at: None,
            close_at: None,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_window_requires_open_status() {
        let now = Utc::now();

        assert!(!episode(EpisodeStatus::Scheduled).accepts_predictions(now));
        assert!(episode(EpisodeStatus::Open).accepts_predictions(now));
        assert!(!episode(EpisodeStatus::Closed).accepts_predictions(now));
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        let mut open = episode(EpisodeStatus::Open);

        open.close_at = Some(now - Duration::minutes(1));
        assert!(!open.accepts_predictions(now));

        open.close_at = Some(now + Duration::minutes(1));
        open.open_at = Some(now + Duration::seconds(30));
        assert!(!open.accepts_predictions(now));

        open.open_at = Some(now - Duration::seconds(30));
        assert!(open.accepts_predictions(now));
    }

    #[test]
    fn test_pairing_wire_shape() {
        let json = serde_json::to_value(Pairing::new("m1", "f1")).unwrap();

        assert_eq!(json, serde_json::json!({ "aId": "m1", "bId": "f1" }));
    }

    #[test]
    fn test_save_payload_shape() {
        let set = PredictionSet::new(&SetKey::new("u1", "e1", 1), vec![Pairing::new("m1", "f1")]);
        let json = serde_json::to_value(&set).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "userId": "u1",
                "episodeId": "e1",
                "version": 1,
                "pairs": [{ "aId": "m1", "bId": "f1" }]
            })
        );
    }

    #[test]
    fn test_partner_of() {
        let pairing = Pairing::new("m1", "f1");

        assert_eq!(pairing.partner_of("m1"), Some("f1"));
        assert_eq!(pairing.partner_of("f1"), Some("m1"));
        assert_eq!(pairing.partner_of("m2"), None);
    }
}
