//! Scoring predictions against official couples.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::records::{OfficialCouple, Pairing, StoredPrediction};

pub trait PairMatcher: Send + Sync {
    fn matches(&self, predicted: &Pairing, official: &OfficialCouple) -> bool;
}

/// A hit requires the exact `(a, b)` couple.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactMatch;

impl PairMatcher for ExactMatch {
    fn matches(&self, predicted: &Pairing, official: &OfficialCouple) -> bool {
        predicted.a_id == official.a_id && predicted.b_id == official.b_id
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub correct: usize,
    pub official: usize,
    /// Percentage of official couples predicted, 0 to 100.
    pub score: u32,
}

pub fn score<M: PairMatcher + ?Sized>(
    matcher: &M,
    predicted: &[Pairing],
    official: &[OfficialCouple],
) -> ScoreCard {
    if official.is_empty() {
        return ScoreCard {
            correct: 0,
            official: 0,
            score: 0,
        };
    }

    let correct = predicted
        .iter()
        .filter(|pairing| official.iter().any(|couple| matcher.matches(pairing, couple)))
        .count();

    ScoreCard {
        correct,
        official: official.len(),
        score: percentage(correct, official.len()),
    }
}

fn percentage(part: usize, whole: usize) -> u32 {
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankedScore {
    pub user_id: String,
    pub score: u32,
    pub rank: usize,
}

/// Highest score first. Equal scores keep their input order and still get distinct ranks.
pub fn rank(mut scores: Vec<(String, u32)>) -> Vec<RankedScore> {
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    scores
        .into_iter()
        .enumerate()
        .map(|(index, (user_id, score))| RankedScore {
            user_id,
            score,
            rank: index + 1,
        })
        .collect()
}

/// Latest prediction per user, most recent first. Input must be ordered latest first.
pub fn latest_per_user(predictions: Vec<StoredPrediction>) -> Vec<StoredPrediction> {
    let mut seen = HashSet::new();

    predictions
        .into_iter()
        .filter(|stored| seen.insert(stored.set.user_id.clone()))
        .collect()
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeStats {
    pub episode_id: String,
    pub total_predictions: usize,
    /// Mean score over all predictions, 0 until official couples exist.
    pub accuracy_rate: u32,
    /// How many users picked each `aId:bId` couple.
    pub pair_pick_counts: BTreeMap<String, usize>,
}

pub fn episode_stats<M: PairMatcher + ?Sized>(
    matcher: &M,
    episode_id: &str,
    predictions: &[StoredPrediction],
    official: &[OfficialCouple],
) -> EpisodeStats {
    let mut pair_pick_counts = BTreeMap::new();
    for stored in predictions {
        for pairing in &stored.set.pairs {
            *pair_pick_counts.entry(pairing.pick_key()).or_insert(0) += 1;
        }
    }

    let accuracy_rate = if predictions.is_empty() || official.is_empty() {
        0
    } else {
        let total: u32 = predictions
            .iter()
            .map(|stored| score(matcher, &stored.set.pairs, official).score)
            .sum();

        (total as f64 / predictions.len() as f64).round() as u32
    };

    EpisodeStats {
        episode_id: episode_id.to_string(),
        total_predictions: predictions.len(),
        accuracy_rate,
        pair_pick_counts,
    }
}
