//! # Prediction Builder
//!
//! Click driven state machine pairing candidates of pool A with candidates of pool B.
//!
//! Every candidate is `unselected`, `armed` or `paired`. Fixed candidates sit outside
//! the machine and ignore activations. Activating a candidate:
//!
//! 1. fixed or unknown: nothing happens
//! 2. paired: its pairing is dissolved, this wins over any other reading of the click
//! 3. armed: disarmed
//! 4. unselected: paired with the armed candidate of the opposite pool if there is one,
//!    otherwise armed, replacing the armed candidate of its own pool
//!
//! Each candidate appears in at most one pairing and every pairing is `(A, B)`.
//! Both hold for every reachable state, so nothing here returns an invariant error.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::debug;

use crate::{
    error::BuilderError,
    records::{Candidate, Pairing, Pool, PredictionSet, SetKey},
    roster::Roster,
};

/// How long the saved acknowledgment stays visible.
pub const SAVED_DISPLAY: Duration = Duration::from_secs(3);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CandidateState {
    Fixed,
    Unselected,
    Armed,
    Paired,
}

/// What a single activation did.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Activation {
    /// Fixed or unknown candidate, a disabled affordance.
    Ignored,
    Armed { id: String },
    Disarmed { id: String },
    Paired { pairing: Pairing },
    Unpaired { pairing: Pairing },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub state: CandidateState,
    pub partner_id: Option<String>,
}

/// Serializable snapshot rendered by the frontend.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuilderView {
    pub pool_a: Vec<CandidateView>,
    pub pool_b: Vec<CandidateView>,
    pub pairs: Vec<Pairing>,
    pub armed_a: Option<String>,
    pub armed_b: Option<String>,
    pub saved: bool,
}

#[derive(Debug, Clone)]
pub struct PredictionBuilder {
    pool_a: Vec<Candidate>,
    pool_b: Vec<Candidate>,
    index: HashMap<String, (Pool, bool)>,
    pairs: Vec<Pairing>,
    armed_a: Option<String>,
    armed_b: Option<String>,
    saved_at: Option<Instant>,
}

impl PredictionBuilder {
    pub fn new(roster: Roster) -> Result<Self, BuilderError> {
        if roster.is_empty() {
            return Err(BuilderError::EmptyRoster);
        }

        let Roster {
            pool_a,
            pool_b,
            fixed_ids,
        } = roster;

        // pool membership comes from which list a candidate sits in
        let mut index = HashMap::with_capacity(pool_a.len() + pool_b.len());
        for (pool, candidates) in [(Pool::A, &pool_a), (Pool::B, &pool_b)] {
            for candidate in candidates {
                let fixed = candidate.fixed || fixed_ids.contains(&candidate.id);
                index.insert(candidate.id.clone(), (pool, fixed));
            }
        }

        let mark_fixed = |candidates: Vec<Candidate>| -> Vec<Candidate> {
            candidates
                .into_iter()
                .map(|mut candidate| {
                    candidate.fixed = candidate.fixed || fixed_ids.contains(&candidate.id);
                    candidate
                })
                .collect()
        };

        let pool_a = mark_fixed(pool_a);
        let pool_b = mark_fixed(pool_b);

        Ok(Self {
            pool_a,
            pool_b,
            index,
            pairs: Vec::new(),
            armed_a: None,
            armed_b: None,
            saved_at: None,
        })
    }

    /// Reapplies stored pairs in order. Pairs that would break an invariant are dropped.
    /// Returns how many were applied.
    pub fn restore<I>(&mut self, pairs: I) -> usize
    where
        I: IntoIterator<Item = Pairing>,
    {
        let mut applied = 0;

        for pairing in pairs {
            if self.can_pair(&pairing) {
                self.pairs.push(pairing);
                applied += 1;
            } else {
                debug!("Dropping stored pair {}", pairing.pick_key());
            }
        }

        applied
    }

    fn can_pair(&self, pairing: &Pairing) -> bool {
        matches!(self.index.get(&pairing.a_id), Some((Pool::A, false)))
            && matches!(self.index.get(&pairing.b_id), Some((Pool::B, false)))
            && self.pairing_of(&pairing.a_id).is_none()
            && self.pairing_of(&pairing.b_id).is_none()
    }

    pub fn activate(&mut self, id: &str) -> Activation {
        let pool = match self.index.get(id) {
            Some((_, true)) | None => return Activation::Ignored,
            Some((pool, false)) => *pool,
        };

        if let Some(pairing) = self.unpair(id) {
            // Only the clicked side's selection is dropped, the opposite one stays armed.
            *self.cursor_mut(pool) = None;
            return Activation::Unpaired { pairing };
        }

        if self.armed(pool) == Some(id) {
            *self.cursor_mut(pool) = None;
            return Activation::Disarmed { id: id.to_string() };
        }

        if let Some(partner) = self.cursor_mut(pool.opposite()).take() {
            let pairing = match pool {
                Pool::A => Pairing::new(id, &partner),
                Pool::B => Pairing::new(&partner, id),
            };

            self.armed_a = None;
            self.armed_b = None;
            self.pairs.push(pairing.clone());

            return Activation::Paired { pairing };
        }

        *self.cursor_mut(pool) = Some(id.to_string());
        Activation::Armed { id: id.to_string() }
    }

    /// Removes the pairing containing `id`. Both members go back to unselected.
    pub fn unpair(&mut self, id: &str) -> Option<Pairing> {
        let position = self.pairs.iter().position(|pairing| pairing.contains(id))?;

        Some(self.pairs.remove(position))
    }

    pub fn reset(&mut self) {
        self.pairs.clear();
        self.armed_a = None;
        self.armed_b = None;
    }

    pub fn state_of(&self, id: &str) -> Option<CandidateState> {
        let (pool, fixed) = self.index.get(id)?;

        let state = if *fixed {
            CandidateState::Fixed
        } else if self.pairing_of(id).is_some() {
            CandidateState::Paired
        } else if self.armed(*pool) == Some(id) {
            CandidateState::Armed
        } else {
            CandidateState::Unselected
        };

        Some(state)
    }

    pub fn pairs(&self) -> &[Pairing] {
        &self.pairs
    }

    pub fn pairing_of(&self, id: &str) -> Option<&Pairing> {
        self.pairs.iter().find(|pairing| pairing.contains(id))
    }

    pub fn armed(&self, pool: Pool) -> Option<&str> {
        match pool {
            Pool::A => self.armed_a.as_deref(),
            Pool::B => self.armed_b.as_deref(),
        }
    }

    fn cursor_mut(&mut self, pool: Pool) -> &mut Option<String> {
        match pool {
            Pool::A => &mut self.armed_a,
            Pool::B => &mut self.armed_b,
        }
    }

    pub fn prediction_set(&self, key: &SetKey) -> PredictionSet {
        PredictionSet::new(key, self.pairs.clone())
    }

    pub fn mark_saved(&mut self, at: Instant) {
        self.saved_at = Some(at);
    }

    pub fn is_saved(&self, now: Instant) -> bool {
        self.saved_at
            .is_some_and(|saved_at| now.saturating_duration_since(saved_at) < SAVED_DISPLAY)
    }

    pub fn view(&self, now: Instant) -> BuilderView {
        let describe = |candidates: &[Candidate]| -> Vec<CandidateView> {
            candidates
                .iter()
                .map(|candidate| CandidateView {
                    candidate: candidate.clone(),
                    state: self.state_of(&candidate.id).unwrap_or(CandidateState::Unselected),
                    partner_id: self
                        .pairing_of(&candidate.id)
                        .and_then(|pairing| pairing.partner_of(&candidate.id))
                        .map(str::to_string),
                })
                .collect()
        };

        BuilderView {
            pool_a: describe(&self.pool_a),
            pool_b: describe(&self.pool_b),
            pairs: self.pairs.clone(),
            armed_a: self.armed_a.clone(),
            armed_b: self.armed_b.clone(),
            saved: self.is_saved(now),
        }
    }
}
