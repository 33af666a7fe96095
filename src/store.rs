use std::collections::HashMap;

use crate::fixtures::FixtureId;
use crate::tips::Prediction;

pub const NO_PREDICTION_MESSAGE: &str = "AI did not return a prediction for this match.";

/// Lifecycle of one fixture's prediction; exactly one of the three shapes holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionState {
    pub result: Option<Prediction>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionPhase {
    Pending,
    Resolved,
    Failed,
}

impl PredictionState {
    pub fn pending() -> Self {
        Self {
            result: None,
            is_loading: true,
            error: None,
        }
    }

    pub fn resolved(prediction: Prediction) -> Self {
        Self {
            result: Some(prediction),
            is_loading: false,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result: None,
            is_loading: false,
            error: Some(message.into()),
        }
    }

    pub fn phase(&self) -> PredictionPhase {
        if self.is_loading {
            PredictionPhase::Pending
        } else if self.result.is_some() {
            PredictionPhase::Resolved
        } else {
            PredictionPhase::Failed
        }
    }

    pub fn is_pending(&self) -> bool {
        self.phase() == PredictionPhase::Pending
    }
}

/// Fixture id to prediction lifecycle. Entries only move pending -> resolved/failed;
/// `clear_all` is the only way back to absence.
#[derive(Debug, Default)]
pub struct PredictionStore {
    states: HashMap<FixtureId, PredictionState>,
    epoch: u64,
}

impl PredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FixtureId) -> Option<&PredictionState> {
        self.states.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FixtureId, &PredictionState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.states.values().filter(|s| s.is_pending()).count()
    }

    /// Bumped by every `clear_all`; work started under an older epoch is stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a new request may include this fixture: absent or failed entries only.
    pub fn is_requestable(&self, id: FixtureId) -> bool {
        self.states
            .get(&id)
            .is_none_or(|s| s.phase() == PredictionPhase::Failed)
    }

    /// Marks every requestable id pending and returns those ids, in input order.
    pub fn claim(&mut self, ids: impl IntoIterator<Item = FixtureId>) -> Vec<FixtureId> {
        let mut claimed = Vec::new();
        for id in ids {
            if self.is_requestable(id) {
                self.states.insert(id, PredictionState::pending());
                claimed.push(id);
            }
        }
        claimed
    }

    pub fn mark_pending(&mut self, ids: impl IntoIterator<Item = FixtureId>) {
        for id in ids {
            self.states.insert(id, PredictionState::pending());
        }
    }

    /// Returns false (and changes nothing) unless `id` is pending.
    pub fn set_resolved(&mut self, id: FixtureId, prediction: Prediction) -> bool {
        match self.states.get_mut(&id) {
            Some(state) if state.is_pending() => {
                *state = PredictionState::resolved(prediction);
                true
            }
            _ => false,
        }
    }

    /// Returns false (and changes nothing) unless `id` is pending.
    pub fn set_failed(&mut self, id: FixtureId, message: impl Into<String>) -> bool {
        match self.states.get_mut(&id) {
            Some(state) if state.is_pending() => {
                *state = PredictionState::failed(message);
                true
            }
            _ => false,
        }
    }

    /// Fails every id in `ids` that is still pending; returns how many were failed.
    pub fn reconcile_stale(&mut self, ids: &[FixtureId], message: &str) -> usize {
        ids.iter()
            .filter(|id| self.set_failed(**id, message))
            .count()
    }

    pub fn clear_all(&mut self) {
        self.states.clear();
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{PredictionPhase, PredictionState, PredictionStore};
    use crate::tips::Prediction;

    #[test]
    fn phases_are_mutually_exclusive() {
        assert_eq!(PredictionState::pending().phase(), PredictionPhase::Pending);
        assert_eq!(
            PredictionState::resolved(Prediction::default()).phase(),
            PredictionPhase::Resolved
        );
        assert_eq!(PredictionState::failed("x").phase(), PredictionPhase::Failed);
    }

    #[test]
    fn clear_all_bumps_epoch() {
        let mut store = PredictionStore::new();
        let before = store.epoch();
        store.mark_pending([1]);
        store.clear_all();
        assert!(store.is_empty());
        assert_eq!(store.epoch(), before + 1);
    }
}
