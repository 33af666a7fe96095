use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{AiBackend, StreamRequest, TextStream};
use crate::error::OracleError;
use crate::extractor::ArrayExtractor;
use crate::fixtures::{Fixture, FixtureId};
use crate::quota::QuotaGate;
use crate::tips::BatchPrediction;

pub const DEFAULT_BATCH_SIZE: usize = 3;

#[derive(Debug)]
pub enum PredictionEvent {
    Prediction(BatchPrediction),
    Error(OracleError),
    /// A batch's stream ended (or was never opened); carries every fixture id of that batch.
    BatchComplete(Vec<FixtureId>),
}

/// Callback form of the event sequence.
pub trait PredictionSink {
    fn on_prediction(&mut self, prediction: BatchPrediction);
    fn on_error(&mut self, error: &OracleError);
    fn on_complete(&mut self, batch: &[FixtureId]);

    fn deliver(&mut self, event: PredictionEvent) {
        match event {
            PredictionEvent::Prediction(p) => self.on_prediction(p),
            PredictionEvent::Error(err) => self.on_error(&err),
            PredictionEvent::BatchComplete(ids) => self.on_complete(&ids),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn AiBackend>,
    quota: Arc<dyn QuotaGate>,
    batch_size: usize,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn AiBackend>, quota: Arc<dyn QuotaGate>, batch_size: usize) -> Self {
        Self {
            backend,
            quota,
            batch_size: batch_size.max(1),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AiBackend> {
        &self.backend
    }

    /// Lazily runs the batches for `fixtures`, one streaming request at a time.
    ///
    /// The caller is responsible for only passing fixtures it has just claimed in the store;
    /// repeated ids are collapsed to their first occurrence. Dropping the iterator abandons the
    /// in-flight request.
    pub fn events(&self, fixtures: &[Fixture]) -> PredictionEvents {
        let mut seen = HashSet::new();
        let unique: Vec<Fixture> = fixtures
            .iter()
            .filter(|f| seen.insert(f.id()))
            .cloned()
            .collect();
        let batches = unique
            .chunks(self.batch_size)
            .map(<[Fixture]>::to_vec)
            .collect();
        PredictionEvents {
            backend: Arc::clone(&self.backend),
            quota: Arc::clone(&self.quota),
            batches,
            active: None,
            queue: VecDeque::new(),
        }
    }

    pub fn request_predictions<S: PredictionSink + ?Sized>(&self, fixtures: &[Fixture], sink: &mut S) {
        for event in self.events(fixtures) {
            sink.deliver(event);
        }
    }
}

struct ActiveBatch {
    ids: Vec<FixtureId>,
    delivered: HashSet<FixtureId>,
    stream: TextStream,
    extractor: ArrayExtractor,
    chunks: usize,
}

pub struct PredictionEvents {
    backend: Arc<dyn AiBackend>,
    quota: Arc<dyn QuotaGate>,
    batches: VecDeque<Vec<Fixture>>,
    active: Option<ActiveBatch>,
    queue: VecDeque<PredictionEvent>,
}

impl PredictionEvents {
    fn open_next_batch(&mut self) -> bool {
        let Some(batch) = self.batches.pop_front() else {
            return false;
        };
        let ids: Vec<FixtureId> = batch.iter().map(Fixture::id).collect();

        if !self.quota.can_proceed() {
            warn!(fixtures = ids.len(), "usage quota exhausted, skipping remaining batches");
            self.queue.push_back(PredictionEvent::Error(OracleError::QuotaExhausted(
                "daily usage limit reached".to_string(),
            )));
            self.queue.push_back(PredictionEvent::BatchComplete(ids));
            self.skip_remaining();
            return true;
        }
        self.quota.record_attempt();

        info!(?ids, "requesting predictions");
        match self.backend.stream(&StreamRequest::for_batch(&batch)) {
            Ok(stream) => {
                self.active = Some(ActiveBatch {
                    ids,
                    delivered: HashSet::new(),
                    stream,
                    extractor: ArrayExtractor::new(),
                    chunks: 0,
                });
            }
            Err(err) => {
                warn!(error = %err, "prediction request failed");
                let halt = err.is_quota_exhausted();
                self.queue.push_back(PredictionEvent::Error(err));
                self.queue.push_back(PredictionEvent::BatchComplete(ids));
                if halt {
                    self.skip_remaining();
                }
            }
        }
        true
    }

    /// Reports every not-yet-dispatched fixture in one final completion.
    fn skip_remaining(&mut self) {
        let skipped: Vec<FixtureId> = self
            .batches
            .drain(..)
            .flatten()
            .map(|f| f.id())
            .collect();
        if !skipped.is_empty() {
            self.queue.push_back(PredictionEvent::BatchComplete(skipped));
        }
    }

    fn pump_active(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.stream.next() {
            Some(Ok(chunk)) => {
                active.chunks += 1;
                for prediction in active.extractor.push(&chunk) {
                    let id = prediction.fixture_id;
                    if !active.ids.contains(&id) {
                        debug!(id, "ignoring prediction for a fixture outside the batch");
                        continue;
                    }
                    if !active.delivered.insert(id) {
                        debug!(id, "ignoring duplicate prediction");
                        continue;
                    }
                    self.queue.push_back(PredictionEvent::Prediction(prediction));
                }
            }
            Some(Err(err)) => {
                warn!(error = %err, "prediction stream failed");
                let halt = err.is_quota_exhausted();
                let finished = self.active.take();
                self.queue.push_back(PredictionEvent::Error(err));
                if let Some(finished) = finished {
                    self.queue.push_back(PredictionEvent::BatchComplete(finished.ids));
                }
                if halt {
                    self.skip_remaining();
                }
            }
            None => {
                if let Some(finished) = self.active.take() {
                    info!(
                        chunks = finished.chunks,
                        delivered = finished.delivered.len(),
                        expected = finished.ids.len(),
                        dropped = finished.extractor.dropped(),
                        "prediction stream finished"
                    );
                    self.queue.push_back(PredictionEvent::BatchComplete(finished.ids));
                }
            }
        }
    }
}

impl Iterator for PredictionEvents {
    type Item = PredictionEvent;

    fn next(&mut self) -> Option<PredictionEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.active.is_some() {
                self.pump_active();
                continue;
            }
            if !self.open_next_batch() {
                return None;
            }
        }
    }
}
