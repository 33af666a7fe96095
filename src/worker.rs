use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::backend::{AiBackend, GeminiBackend};
use crate::config::{FixtureSource, FootballConfig, OracleConfig};
use crate::demo_backend::{DemoBackend, demo_fixtures};
use crate::error::OracleError;
use crate::fixture_fetch::{clear_cache_for_date, fetch_daily_fixtures};
use crate::fixtures::{Fixture, FixtureId, prepare_fixtures};
use crate::orchestrator::{Orchestrator, PredictionSink};
use crate::quota::{FileUsageStore, QuotaGate, SystemClock, UsageTracker};
use crate::state::{Delta, ProviderCommand, RequestTag};
use crate::tips::BatchPrediction;
use crate::translate::translate_analysis;

/// Forwards orchestrator callbacks to the UI thread, tagged with their request.
pub struct ChannelSink {
    tx: Sender<Delta>,
    request: RequestTag,
}

impl ChannelSink {
    pub fn new(tx: Sender<Delta>, request: RequestTag) -> Self {
        Self { tx, request }
    }
}

impl PredictionSink for ChannelSink {
    fn on_prediction(&mut self, prediction: BatchPrediction) {
        let _ = self.tx.send(Delta::Prediction {
            request: self.request,
            prediction,
        });
    }

    fn on_error(&mut self, error: &OracleError) {
        let _ = self.tx.send(Delta::PredictionError {
            request: self.request,
            message: error.user_message().to_string(),
            quota_exhausted: error.is_quota_exhausted(),
        });
    }

    fn on_complete(&mut self, batch: &[FixtureId]) {
        let _ = self.tx.send(Delta::BatchComplete {
            request: self.request,
            ids: batch.to_vec(),
        });
    }
}

/// How often the usage counter is re-sent, so a quota day rollover reaches the UI.
const USAGE_REFRESH: Duration = Duration::from_secs(60);

/// Runs one analysis request, stopping between events once `live_epoch` has moved past the
/// request's epoch. Batches not yet opened are never sent, so they cost no quota.
pub fn run_analysis(
    orchestrator: &Orchestrator,
    request: RequestTag,
    fixtures: &[Fixture],
    tx: &Sender<Delta>,
    live_epoch: &AtomicU64,
) {
    let mut sink = ChannelSink::new(tx.clone(), request);
    let mut events = orchestrator.events(fixtures);
    loop {
        if live_epoch.load(Ordering::Acquire) > request.epoch {
            info!(request = request.id, "abandoning analysis for a cleared day");
            return;
        }
        let Some(event) = events.next() else {
            return;
        };
        sink.deliver(event);
    }
}

pub fn select_backend(cfg: &OracleConfig) -> Arc<dyn AiBackend> {
    match GeminiBackend::from_config(&cfg.gemini) {
        Ok(backend) => {
            info!(model = %cfg.gemini.model, "using gemini backend");
            Arc::new(backend)
        }
        Err(err) => {
            warn!(error = %err, "falling back to demo backend");
            Arc::new(DemoBackend::new())
        }
    }
}

pub fn load_fixtures(
    cfg: &FootballConfig,
    date: NaiveDate,
    today: NaiveDate,
    force: bool,
) -> Result<Vec<Fixture>> {
    let raw = match cfg.source {
        FixtureSource::Demo => demo_fixtures(date, today),
        FixtureSource::Api => {
            if force {
                clear_cache_for_date(date);
            }
            fetch_daily_fixtures(cfg, date, today)?
        }
    };
    Ok(prepare_fixtures(raw))
}

/// Starts the provider threads. Analyses run one at a time on their own thread so a long
/// stream never blocks fixture loading.
pub fn spawn_provider(cfg: OracleConfig, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let backend = select_backend(&cfg);
        let tracker = Arc::new(UsageTracker::new(
            FileUsageStore::open(),
            SystemClock,
            cfg.usage_limit,
        ));
        let quota: Arc<dyn QuotaGate> = tracker.clone();
        let orchestrator = Orchestrator::new(Arc::clone(&backend), quota, cfg.batch_size);
        let _ = tx.send(Delta::SetUsage(tracker.usage_info()));
        let live_epoch = Arc::new(AtomicU64::new(0));

        let (analyze_tx, analyze_rx) = mpsc::channel::<(RequestTag, Vec<Fixture>)>();
        {
            let tx = tx.clone();
            let tracker = Arc::clone(&tracker);
            let live_epoch = Arc::clone(&live_epoch);
            thread::spawn(move || {
                for (request, fixtures) in analyze_rx {
                    run_analysis(&orchestrator, request, &fixtures, &tx, &live_epoch);
                    let _ = tx.send(Delta::AnalysisFinished { request });
                    let _ = tx.send(Delta::SetUsage(tracker.usage_info()));
                }
            });
        }

        loop {
            let cmd = match cmd_rx.recv_timeout(USAGE_REFRESH) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => {
                    let _ = tx.send(Delta::SetUsage(tracker.usage_info()));
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match cmd {
                ProviderCommand::FetchFixtures { date, force, epoch } => {
                    if live_epoch.fetch_max(epoch, Ordering::AcqRel) < epoch {
                        debug!(epoch, "predictions cleared, stale analyses will stop");
                    }
                    let today = Local::now().date_naive();
                    match load_fixtures(&cfg.football, date, today, force) {
                        Ok(fixtures) => {
                            let _ = tx.send(Delta::SetFixtures { date, fixtures });
                        }
                        Err(err) => {
                            warn!(error = %err, %date, "fixture fetch failed");
                            let _ = tx.send(Delta::Log(format!("[WARN] Fixtures error: {err}")));
                            let _ = tx.send(Delta::SetFixtures {
                                date,
                                fixtures: Vec::new(),
                            });
                        }
                    }
                }
                ProviderCommand::Analyze { request, fixtures } => {
                    if analyze_tx.send((request, fixtures)).is_err() {
                        warn!("analysis thread is gone");
                    }
                }
                ProviderCommand::Translate { id, text } => {
                    let tx = tx.clone();
                    let backend = Arc::clone(&backend);
                    let language = cfg.translate_language.clone();
                    thread::spawn(move || {
                        let text = translate_analysis(backend.as_ref(), &text, &language);
                        let _ = tx.send(Delta::SetTranslation { id, text });
                    });
                }
            }
        }
    });
}
