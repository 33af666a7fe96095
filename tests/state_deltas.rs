use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc;

use chrono::NaiveDate;
use kp_oracle::demo_backend::{DemoBackend, demo_fixtures, demo_prediction};
use kp_oracle::error::{GENERIC_FAILURE_MESSAGE, QUOTA_EXHAUSTED_MESSAGE};
use kp_oracle::fixtures::{Fixture, prepare_fixtures};
use kp_oracle::orchestrator::Orchestrator;
use kp_oracle::quota::{MemoryUsageStore, SystemClock, UsageInfo, UsageTracker};
use kp_oracle::state::{AppState, Delta, ProviderCommand, RequestTag, apply_delta};
use kp_oracle::store::{NO_PREDICTION_MESSAGE, PredictionPhase};
use kp_oracle::tips::BatchPrediction;
use kp_oracle::worker::{ChannelSink, run_analysis};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 12).expect("date")
}

fn loaded_state() -> AppState {
    let mut state = AppState::new(day(), day());
    apply_delta(
        &mut state,
        Delta::SetFixtures {
            date: day(),
            fixtures: prepare_fixtures(demo_fixtures(day(), day())),
        },
    );
    state
}

fn start_analysis(state: &mut AppState) -> (RequestTag, Vec<Fixture>) {
    match state.begin_league_analysis() {
        Some(ProviderCommand::Analyze { request, fixtures }) => (request, fixtures),
        other => panic!("expected an analyze command, got {other:?}"),
    }
}

fn prediction_delta(request: RequestTag, fixture: &Fixture) -> Delta {
    Delta::Prediction {
        request,
        prediction: BatchPrediction {
            fixture_id: fixture.id(),
            prediction: demo_prediction(fixture),
        },
    }
}

fn phase(state: &AppState, fixture: &Fixture) -> Option<PredictionPhase> {
    state.prediction_for(fixture.id()).map(|p| p.phase())
}

#[test]
fn set_fixtures_builds_league_list() {
    let state = loaded_state();
    assert!(!state.fixtures_loading);
    assert_eq!(state.fixtures.len(), 8);
    assert_eq!(state.leagues[0], "Premier League - England");
    assert_eq!(state.filtered_fixtures().len(), 8);
}

#[test]
fn fixtures_for_another_day_are_ignored() {
    let mut state = loaded_state();
    let other = day().succ_opt().expect("date");
    apply_delta(
        &mut state,
        Delta::SetFixtures {
            date: other,
            fixtures: Vec::new(),
        },
    );
    assert_eq!(state.fixtures.len(), 8);
}

#[test]
fn league_filter_cycles_through_labels() {
    let mut state = loaded_state();
    state.cycle_league_filter();
    assert_eq!(state.league_filter_label(), "Premier League - England");
    assert_eq!(state.filtered_fixtures().len(), 4);
    for _ in 1..state.leagues.len() {
        state.cycle_league_filter();
    }
    state.cycle_league_filter();
    assert_eq!(state.league_filter, None);
}

#[test]
fn analysis_claims_league_once() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    assert_eq!(fixtures.len(), 4);
    assert!(
        fixtures
            .iter()
            .all(|f| f.league_label() == "Premier League - England")
    );
    assert_eq!(request.epoch, state.predictions.epoch());
    assert_eq!(state.predictions.pending_count(), 4);

    // Still in flight, so a second press has nothing to claim.
    assert!(state.begin_league_analysis().is_none());
}

#[test]
fn predictions_resolve_and_missing_ones_fail() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);

    apply_delta(&mut state, prediction_delta(request, &fixtures[1]));
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: fixtures.iter().map(Fixture::id).collect(),
        },
    );

    assert_eq!(phase(&state, &fixtures[1]), Some(PredictionPhase::Resolved));
    let missing = state.prediction_for(fixtures[0].id()).expect("state");
    assert_eq!(missing.phase(), PredictionPhase::Failed);
    assert_eq!(missing.error.as_deref(), Some(NO_PREDICTION_MESSAGE));

    // Failed fixtures are claimable again; resolved ones are not.
    let (_, retry) = start_analysis(&mut state);
    assert_eq!(retry.len(), 3);
    assert!(retry.iter().all(|f| f.id() != fixtures[1].id()));
}

#[test]
fn transport_error_message_applies_to_its_batch_only() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    let ids: Vec<u64> = fixtures.iter().map(Fixture::id).collect();

    apply_delta(
        &mut state,
        Delta::PredictionError {
            request,
            message: GENERIC_FAILURE_MESSAGE.to_string(),
            quota_exhausted: false,
        },
    );
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: ids[..2].to_vec(),
        },
    );
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: ids[2..].to_vec(),
        },
    );

    let error = |id: u64| {
        state
            .prediction_for(id)
            .and_then(|p| p.error.clone())
            .unwrap_or_default()
    };
    assert_eq!(error(ids[0]), GENERIC_FAILURE_MESSAGE);
    assert_eq!(error(ids[1]), GENERIC_FAILURE_MESSAGE);
    assert_eq!(error(ids[2]), NO_PREDICTION_MESSAGE);
}

#[test]
fn quota_exhaustion_blocks_further_analysis() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    let ids: Vec<u64> = fixtures.iter().map(Fixture::id).collect();

    apply_delta(
        &mut state,
        Delta::PredictionError {
            request,
            message: QUOTA_EXHAUSTED_MESSAGE.to_string(),
            quota_exhausted: true,
        },
    );
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: ids[..3].to_vec(),
        },
    );
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: ids[3..].to_vec(),
        },
    );
    for id in &ids {
        let entry = state.prediction_for(*id).expect("state");
        assert_eq!(entry.error.as_deref(), Some(QUOTA_EXHAUSTED_MESSAGE));
    }

    assert!(state.quota_reached);
    assert!(state.begin_league_analysis().is_none());
    assert_eq!(state.banner.as_deref(), Some(QUOTA_EXHAUSTED_MESSAGE));
}

fn usage(day: NaiveDate, used: u32) -> Delta {
    Delta::SetUsage(UsageInfo {
        day,
        used,
        remaining: 50 - used,
        limit: 50,
    })
}

fn hit_backend_quota(state: &mut AppState) {
    let (request, fixtures) = start_analysis(state);
    apply_delta(
        state,
        Delta::PredictionError {
            request,
            message: QUOTA_EXHAUSTED_MESSAGE.to_string(),
            quota_exhausted: true,
        },
    );
    apply_delta(
        state,
        Delta::BatchComplete {
            request,
            ids: fixtures.iter().map(Fixture::id).collect(),
        },
    );
    apply_delta(state, Delta::AnalysisFinished { request });
}

#[test]
fn backend_quota_outlives_the_usage_refresh() {
    let mut state = loaded_state();
    apply_delta(&mut state, usage(day(), 0));
    hit_backend_quota(&mut state);
    apply_delta(&mut state, usage(day(), 1));

    assert!(state.quota_reached);
    assert!(state.begin_league_analysis().is_none());

    // Moving to another fixture day does not reset the usage window.
    let _ = state.shift_date(1);
    apply_delta(&mut state, usage(day(), 1));
    assert!(state.quota_reached);
}

#[test]
fn backend_quota_clears_when_usage_day_rolls_over() {
    let mut state = loaded_state();
    apply_delta(&mut state, usage(day(), 0));
    hit_backend_quota(&mut state);

    apply_delta(&mut state, usage(day().succ_opt().expect("date"), 0));
    assert!(!state.quota_reached);
    assert!(state.banner.is_none());
    assert!(state.begin_league_analysis().is_some());
}

#[test]
fn usage_update_toggles_quota_flag() {
    let mut state = loaded_state();
    apply_delta(
        &mut state,
        Delta::SetUsage(UsageInfo {
            day: day(),
            used: 50,
            remaining: 0,
            limit: 50,
        }),
    );
    assert!(state.quota_reached);
    apply_delta(
        &mut state,
        Delta::SetUsage(UsageInfo {
            day: day(),
            used: 0,
            remaining: 50,
            limit: 50,
        }),
    );
    assert!(!state.quota_reached);
}

#[test]
fn deltas_from_before_a_refresh_are_dropped() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    let cmd = state.refresh();
    assert!(matches!(cmd, ProviderCommand::FetchFixtures { force: true, .. }));
    assert!(state.predictions.is_empty());

    apply_delta(
        &mut state,
        Delta::SetFixtures {
            date: day(),
            fixtures: prepare_fixtures(demo_fixtures(day(), day())),
        },
    );
    apply_delta(&mut state, prediction_delta(request, &fixtures[0]));
    apply_delta(
        &mut state,
        Delta::BatchComplete {
            request,
            ids: fixtures.iter().map(Fixture::id).collect(),
        },
    );
    assert!(state.predictions.is_empty());
}

#[test]
fn changing_day_clears_predictions() {
    let mut state = loaded_state();
    start_analysis(&mut state);
    match state.shift_date(1) {
        ProviderCommand::FetchFixtures { date, force, epoch } => {
            assert_eq!(Some(date), day().succ_opt());
            assert!(!force);
            assert_eq!(epoch, state.predictions.epoch());
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert!(state.predictions.is_empty());
    assert!(state.fixtures_loading);
}

#[test]
fn channel_sink_drives_state_to_resolved() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);

    let gate = Arc::new(UsageTracker::new(
        MemoryUsageStore::default(),
        SystemClock,
        50,
    ));
    let orch = Orchestrator::new(Arc::new(DemoBackend::with_max_chunk(7)), gate.clone(), 3);
    let (tx, rx) = mpsc::channel();
    let mut sink = ChannelSink::new(tx, request);
    orch.request_predictions(&fixtures, &mut sink);
    drop(sink);

    for delta in rx {
        apply_delta(&mut state, delta);
    }
    for fixture in &fixtures {
        assert_eq!(phase(&state, fixture), Some(PredictionPhase::Resolved));
    }
    assert_eq!(state.predictions.pending_count(), 0);
    assert_eq!(gate.usage_info().used, 2);
}

#[test]
fn stale_analysis_stops_before_sending_batches() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    let live_epoch = match state.refresh() {
        ProviderCommand::FetchFixtures { epoch, .. } => AtomicU64::new(epoch),
        other => panic!("unexpected command {other:?}"),
    };

    let gate = Arc::new(UsageTracker::new(
        MemoryUsageStore::default(),
        SystemClock,
        50,
    ));
    let orch = Orchestrator::new(Arc::new(DemoBackend::new()), gate.clone(), 3);
    let (tx, rx) = mpsc::channel();
    run_analysis(&orch, request, &fixtures, &tx, &live_epoch);
    drop(tx);

    assert_eq!(rx.iter().count(), 0);
    assert_eq!(gate.usage_info().used, 0);
}

#[test]
fn current_analysis_runs_every_batch() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    let live_epoch = AtomicU64::new(state.predictions.epoch());

    let gate = Arc::new(UsageTracker::new(
        MemoryUsageStore::default(),
        SystemClock,
        50,
    ));
    let orch = Orchestrator::new(Arc::new(DemoBackend::new()), gate.clone(), 3);
    let (tx, rx) = mpsc::channel();
    run_analysis(&orch, request, &fixtures, &tx, &live_epoch);
    drop(tx);

    for delta in rx {
        apply_delta(&mut state, delta);
    }
    assert_eq!(gate.usage_info().used, 2);
    assert_eq!(state.predictions.pending_count(), 0);
}

#[test]
fn translation_after_reset_is_dropped() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    apply_delta(&mut state, prediction_delta(request, &fixtures[0]));
    assert!(state.toggle_translation().is_some());

    let _ = state.refresh();
    apply_delta(
        &mut state,
        Delta::SetTranslation {
            id: fixtures[0].id(),
            text: "late".to_string(),
        },
    );
    assert!(state.translations.is_empty());
}

#[test]
fn translation_toggles_after_first_fetch() {
    let mut state = loaded_state();
    let (request, fixtures) = start_analysis(&mut state);
    apply_delta(&mut state, prediction_delta(request, &fixtures[0]));
    assert_eq!(state.selected_fixture().map(Fixture::id), Some(fixtures[0].id()));

    let cmd = state.toggle_translation();
    assert!(matches!(cmd, Some(ProviderCommand::Translate { .. })));
    // A second press while the first is running sends nothing.
    assert!(state.toggle_translation().is_none());

    apply_delta(
        &mut state,
        Delta::SetTranslation {
            id: fixtures[0].id(),
            text: "translated".to_string(),
        },
    );
    assert!(state.show_translation);
    assert!(state.toggle_translation().is_none());
    assert!(!state.show_translation);
}

#[test]
fn logs_are_capped() {
    let mut state = AppState::new(day(), day());
    for i in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] line 249"));
}
