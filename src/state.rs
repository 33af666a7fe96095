use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{Duration as ChronoDuration, NaiveDate};

use crate::fixtures::{Fixture, FixtureId, league_labels};
use crate::quota::UsageInfo;
use crate::store::{NO_PREDICTION_MESSAGE, PredictionState, PredictionStore};
use crate::tips::BatchPrediction;

const MAX_LOGS: usize = 200;

/// Identifies one analysis run and the store epoch it was claimed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTag {
    pub id: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    /// `epoch` is the store epoch after the reset that triggered the fetch; analyses claimed
    /// under older epochs can be abandoned.
    FetchFixtures {
        date: NaiveDate,
        force: bool,
        epoch: u64,
    },
    Analyze { request: RequestTag, fixtures: Vec<Fixture> },
    Translate { id: FixtureId, text: String },
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetFixtures {
        date: NaiveDate,
        fixtures: Vec<Fixture>,
    },
    Prediction {
        request: RequestTag,
        prediction: BatchPrediction,
    },
    PredictionError {
        request: RequestTag,
        message: String,
        quota_exhausted: bool,
    },
    BatchComplete {
        request: RequestTag,
        ids: Vec<FixtureId>,
    },
    AnalysisFinished {
        request: RequestTag,
    },
    SetTranslation {
        id: FixtureId,
        text: String,
    },
    SetUsage(UsageInfo),
    Log(String),
}

#[derive(Debug, Clone, Default)]
struct AnalysisRun {
    last_error: Option<String>,
    halted: bool,
}

#[derive(Debug)]
pub struct AppState {
    pub date: NaiveDate,
    pub today: NaiveDate,
    pub fixtures: Vec<Fixture>,
    pub fixtures_loading: bool,
    pub leagues: Vec<String>,
    /// Index into `leagues`; `None` shows every league.
    pub league_filter: Option<usize>,
    pub selected: usize,
    pub predictions: PredictionStore,
    pub translations: HashMap<FixtureId, String>,
    pub translating: HashSet<FixtureId>,
    pub show_translation: bool,
    pub usage: Option<UsageInfo>,
    pub quota_reached: bool,
    pub banner: Option<String>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    /// Usage day on which the backend refused a request for quota reasons.
    backend_quota_day: Option<NaiveDate>,
    runs: HashMap<RequestTag, AnalysisRun>,
    next_request_id: u64,
}

impl AppState {
    pub fn new(date: NaiveDate, today: NaiveDate) -> Self {
        Self {
            date,
            today,
            fixtures: Vec::new(),
            fixtures_loading: true,
            leagues: Vec::new(),
            league_filter: None,
            selected: 0,
            predictions: PredictionStore::new(),
            translations: HashMap::new(),
            translating: HashSet::new(),
            show_translation: false,
            usage: None,
            quota_reached: false,
            banner: None,
            logs: VecDeque::new(),
            help_overlay: false,
            backend_quota_day: None,
            runs: HashMap::new(),
            next_request_id: 1,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn league_filter_label(&self) -> &str {
        self.league_filter
            .and_then(|idx| self.leagues.get(idx))
            .map(String::as_str)
            .unwrap_or("All leagues")
    }

    pub fn filtered_fixtures(&self) -> Vec<&Fixture> {
        let label = self.league_filter.and_then(|idx| self.leagues.get(idx));
        self.fixtures
            .iter()
            .filter(|f| label.is_none_or(|l| f.league_label() == *l))
            .collect()
    }

    pub fn selected_fixture(&self) -> Option<&Fixture> {
        self.filtered_fixtures().get(self.selected).copied()
    }

    pub fn prediction_for(&self, id: FixtureId) -> Option<&PredictionState> {
        self.predictions.get(id)
    }

    pub fn select_next(&mut self) {
        let len = self.filtered_fixtures().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn cycle_league_filter(&mut self) {
        self.league_filter = match self.league_filter {
            None if !self.leagues.is_empty() => Some(0),
            Some(idx) if idx + 1 < self.leagues.len() => Some(idx + 1),
            _ => None,
        };
        self.selected = 0;
    }

    /// Moves to another day. Predictions belong to the day they were made for.
    pub fn shift_date(&mut self, days: i64) -> ProviderCommand {
        self.date += ChronoDuration::days(days);
        self.reset_day();
        self.fetch_command(false)
    }

    /// Manual refresh: bypass the fixture cache and drop every prediction.
    pub fn refresh(&mut self) -> ProviderCommand {
        self.reset_day();
        self.fetch_command(true)
    }

    pub fn fetch_command(&self, force: bool) -> ProviderCommand {
        ProviderCommand::FetchFixtures {
            date: self.date,
            force,
            epoch: self.predictions.epoch(),
        }
    }

    fn reset_day(&mut self) {
        self.predictions.clear_all();
        self.runs.clear();
        self.translations.clear();
        self.translating.clear();
        self.fixtures.clear();
        self.leagues.clear();
        self.league_filter = None;
        self.selected = 0;
        self.fixtures_loading = true;
        self.banner = None;
    }

    /// Claims the selected fixture's league for analysis.
    ///
    /// Only fixtures that are neither pending nor resolved are claimed, so a fixture is never
    /// part of two in-flight requests.
    pub fn begin_league_analysis(&mut self) -> Option<ProviderCommand> {
        if self.quota_reached {
            self.banner = Some(crate::error::QUOTA_EXHAUSTED_MESSAGE.to_string());
            self.push_log("[WARN] Daily analysis limit reached");
            return None;
        }
        let label = self.selected_fixture()?.league_label();
        let league: Vec<Fixture> = self
            .fixtures
            .iter()
            .filter(|f| f.league_label() == label)
            .cloned()
            .collect();
        self.begin_analysis(league)
    }

    pub fn begin_analysis(&mut self, fixtures: Vec<Fixture>) -> Option<ProviderCommand> {
        let claimed: HashSet<FixtureId> = self
            .predictions
            .claim(fixtures.iter().map(Fixture::id))
            .into_iter()
            .collect();
        if claimed.is_empty() {
            self.push_log("[INFO] Nothing to analyze");
            return None;
        }
        let fixtures: Vec<Fixture> = fixtures
            .into_iter()
            .filter(|f| claimed.contains(&f.id()))
            .collect();

        let request = RequestTag {
            id: self.next_request_id,
            epoch: self.predictions.epoch(),
        };
        self.next_request_id += 1;
        self.runs.insert(request, AnalysisRun::default());
        self.push_log(format!(
            "[INFO] Analyzing {} fixture(s) (request #{})",
            fixtures.len(),
            request.id
        ));
        Some(ProviderCommand::Analyze { request, fixtures })
    }

    /// Requests a translation of the selected fixture's analysis, or toggles the view back.
    pub fn toggle_translation(&mut self) -> Option<ProviderCommand> {
        let fixture = self.selected_fixture()?;
        let id = fixture.id();
        if self.translations.contains_key(&id) {
            self.show_translation = !self.show_translation;
            return None;
        }
        let text = self
            .predictions
            .get(id)
            .and_then(|s| s.result.as_ref())
            .map(|p| p.analysis.clone())?;
        if !self.translating.insert(id) {
            return None;
        }
        self.show_translation = true;
        Some(ProviderCommand::Translate { id, text })
    }

    fn is_current(&self, request: &RequestTag) -> bool {
        request.epoch == self.predictions.epoch()
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetFixtures { date, fixtures } => {
            if date != state.date {
                return;
            }
            let previous = state.league_filter_label().to_string();
            state.leagues = league_labels(&fixtures);
            state.league_filter = state.leagues.iter().position(|l| *l == previous);
            state.fixtures = fixtures;
            state.fixtures_loading = false;
            let len = state.filtered_fixtures().len();
            state.selected = state.selected.min(len.saturating_sub(1));
            state.push_log(format!(
                "[INFO] {} fixture(s) for {}",
                state.fixtures.len(),
                date.format("%Y-%m-%d")
            ));
        }
        Delta::Prediction {
            request,
            prediction,
        } => {
            if !state.is_current(&request) {
                return;
            }
            let id = prediction.fixture_id;
            if state.predictions.set_resolved(id, prediction.prediction) {
                state.push_log(format!("[INFO] Prediction ready for #{id}"));
            }
        }
        Delta::PredictionError {
            request,
            message,
            quota_exhausted,
        } => {
            if quota_exhausted {
                state.backend_quota_day =
                    Some(state.usage.map_or(state.today, |usage| usage.day));
                state.quota_reached = true;
                state.banner = Some(message.clone());
            }
            if !state.is_current(&request) {
                return;
            }
            state.push_log(format!("[WARN] {message}"));
            if let Some(run) = state.runs.get_mut(&request) {
                run.last_error = Some(message);
                run.halted |= quota_exhausted;
            }
        }
        Delta::BatchComplete { request, ids } => {
            if !state.is_current(&request) {
                return;
            }
            let message = match state.runs.get_mut(&request) {
                Some(run) => {
                    let message = run
                        .last_error
                        .clone()
                        .unwrap_or_else(|| NO_PREDICTION_MESSAGE.to_string());
                    if !run.halted {
                        run.last_error = None;
                    }
                    message
                }
                None => NO_PREDICTION_MESSAGE.to_string(),
            };
            let failed = state.predictions.reconcile_stale(&ids, &message);
            if failed > 0 {
                state.push_log(format!("[WARN] {failed} fixture(s) without prediction"));
            }
        }
        Delta::AnalysisFinished { request } => {
            state.runs.remove(&request);
        }
        Delta::SetTranslation { id, text } => {
            // Not in flight any more: the day was reset while translating.
            if !state.translating.remove(&id) {
                return;
            }
            state.translations.insert(id, text);
        }
        Delta::SetUsage(info) => {
            if state.backend_quota_day.is_some_and(|day| info.day > day) {
                state.backend_quota_day = None;
                state.banner = None;
                state.push_log("[INFO] Usage window reset");
            }
            state.quota_reached = state.backend_quota_day.is_some() || info.remaining == 0;
            state.usage = Some(info);
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
