use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::backend::{AiBackend, StreamRequest, TextStream};
use crate::error::{OracleError, Result};
use crate::fixtures::{
    Fixture, FixtureInfo, FixtureStatus, Goals, LeagueInfo, ScoreBreakdown, Team, Teams,
};
use crate::tips::{BatchPrediction, Prediction, Tip};

const RESULT_CODES: &[&str] = &["W1", "X", "W2"];
const DOUBLE_CHANCE_CODES: &[&str] = &["1X", "12", "2X"];
const GOAL_LINES: &[f32] = &[1.5, 2.5, 3.5];

struct SeedMatch {
    league_id: u32,
    league: &'static str,
    country: &'static str,
    round: &'static str,
    hour: u32,
    home: (u64, &'static str),
    away: (u64, &'static str),
}

const SEED_MATCHES: &[SeedMatch] = &[
    SeedMatch {
        league_id: 39,
        league: "Premier League",
        country: "England",
        round: "Regular Season - 12",
        hour: 14,
        home: (42, "Arsenal"),
        away: (49, "Chelsea"),
    },
    SeedMatch {
        league_id: 39,
        league: "Premier League",
        country: "England",
        round: "Regular Season - 12",
        hour: 16,
        home: (50, "Manchester City"),
        away: (40, "Liverpool"),
    },
    SeedMatch {
        league_id: 39,
        league: "Premier League",
        country: "England",
        round: "Regular Season - 12",
        hour: 19,
        home: (47, "Tottenham"),
        away: (34, "Newcastle"),
    },
    SeedMatch {
        league_id: 39,
        league: "Premier League",
        country: "England",
        round: "Regular Season - 12",
        hour: 19,
        home: (66, "Aston Villa"),
        away: (51, "Brighton"),
    },
    SeedMatch {
        league_id: 140,
        league: "La Liga",
        country: "Spain",
        round: "Regular Season - 13",
        hour: 20,
        home: (541, "Real Madrid"),
        away: (530, "Atletico Madrid"),
    },
    SeedMatch {
        league_id: 140,
        league: "La Liga",
        country: "Spain",
        round: "Regular Season - 13",
        hour: 18,
        home: (529, "Barcelona"),
        away: (548, "Real Sociedad"),
    },
    SeedMatch {
        league_id: 135,
        league: "Serie A",
        country: "Italy",
        round: "Regular Season - 12",
        hour: 19,
        home: (505, "Inter"),
        away: (496, "Juventus"),
    },
    SeedMatch {
        league_id: 98,
        league: "J1 League",
        country: "Japan",
        round: "Regular Season - 30",
        hour: 6,
        home: (287, "Kashima"),
        away: (292, "Urawa"),
    },
];

/// A plausible schedule for `date`; dates before `today` come back finished.
pub fn demo_fixtures(date: NaiveDate, today: NaiveDate) -> Vec<Fixture> {
    let day_seed = date.num_days_from_ce() as u64;
    let mut rng = StdRng::seed_from_u64(day_seed);
    let finished = date < today;

    SEED_MATCHES
        .iter()
        .enumerate()
        .map(|(idx, seed)| {
            let (goals, score) = if finished {
                let ht = (rng.gen_range(0..=2), rng.gen_range(0..=2));
                let ft = (ht.0 + rng.gen_range(0..=2), ht.1 + rng.gen_range(0..=2));
                let goals = Goals {
                    home: Some(ft.0),
                    away: Some(ft.1),
                };
                let score = ScoreBreakdown {
                    halftime: Goals {
                        home: Some(ht.0),
                        away: Some(ht.1),
                    },
                    fulltime: goals,
                    ..ScoreBreakdown::default()
                };
                (goals, Some(score))
            } else {
                (Goals::default(), None)
            };
            let (long, short) = if finished {
                ("Match Finished", "FT")
            } else {
                ("Not Started", "NS")
            };

            Fixture {
                fixture: FixtureInfo {
                    id: day_seed * 100 + idx as u64 + 1,
                    date: format!("{}T{:02}:00:00+00:00", date.format("%Y-%m-%d"), seed.hour),
                    status: FixtureStatus {
                        long: long.to_string(),
                        short: short.to_string(),
                        elapsed: finished.then_some(90),
                    },
                },
                league: LeagueInfo {
                    id: seed.league_id,
                    name: seed.league.to_string(),
                    country: seed.country.to_string(),
                    logo: String::new(),
                    flag: None,
                    season: Some(date.year() as u32),
                    round: seed.round.to_string(),
                },
                teams: Teams {
                    home: Team {
                        id: seed.home.0,
                        name: seed.home.1.to_string(),
                        logo: String::new(),
                    },
                    away: Team {
                        id: seed.away.0,
                        name: seed.away.1.to_string(),
                        logo: String::new(),
                    },
                },
                goals,
                score,
            }
        })
        .collect()
}

/// Offline stand-in for the generative backend.
///
/// Predictions are stable per fixture id; the serialized array is cut into random-size byte
/// chunks so the streaming path sees realistic fragmentation.
#[derive(Debug, Clone)]
pub struct DemoBackend {
    max_chunk: usize,
}

impl DemoBackend {
    pub fn new() -> Self {
        Self { max_chunk: 48 }
    }

    pub fn with_max_chunk(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
        }
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AiBackend for DemoBackend {
    fn stream(&self, request: &StreamRequest) -> Result<TextStream> {
        let items: Vec<BatchPrediction> = request
            .fixtures
            .iter()
            .map(|f| BatchPrediction {
                fixture_id: f.id(),
                prediction: demo_prediction(f),
            })
            .collect();
        let text = serde_json::to_vec_pretty(&items)?;

        let mut rng = rand::thread_rng();
        let mut chunks = Vec::new();
        let mut rest = text.as_slice();
        while !rest.is_empty() {
            let take = rng.gen_range(1..=self.max_chunk).min(rest.len());
            let (head, tail) = rest.split_at(take);
            chunks.push(Ok(head.to_vec()));
            rest = tail;
        }
        Ok(Box::new(chunks.into_iter()))
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        // Echo the text being translated, which is everything after the instruction paragraph.
        prompt
            .split_once("\n\n")
            .map(|(_, body)| format!("[demo translation]\n\n{body}"))
            .ok_or_else(|| OracleError::Backend("demo backend got an empty prompt".to_string()))
    }
}

pub fn demo_prediction(fixture: &Fixture) -> Prediction {
    let mut rng = StdRng::seed_from_u64(fixture.id());
    let home = &fixture.teams.home.name;
    let away = &fixture.teams.away.name;

    let result = RESULT_CODES.choose(&mut rng).copied().unwrap_or("X");
    let chance = DOUBLE_CHANCE_CODES.choose(&mut rng).copied().unwrap_or("1X");
    let line = GOAL_LINES.choose(&mut rng).copied().unwrap_or(2.5);
    let over = if rng.gen_bool(0.5) { "TO" } else { "TU" };

    let safe_tip = Tip::new("Double Chance", chance, rng.gen_range(70..=90));
    let value_tip = Tip::new("Total Goals", format!("{over} {line}"), rng.gen_range(55..=75));
    let tips = vec![
        Tip::new("Match Result", result, rng.gen_range(45..=70)),
        Tip::new("Double Chance", chance, rng.gen_range(65..=85)),
        Tip::new("Total Goals", format!("{over} {line}"), rng.gen_range(55..=75)),
        Tip::new("Total Goals", "TO 0.5", rng.gen_range(80..=95)),
        Tip::new("Total Goals", "TU 4.5", rng.gen_range(75..=92)),
        Tip::new("Match Result", "X", rng.gen_range(20..=35)),
    ];
    let correct_scores = (0..3)
        .map(|_| format!("{}-{}", rng.gen_range(0..=3), rng.gen_range(0..=3)))
        .collect();

    Prediction {
        safe_tip,
        value_tip,
        tips,
        analysis: format!(
            "### KP Horary Reading\n\n**{home}** holds the 1st cusp, **{away}** the 7th. \
             The 6th and 11th house significators lean towards `{result}`, \
             while the 2nd and 5th cusps suggest a `{over} {line}` goal count.\n\n\
             *Demo analysis generated offline.*"
        ),
        correct_scores,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{demo_fixtures, demo_prediction};

    #[test]
    fn past_dates_are_finished_and_ids_unique() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).expect("date");
        let past = demo_fixtures(NaiveDate::from_ymd_opt(2025, 5, 9).expect("date"), today);
        assert!(past.iter().all(|f| f.is_finished() && f.final_score().is_some()));
        let upcoming = demo_fixtures(today, today);
        assert!(upcoming.iter().all(|f| !f.is_finished()));
        let mut ids: Vec<_> = past.iter().chain(upcoming.iter()).map(|f| f.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), past.len() + upcoming.len());
    }

    #[test]
    fn predictions_are_stable_per_fixture() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).expect("date");
        let fixture = &demo_fixtures(today, today)[0];
        assert_eq!(demo_prediction(fixture), demo_prediction(fixture));
        assert_eq!(demo_prediction(fixture).correct_scores.len(), 3);
    }
}
