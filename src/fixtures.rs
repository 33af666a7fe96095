use std::cmp::Ordering;
use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub type FixtureId = u64;

// Ordered by importance; this order decides the position of a league in the list.
pub const PREFERRED_LEAGUE_IDS: &[u32] = &[
    1,   // World Cup
    4,   // Africa Cup of Nations
    2,   // UEFA Champions League
    13,  // Copa Libertadores
    3,   // UEFA Europa League
    21,  // AFC Champions League
    11,  // Copa Sudamericana
    848, // UEFA Conference League
    39,  // Premier League
    45,  // FA Cup
    48,  // League Cup
    140, // La Liga
    143, // Copa del Rey
    135, // Serie A
    78,  // Bundesliga
    61,  // Ligue 1
    94,  // Primeira Liga
    88,  // Eredivisie
    71,  // Brazil Serie A
    128, // Liga Profesional
    253, // MLS
    292, // Saudi Pro League
    98,  // J1 League
];

const CONTINENT_ORDER: &[&str] = &["World", "Europe", "Americas", "Asia", "Africa", "Oceania"];

const COUNTRY_CONTINENTS: &[(&str, &str)] = &[
    ("World", "World"),
    ("England", "Europe"),
    ("Spain", "Europe"),
    ("Italy", "Europe"),
    ("Germany", "Europe"),
    ("France", "Europe"),
    ("Netherlands", "Europe"),
    ("Portugal", "Europe"),
    ("Belgium", "Europe"),
    ("Scotland", "Europe"),
    ("Turkey", "Europe"),
    ("Russia", "Europe"),
    ("Greece", "Europe"),
    ("Switzerland", "Europe"),
    ("Austria", "Europe"),
    ("Denmark", "Europe"),
    ("Norway", "Europe"),
    ("Sweden", "Europe"),
    ("Poland", "Europe"),
    ("Ukraine", "Europe"),
    ("Croatia", "Europe"),
    ("Czech-Republic", "Europe"),
    ("Romania", "Europe"),
    ("Serbia", "Europe"),
    ("Ireland", "Europe"),
    ("Wales", "Europe"),
    ("Northern-Ireland", "Europe"),
    ("Finland", "Europe"),
    ("Iceland", "Europe"),
    ("Hungary", "Europe"),
    ("Slovakia", "Europe"),
    ("Slovenia", "Europe"),
    ("Bosnia-And-Herzegovina", "Europe"),
    ("Albania", "Europe"),
    ("Georgia", "Europe"),
    ("Cyprus", "Europe"),
    ("Israel", "Europe"),
    ("Kazakhstan", "Europe"),
    ("Azerbaijan", "Europe"),
    ("Armenia", "Europe"),
    ("Brazil", "Americas"),
    ("Argentina", "Americas"),
    ("Colombia", "Americas"),
    ("Chile", "Americas"),
    ("Uruguay", "Americas"),
    ("Paraguay", "Americas"),
    ("Ecuador", "Americas"),
    ("Peru", "Americas"),
    ("Bolivia", "Americas"),
    ("Venezuela", "Americas"),
    ("USA", "Americas"),
    ("Mexico", "Americas"),
    ("Canada", "Americas"),
    ("Costa-Rica", "Americas"),
    ("Honduras", "Americas"),
    ("Jamaica", "Americas"),
    ("Japan", "Asia"),
    ("Saudi-Arabia", "Asia"),
    ("South-Korea", "Asia"),
    ("Qatar", "Asia"),
    ("Iran", "Asia"),
    ("Australia", "Asia"),
    ("China", "Asia"),
    ("United-Arab-Emirates", "Asia"),
    ("Uzbekistan", "Asia"),
    ("Thailand", "Asia"),
    ("Vietnam", "Asia"),
    ("Malaysia", "Asia"),
    ("India", "Asia"),
    ("Indonesia", "Asia"),
    ("Egypt", "Africa"),
    ("Morocco", "Africa"),
    ("Nigeria", "Africa"),
    ("Senegal", "Africa"),
    ("Algeria", "Africa"),
    ("Tunisia", "Africa"),
    ("Cameroon", "Africa"),
    ("Ghana", "Africa"),
    ("Ivory-Coast", "Africa"),
    ("South-Africa", "Africa"),
    ("DR-Congo", "Africa"),
    ("New-Zealand", "Oceania"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub fixture: FixtureInfo,
    pub league: LeagueInfo,
    pub teams: Teams,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub score: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureInfo {
    pub id: FixtureId,
    /// RFC 3339 kickoff timestamp.
    pub date: String,
    pub status: FixtureStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureStatus {
    #[serde(default)]
    pub long: String,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub elapsed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueInfo {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub round: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teams {
    pub home: Team,
    pub away: Team,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub logo: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goals {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

impl Goals {
    pub fn pair(&self) -> Option<(u32, u32)> {
        Some((self.home?, self.away?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub halftime: Goals,
    #[serde(default)]
    pub fulltime: Goals,
    #[serde(default)]
    pub extratime: Goals,
    #[serde(default)]
    pub penalty: Goals,
}

/// Final score plus the half-time snapshot when the provider reported one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreLine {
    pub home: u32,
    pub away: u32,
    pub halftime: Option<(u32, u32)>,
}

impl ScoreLine {
    pub fn new(home: u32, away: u32) -> Self {
        Self {
            home,
            away,
            halftime: None,
        }
    }

    pub fn with_halftime(mut self, home: u32, away: u32) -> Self {
        self.halftime = Some((home, away));
        self
    }
}

impl Fixture {
    pub fn id(&self) -> FixtureId {
        self.fixture.id
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.fixture.status.short.as_str(), "FT" | "AET" | "PEN")
    }

    /// `"name - country"`, the grouping key used by the league filter.
    pub fn league_label(&self) -> String {
        format!("{} - {}", self.league.name, self.league.country)
    }

    pub fn kickoff(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.fixture.date).ok()
    }

    pub fn final_score(&self) -> Option<ScoreLine> {
        let (home, away) = self.goals.pair()?;
        let halftime = self.score.as_ref().and_then(|s| s.halftime.pair());
        Some(ScoreLine {
            home,
            away,
            halftime,
        })
    }

    pub fn copy_text(&self) -> String {
        let date = self
            .kickoff()
            .map(|k| k.format("%-d %b %Y").to_string())
            .unwrap_or_else(|| self.fixture.date.clone());
        format!(
            "{date}, KP Astrology Prediction, {} vs {}.",
            self.teams.home.name, self.teams.away.name
        )
    }
}

#[derive(Debug, Deserialize)]
struct FixturesResponse {
    #[serde(default)]
    response: Vec<Fixture>,
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let parsed: FixturesResponse =
        serde_json::from_str(trimmed).context("invalid fixtures json")?;
    Ok(parsed.response)
}

/// Drops youth and women's competitions and orders the rest for display.
pub fn prepare_fixtures(fixtures: Vec<Fixture>) -> Vec<Fixture> {
    let mut kept: Vec<Fixture> = fixtures
        .into_iter()
        .filter(|f| !is_excluded_competition(&f.league.name) && !is_excluded_competition(&f.league.round))
        .collect();
    kept.sort_by(compare_fixtures);
    kept
}

pub fn league_labels(fixtures: &[Fixture]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut labels = Vec::new();
    for fixture in fixtures {
        let label = fixture.league_label();
        if seen.insert(label.clone()) {
            labels.push(label);
        }
    }
    labels
}

pub fn continent_for(country: &str) -> &'static str {
    let normalized = country.split_whitespace().collect::<Vec<_>>().join("-");
    COUNTRY_CONTINENTS
        .iter()
        .find(|(c, _)| *c == normalized)
        .map(|(_, continent)| *continent)
        .unwrap_or("Others")
}

fn compare_fixtures(a: &Fixture, b: &Fixture) -> Ordering {
    let rank_a = preferred_rank(a.league.id);
    let rank_b = preferred_rank(b.league.id);
    match (rank_a, rank_b) {
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (Some(x), Some(y)) if x != y => return x.cmp(&y),
        _ => {}
    }

    let cont_a = continent_rank(&a.league.country);
    let cont_b = continent_rank(&b.league.country);
    if cont_a != cont_b {
        return cont_a.cmp(&cont_b);
    }

    a.league
        .name
        .cmp(&b.league.name)
        .then_with(|| a.kickoff().cmp(&b.kickoff()))
}

fn preferred_rank(league_id: u32) -> Option<usize> {
    PREFERRED_LEAGUE_IDS.iter().position(|id| *id == league_id)
}

fn continent_rank(country: &str) -> usize {
    let continent = continent_for(country);
    CONTINENT_ORDER
        .iter()
        .position(|c| *c == continent)
        .unwrap_or(usize::MAX)
}

fn is_excluded_competition(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.contains("women") {
        return true;
    }
    let bytes = lower.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'u' {
            continue;
        }
        let mut j = i + 1;
        if bytes.get(j) == Some(&b'-') {
            j += 1;
        }
        let two_digits = bytes.get(j).is_some_and(u8::is_ascii_digit)
            && bytes.get(j + 1).is_some_and(u8::is_ascii_digit);
        if two_digits {
            return true;
        }
    }
    false
}
